use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::password::hash_password;

/// User record as stored. OTP and token fields never serialize; the
/// client-facing shape is `dto::PublicUser`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_account_verified: bool,
    /// The single currently-valid refresh token. `None` means never issued
    /// or revoked; rotation replaces the value in one write.
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    /// Empty string means no OTP pending.
    #[serde(skip_serializing)]
    pub verify_otp: String,
    #[serde(skip_serializing)]
    pub verify_otp_expiry: i64,
    #[serde(skip_serializing)]
    pub reset_otp: String,
    #[serde(skip_serializing)]
    pub reset_otp_expiry: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields required to create a record. The password arrives here already
/// hashed; plaintext never reaches the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl User {
    /// Explicit hash-on-set: the hash is computed here and at registration,
    /// nowhere else. Saving a record never re-hashes.
    pub async fn set_password(&mut self, plain: &str, cost: u32) -> anyhow::Result<()> {
        self.password_hash = hash_password(plain, cost).await?;
        Ok(())
    }

    pub fn set_verify_otp(&mut self, code: String, expiry_ms: i64) {
        self.verify_otp = code;
        self.verify_otp_expiry = expiry_ms;
    }

    pub fn set_reset_otp(&mut self, code: String, expiry_ms: i64) {
        self.reset_otp = code;
        self.reset_otp_expiry = expiry_ms;
    }

    pub fn clear_verify_otp(&mut self) {
        self.verify_otp.clear();
        self.verify_otp_expiry = 0;
    }

    pub fn clear_reset_otp(&mut self) {
        self.reset_otp.clear();
        self.reset_otp_expiry = 0;
    }
}
