use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::user::User;

/// Success envelope shared by every endpoint. Failures are produced by
/// `AuthError::into_response` with the mirrored status code.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }
}

impl ApiResponse<serde_json::Value> {
    /// Message-only success with `data: null`.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: message.into(),
        }
    }
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for account verification.
#[derive(Debug, Deserialize)]
pub struct VerifyAccountRequest {
    #[serde(default)]
    pub otp: String,
}

/// Request body for requesting a password-reset OTP.
#[derive(Debug, Deserialize)]
pub struct SendPasswordOtpRequest {
    #[serde(default)]
    pub email: String,
}

/// Request body for checking a password-reset OTP.
#[derive(Debug, Deserialize)]
pub struct VerifyResetOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

/// Request body for setting a new password.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Sanitized user: the stored record minus the password hash and the
/// token/OTP bookkeeping fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_account_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_account_verified: user.is_account_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Payload returned by register and login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub user: PublicUser,
    pub access_token: String,
}

/// Payload returned by the logged-in check and /users/data.
#[derive(Debug, Serialize)]
pub struct SessionData {
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            name: "Ann".into(),
            email: "ann@x.com".into(),
            password_hash: "$2b$04$secret".into(),
            is_account_verified: false,
            refresh_token: Some("refresh".into()),
            verify_otp: "123456".into(),
            verify_otp_expiry: 1,
            reset_otp: String::new(),
            reset_otp_expiry: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn public_user_never_carries_secrets() {
        let json = serde_json::to_string(&PublicUser::from(&sample_user())).unwrap();
        assert!(json.contains("ann@x.com"));
        assert!(json.contains("isAccountVerified"));
        assert!(!json.contains("password"));
        assert!(!json.contains("123456"));
        assert!(!json.contains("refresh"));
    }

    #[test]
    fn auth_data_uses_camel_case_access_token() {
        let data = AuthData {
            user: PublicUser::from(&sample_user()),
            access_token: "token".into(),
        };
        let json = serde_json::to_string(&ApiResponse::ok(data, "ok")).unwrap();
        assert!(json.contains("\"accessToken\":\"token\""));
        assert!(json.contains("\"success\":true"));
    }

    #[test]
    fn message_envelope_has_null_data() {
        let json = serde_json::to_string(&ApiResponse::message("done")).unwrap();
        assert!(json.contains("\"data\":null"));
        assert!(json.contains("\"message\":\"done\""));
    }
}
