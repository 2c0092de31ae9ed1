use anyhow::bail;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use time::OffsetDateTime;
#[cfg(test)]
use tokio::sync::RwLock;

use crate::auth::user::{NewUser, User};

/// Persistence seam for user records. Each `save` is a single atomic write
/// of the whole record; the record's `updated_at` acts as a version, so a
/// stale in-memory copy fails the write instead of clobbering a newer one.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn create(&self, new_user: NewUser) -> anyhow::Result<User>;
    /// Writes the record if its version still matches, returning the saved
    /// copy with the bumped `updated_at`.
    async fn save(&self, user: &User) -> anyhow::Result<User>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, is_account_verified, refresh_token, \
     verify_otp, verify_otp_expiry, reset_otp, reset_otp_expiry, created_at, updated_at";

/// Postgres-backed store.
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE email = $1
            "#,
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = $1
            "#,
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn save(&self, user: &User) -> anyhow::Result<User> {
        let saved = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = $2, email = $3, password_hash = $4, is_account_verified = $5,
                refresh_token = $6, verify_otp = $7, verify_otp_expiry = $8,
                reset_otp = $9, reset_otp_expiry = $10, updated_at = now()
            WHERE id = $1 AND updated_at = $11
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_account_verified)
        .bind(&user.refresh_token)
        .bind(&user.verify_otp)
        .bind(user.verify_otp_expiry)
        .bind(&user.reset_otp)
        .bind(user.reset_otp_expiry)
        .bind(user.updated_at)
        .fetch_optional(&self.pool)
        .await?;
        match saved {
            Some(u) => Ok(u),
            None => bail!("stale user record for {}", user.id),
        }
    }
}

/// In-memory store backing `AppState::fake()` and the test suites.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
}

#[cfg(test)]
#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new_user.email) {
            bail!("duplicate email {}", new_user.email);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            is_account_verified: false,
            refresh_token: None,
            verify_otp: String::new(),
            verify_otp_expiry: 0,
            reset_otp: String::new(),
            reset_otp_expiry: 0,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> anyhow::Result<User> {
        let mut users = self.users.write().await;
        let current = match users.get(&user.id) {
            Some(u) => u,
            None => bail!("no such user {}", user.id),
        };
        if current.updated_at != user.updated_at {
            bail!("stale user record for {}", user.id);
        }
        let mut saved = user.clone();
        saved.updated_at = OffsetDateTime::now_utc();
        users.insert(saved.id, saved.clone());
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ann".into(),
            email: email.into(),
            password_hash: "$2b$04$fakehash".into(),
        }
    }

    #[tokio::test]
    async fn create_and_find_roundtrip() {
        let store = MemoryStore::default();
        let created = store.create(new_user("ann@x.com")).await.unwrap();
        let by_email = store.find_by_email("ann@x.com").await.unwrap().unwrap();
        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_id.email, "ann@x.com");
        assert!(!by_id.is_account_verified);
        assert!(by_id.refresh_token.is_none());
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryStore::default();
        store.create(new_user("ann@x.com")).await.unwrap();
        assert!(store.create(new_user("ann@x.com")).await.is_err());
    }

    #[tokio::test]
    async fn save_rejects_stale_version() {
        let store = MemoryStore::default();
        let user = store.create(new_user("ann@x.com")).await.unwrap();

        let mut first = user.clone();
        first.name = "Ann Updated".into();
        let saved = store.save(&first).await.unwrap();
        assert!(saved.updated_at >= user.updated_at);

        // Second writer still holds the pre-save version.
        let mut second = user;
        second.name = "Conflicting".into();
        assert!(store.save(&second).await.is_err());

        let stored = store.find_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Ann Updated");
    }
}
