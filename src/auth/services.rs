use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        jwt::JwtKeys,
        otp::{self, consume_otp, now_ms},
        password::{hash_password, verify_password},
        user::{NewUser, User},
    },
    error::AuthError,
    mailer::{Mail, NotificationSink},
    state::AppState,
    store::CredentialStore,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Result of a completed register or login: the saved record plus the
/// freshly issued token pair. The refresh token goes into the cookie, the
/// access token into the response body.
#[derive(Debug)]
pub struct AuthOutcome {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[instrument(skip(state, keys, password))]
pub async fn register(
    state: &AppState,
    keys: &JwtKeys,
    name: &str,
    email: &str,
    password: &str,
) -> Result<AuthOutcome, AuthError> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AuthError::Validation("Input fields can't be empty".into()));
    }
    if !is_valid_email(email) {
        return Err(AuthError::Validation("Invalid email".into()));
    }
    if password.len() < 8 {
        return Err(AuthError::Validation("Password too short".into()));
    }

    if state.store.find_by_email(email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::Conflict("Email already exists".into()));
    }

    let password_hash = hash_password(password, state.config.bcrypt_cost).await?;
    let mut user = state
        .store
        .create(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
        })
        .await?;

    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    user.refresh_token = Some(refresh_token.clone());
    let user = state.store.save(&user).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");

    // Best-effort welcome mail; the account exists either way.
    let welcome = Mail {
        from: state.config.smtp.sender.clone(),
        to: user.email.clone(),
        subject: "Welcome!".into(),
        body: format!(
            "Hello {},\n\nThank you for registering. We're excited to have you on board!",
            user.name
        ),
    };
    if let Err(e) = state.mailer.send(welcome).await {
        warn!(error = %e, user_id = %user.id, "welcome email failed");
    }

    Ok(AuthOutcome {
        user,
        access_token,
        refresh_token,
    })
}

#[instrument(skip(state, keys, password, presented_refresh))]
pub async fn login(
    state: &AppState,
    keys: &JwtKeys,
    email: &str,
    password: &str,
    presented_refresh: Option<&str>,
) -> Result<AuthOutcome, AuthError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::Validation(
            "Email and Password are required".into(),
        ));
    }

    let mut user = state
        .store
        .find_by_email(email)
        .await?
        .ok_or_else(|| AuthError::NotFound("Email doesn't exist".into()))?;

    if !verify_password(password, &user.password_hash).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::Unauthenticated("Incorrect Password".into()));
    }

    // A presented cookie that does not match the stored token means a
    // revoked or rotated token is being replayed. Revoke and refuse.
    if let Some(presented) = presented_refresh {
        if user.refresh_token.as_deref() != Some(presented) {
            warn!(user_id = %user.id, "refresh token reuse detected");
            user.refresh_token = None;
            state.store.save(&user).await?;
            return Err(AuthError::Forbidden("Token reuse detected".into()));
        }
    }

    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    user.refresh_token = Some(refresh_token.clone());
    let user = state.store.save(&user).await?;
    info!(user_id = %user.id, email = %user.email, "user logged in");

    Ok(AuthOutcome {
        user,
        access_token,
        refresh_token,
    })
}

/// Unsets the stored refresh token. Logging out twice is not an error.
#[instrument(skip(state, user))]
pub async fn logout(state: &AppState, user: &User) -> Result<(), AuthError> {
    let mut user = user.clone();
    user.refresh_token = None;
    state.store.save(&user).await?;
    info!(user_id = %user.id, "user logged out");
    Ok(())
}

pub async fn send_verify_otp(state: &AppState, user_id: Uuid) -> Result<(), AuthError> {
    otp::issue_verify_otp(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config.smtp.sender,
        user_id,
    )
    .await
}

/// Consumes the verify-slot code; on success the verified flag is set and
/// the slot cleared in the same write.
#[instrument(skip(state, submitted))]
pub async fn verify_email(
    state: &AppState,
    user_id: Uuid,
    submitted: &str,
) -> Result<(), AuthError> {
    if submitted.trim().is_empty() {
        return Err(AuthError::Validation("OTP is required".into()));
    }
    let mut user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AuthError::NotFound("User not found".into()))?;

    consume_otp(
        &user.verify_otp,
        user.verify_otp_expiry,
        submitted.trim(),
        now_ms(),
    )?;

    user.is_account_verified = true;
    user.clear_verify_otp();
    state.store.save(&user).await?;
    info!(user_id = %user.id, "email verified");
    Ok(())
}

pub async fn send_password_otp(state: &AppState, email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::Validation("Email is required".into()));
    }
    otp::issue_reset_otp(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config.smtp.sender,
        email,
    )
    .await
}

/// Consumes the reset-slot code. This clears the slot but grants no
/// standing authority; `reset_password` re-authenticates by email alone.
#[instrument(skip(state, submitted))]
pub async fn verify_reset_otp(
    state: &AppState,
    email: &str,
    submitted: &str,
) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() || submitted.trim().is_empty() {
        return Err(AuthError::Validation("OTP and email are required".into()));
    }
    let mut user = state
        .store
        .find_by_email(email)
        .await?
        .ok_or_else(|| AuthError::NotFound("User not found".into()))?;

    consume_otp(
        &user.reset_otp,
        user.reset_otp_expiry,
        submitted.trim(),
        now_ms(),
    )?;

    user.clear_reset_otp();
    state.store.save(&user).await?;
    info!(user_id = %user.id, "reset otp verified");
    Ok(())
}

/// Sets a new password and clears any residual reset-slot state in one
/// write. The new password is compared against the current one through the
/// hash, never as plaintext.
#[instrument(skip(state, new_password))]
pub async fn reset_password(
    state: &AppState,
    email: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() || new_password.is_empty() {
        return Err(AuthError::Validation("All fields are required".into()));
    }
    if new_password.len() < 8 {
        return Err(AuthError::Validation("Password too short".into()));
    }
    let mut user = state
        .store
        .find_by_email(email)
        .await?
        .ok_or_else(|| AuthError::NotFound("User not found".into()))?;

    if verify_password(new_password, &user.password_hash).await? {
        return Err(AuthError::SamePassword);
    }

    user.set_password(new_password, state.config.bcrypt_cost)
        .await?;
    user.clear_reset_otp();
    state.store.save(&user).await?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}
