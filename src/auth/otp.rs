use rand::Rng;
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    error::AuthError,
    mailer::{Mail, NotificationSink},
    store::CredentialStore,
};

/// Verify-flow codes live for 24 hours, reset-flow codes for 15 minutes.
pub const VERIFY_OTP_TTL_MS: i64 = 24 * 60 * 60 * 1000;
pub const RESET_OTP_TTL_MS: i64 = 15 * 60 * 1000;

pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Uniform 6-digit code. The range starts at 100000, so the decimal string
/// is always fixed-width with no leading zero.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Validates a submitted code against a stored slot. An empty stored code
/// means no OTP is pending and never matches, not even an empty submission.
pub fn consume_otp(
    stored: &str,
    expiry_ms: i64,
    submitted: &str,
    now_ms: i64,
) -> Result<(), AuthError> {
    if stored.is_empty() || submitted != stored {
        return Err(AuthError::InvalidOtp);
    }
    if now_ms > expiry_ms {
        return Err(AuthError::OtpExpired);
    }
    Ok(())
}

/// Generates, persists and mails a verification code. The OTP is committed
/// before the mail goes out; a failed send surfaces as an error but the
/// persisted code stands.
#[instrument(skip(store, mailer, sender))]
pub async fn issue_verify_otp(
    store: &dyn CredentialStore,
    mailer: &dyn NotificationSink,
    sender: &str,
    user_id: Uuid,
) -> Result<(), AuthError> {
    let mut user = store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
    if user.is_account_verified {
        return Err(AuthError::AlreadyVerified);
    }

    let otp = generate_otp();
    user.set_verify_otp(otp.clone(), now_ms() + VERIFY_OTP_TTL_MS);
    store.save(&user).await?;
    info!(user_id = %user.id, "verify otp issued");

    mailer
        .send(Mail {
            from: sender.to_string(),
            to: user.email.clone(),
            subject: "Account Verification OTP".into(),
            body: format!(
                "Your account verification code for {} is {}.\n\nIt expires in 24 hours.",
                user.email, otp
            ),
        })
        .await?;
    Ok(())
}

/// Same generate+persist+notify sequence for the password-reset slot,
/// keyed by email since the caller is not authenticated.
#[instrument(skip(store, mailer, sender))]
pub async fn issue_reset_otp(
    store: &dyn CredentialStore,
    mailer: &dyn NotificationSink,
    sender: &str,
    email: &str,
) -> Result<(), AuthError> {
    let mut user = store
        .find_by_email(email)
        .await?
        .ok_or_else(|| AuthError::NotFound("User with this email not found".into()))?;

    let otp = generate_otp();
    user.set_reset_otp(otp.clone(), now_ms() + RESET_OTP_TTL_MS);
    store.save(&user).await?;
    info!(user_id = %user.id, "reset otp issued");

    mailer
        .send(Mail {
            from: sender.to_string(),
            to: user.email.clone(),
            subject: "Password Reset OTP".into(),
            body: format!(
                "Your password reset code for {} is {}.\n\nIt expires in 15 minutes.",
                user.email, otp
            ),
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digit_decimal() {
        for _ in 0..200 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().expect("numeric");
            assert!((100_000..=999_999).contains(&n));
            assert!(!code.starts_with('0'));
        }
    }

    #[test]
    fn consume_rejects_wrong_code() {
        assert!(matches!(
            consume_otp("123456", i64::MAX, "654321", 0),
            Err(AuthError::InvalidOtp)
        ));
    }

    #[test]
    fn consume_never_matches_empty_slot() {
        assert!(matches!(
            consume_otp("", i64::MAX, "", 0),
            Err(AuthError::InvalidOtp)
        ));
    }

    #[test]
    fn consume_rejects_expired_code() {
        assert!(matches!(
            consume_otp("123456", 1_000, "123456", 2_000),
            Err(AuthError::OtpExpired)
        ));
    }

    #[test]
    fn consume_accepts_valid_code_before_expiry() {
        assert!(consume_otp("123456", 2_000, "123456", 1_000).is_ok());
    }

    #[test]
    fn invalid_code_wins_over_expiry() {
        // A wrong code against an expired slot reports InvalidOtp, not OtpExpired.
        assert!(matches!(
            consume_otp("123456", 1_000, "000000", 2_000),
            Err(AuthError::InvalidOtp)
        ));
    }
}
