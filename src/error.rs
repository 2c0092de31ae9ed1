use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Closed error taxonomy for the auth core. Every operation fails with one
/// of these; the `IntoResponse` impl is the single place where variants are
/// mapped to an HTTP status and the response envelope.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid OTP")]
    InvalidOtp,
    #[error("OTP expired. Please request a new one")]
    OtpExpired,
    #[error("User already verified")]
    AlreadyVerified,
    #[error("New password cannot be same as old password")]
    SamePassword,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::SamePassword => StatusCode::BAD_REQUEST,
            AuthError::Conflict(_) | AuthError::AlreadyVerified => StatusCode::CONFLICT,
            AuthError::Unauthenticated(_) | AuthError::InvalidOtp => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::OtpExpired => StatusCode::GONE,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internals are logged server-side and never serialized to the client.
        let message = match &self {
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({
            "success": false,
            "statusCode": status.as_u16(),
            "message": message,
            "errors": [],
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_map_to_expected_status_codes() {
        assert_eq!(
            AuthError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::SamePassword.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::Conflict("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AuthError::AlreadyVerified.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::Unauthenticated("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::InvalidOtp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AuthError::OtpExpired.status(), StatusCode::GONE);
        assert_eq!(
            AuthError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_error_message_is_not_leaked() {
        let err = AuthError::Internal(anyhow::anyhow!("secret database detail"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
