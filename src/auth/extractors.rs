use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::{
        jwt::{JwtKeys, TokenError},
        user::User,
    },
    error::AuthError,
    state::AppState,
    store::CredentialStore,
};

pub const REFRESH_COOKIE: &str = "refreshToken";

/// Refresh-token cookie: HTTP-only, 7 days, Secure + SameSite=None in
/// production, Lax otherwise.
pub fn refresh_cookie(token: String, production: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(production)
        .same_site(if production {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .path("/")
        .max_age(Duration::days(7))
        .build()
}

/// Removal cookie with the same attributes, so the browser actually drops
/// the stored value instead of keeping a mismatched one.
pub fn clear_refresh_cookie(production: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, ""))
        .http_only(true)
        .secure(production)
        .same_site(if production {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

/// Guard failure that also clears the refresh cookie as a cleanup side
/// effect, per the refresh-gate contract.
#[derive(Debug)]
pub struct GuardRejection {
    error: AuthError,
    production: bool,
}

impl GuardRejection {
    pub fn new(error: AuthError, production: bool) -> Self {
        Self { error, production }
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        let jar = CookieJar::new().add(clear_refresh_cookie(self.production));
        (jar, self.error).into_response()
    }
}

/// Access gate: stateless bearer-token check, attaches only the user id.
/// Absent credentials are 401; a forged or expired token is 403.
#[derive(Debug)]
pub struct AccessUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AccessUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthError::Unauthenticated("No token provided".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthError::Unauthenticated("Invalid Authorization header".into()))?;

        let claims = keys.verify_access(token).map_err(|e| {
            warn!("access token rejected: {e}");
            match e {
                TokenError::Expired => AuthError::Forbidden("Token expired".into()),
                TokenError::Invalid => AuthError::Forbidden("Invalid token".into()),
            }
        })?;

        Ok(AccessUser(claims.sub))
    }
}

/// Refresh gate: cookie-carried refresh token plus a store lookup, used by
/// every state-mutating operation. Attaches the full record. Any failure
/// clears the cookie.
#[derive(Debug)]
pub struct RefreshUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for RefreshUser {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let production = state.config.production;
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(REFRESH_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| {
                GuardRejection::new(
                    AuthError::Unauthenticated("No token provided".into()),
                    production,
                )
            })?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_refresh(&token).map_err(|e| {
            warn!("refresh token rejected: {e}");
            GuardRejection::new(AuthError::Forbidden("Invalid token".into()), production)
        })?;

        let user = state
            .store
            .find_by_id(claims.sub)
            .await
            .map_err(|e| GuardRejection::new(AuthError::Internal(e), production))?
            .ok_or_else(|| {
                GuardRejection::new(
                    AuthError::Unauthenticated("User not found".into()),
                    production,
                )
            })?;

        Ok(RefreshUser(user))
    }
}

/// Combined gate for the logged-in check: the refresh cookie when present,
/// otherwise a bearer access token plus a lookup. Query-only, never
/// rotates anything.
#[derive(Debug)]
pub struct SessionUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let production = state.config.production;
        let jar = CookieJar::from_headers(&parts.headers);
        if jar.get(REFRESH_COOKIE).is_some() {
            let RefreshUser(user) = RefreshUser::from_request_parts(parts, state).await?;
            return Ok(SessionUser(user));
        }

        let AccessUser(user_id) = AccessUser::from_request_parts(parts, state)
            .await
            .map_err(|e| GuardRejection::new(e, production))?;

        let user = state
            .store
            .find_by_id(user_id)
            .await
            .map_err(|e| GuardRejection::new(AuthError::Internal(e), production))?
            .ok_or_else(|| {
                GuardRejection::new(
                    AuthError::Unauthenticated("User not found".into()),
                    production,
                )
            })?;

        Ok(SessionUser(user))
    }
}
