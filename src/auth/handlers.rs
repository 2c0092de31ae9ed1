use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            ApiResponse, AuthData, LoginRequest, PublicUser, RegisterRequest,
            ResetPasswordRequest, SendPasswordOtpRequest, SessionData, VerifyAccountRequest,
            VerifyResetOtpRequest,
        },
        extractors::{
            clear_refresh_cookie, refresh_cookie, AccessUser, RefreshUser, SessionUser,
            REFRESH_COOKIE,
        },
        jwt::JwtKeys,
        services,
    },
    error::AuthError,
    state::AppState,
    store::CredentialStore,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/send-verify-otp", post(send_verify_otp))
        .route("/auth/verify-account", post(verify_account))
        .route("/auth/isloggedIn", get(is_logged_in))
        .route("/auth/send-password-otp", post(send_password_otp))
        .route("/auth/verify-reset-otp", post(verify_reset_otp))
        .route("/auth/reset-password", post(reset_password))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users/data", get(get_user_data))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let keys = JwtKeys::from_ref(&state);
    let outcome = services::register(
        &state,
        &keys,
        &payload.name,
        &payload.email,
        &payload.password,
    )
    .await?;

    let jar = jar.add(refresh_cookie(
        outcome.refresh_token.clone(),
        state.config.production,
    ));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(ApiResponse::ok(
            AuthData {
                user: PublicUser::from(&outcome.user),
                access_token: outcome.access_token,
            },
            "User registered successfully",
        )),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let keys = JwtKeys::from_ref(&state);
    let presented = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let outcome = services::login(
        &state,
        &keys,
        &payload.email,
        &payload.password,
        presented.as_deref(),
    )
    .await?;

    let jar = jar.add(refresh_cookie(
        outcome.refresh_token.clone(),
        state.config.production,
    ));
    Ok((
        jar,
        Json(ApiResponse::ok(
            AuthData {
                user: PublicUser::from(&outcome.user),
                access_token: outcome.access_token,
            },
            "User logged in successfully",
        )),
    ))
}

#[instrument(skip(state, jar, user))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    RefreshUser(user): RefreshUser,
) -> Result<impl IntoResponse, AuthError> {
    services::logout(&state, &user).await?;
    let jar = jar.add(clear_refresh_cookie(state.config.production));
    Ok((
        jar,
        Json(ApiResponse::message("User logged out successfully")),
    ))
}

#[instrument(skip(state, user))]
pub async fn send_verify_otp(
    State(state): State<AppState>,
    RefreshUser(user): RefreshUser,
) -> Result<impl IntoResponse, AuthError> {
    services::send_verify_otp(&state, user.id).await?;
    Ok(Json(ApiResponse::message("OTP sent to your email")))
}

#[instrument(skip(state, user, payload))]
pub async fn verify_account(
    State(state): State<AppState>,
    RefreshUser(user): RefreshUser,
    Json(payload): Json<VerifyAccountRequest>,
) -> Result<impl IntoResponse, AuthError> {
    services::verify_email(&state, user.id, &payload.otp).await?;
    Ok(Json(ApiResponse::message("Email verified successfully")))
}

#[instrument(skip(user))]
pub async fn is_logged_in(SessionUser(user): SessionUser) -> impl IntoResponse {
    Json(ApiResponse::ok(
        SessionData {
            user: PublicUser::from(&user),
        },
        "User is logged in",
    ))
}

#[instrument(skip(state, payload))]
pub async fn send_password_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendPasswordOtpRequest>,
) -> Result<impl IntoResponse, AuthError> {
    services::send_password_otp(&state, &payload.email).await?;
    Ok(Json(ApiResponse::message("OTP sent to your email")))
}

#[instrument(skip(state, payload))]
pub async fn verify_reset_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyResetOtpRequest>,
) -> Result<impl IntoResponse, AuthError> {
    services::verify_reset_otp(&state, &payload.email, &payload.otp).await?;
    Ok(Json(ApiResponse::message("OTP verified successfully")))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    services::reset_password(&state, &payload.email, &payload.password).await?;
    Ok(Json(ApiResponse::message("Password reset successfully")))
}

/// Sanitized record for the bearer-authenticated client. A token whose id
/// no longer resolves also clears the refresh cookie.
#[instrument(skip(state, jar))]
pub async fn get_user_data(
    State(state): State<AppState>,
    jar: CookieJar,
    AccessUser(user_id): AccessUser,
) -> Response {
    match state.store.find_by_id(user_id).await {
        Err(e) => AuthError::Internal(e).into_response(),
        Ok(None) => {
            let jar = jar.add(clear_refresh_cookie(state.config.production));
            (
                jar,
                AuthError::Unauthenticated("User not found".into()),
            )
                .into_response()
        }
        Ok(Some(user)) => Json(ApiResponse::ok(
            SessionData {
                user: PublicUser::from(&user),
            },
            "User retrieved successfully",
        ))
        .into_response(),
    }
}
