//! Authentication endpoints: register, login, refresh, logout, me.
//!
//! Register and login return the access token in the JSON body and set the
//! refresh token as an HttpOnly cookie scoped to `/auth/refresh`.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidateEmail, ValidationError};

use super::error::{ApiError, ValidJson};
use super::response::{message, success};
use crate::auth::{
    Auth, AuthService, IssuedSession, REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie,
    refresh_cookie,
};
use crate::db::User;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::password::validate_password_strength;
use crate::rate_limit::{RateLimitConfig, rate_limit_auth};
use crate::server_config::ServerSettings;

#[derive(Clone)]
pub struct AuthState {
    pub auth: AuthService,
    pub jwt: Arc<JwtConfig>,
    pub settings: Arc<ServerSettings>,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let limited = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_auth,
        ));

    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
        .merge(limited)
}

fn validate_email_address(email: &str) -> Result<(), ValidationError> {
    if email.trim().validate_email() {
        Ok(())
    } else {
        Err(ValidationError::new("email").with_message("Please provide a valid email".into()))
    }
}

#[derive(Deserialize, Validate)]
struct RegisterRequest {
    #[validate(custom(function = "validate_email_address"))]
    email: String,
    #[validate(custom(function = "validate_password_strength"))]
    password: String,
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    name: Option<String>,
}

#[derive(Deserialize, Validate)]
struct LoginRequest {
    #[validate(custom(function = "validate_email_address"))]
    email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionData {
    user: User,
    access_token: String,
    expires_in: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessData {
    access_token: String,
    expires_in: u64,
}

#[derive(Serialize)]
struct ProfileData {
    user: User,
}

/// Build the body and refresh cookie for a newly issued session.
fn session_response(settings: &ServerSettings, session: IssuedSession) -> impl IntoResponse + use<> {
    let cookie = refresh_cookie(settings, &session.refresh.token, session.refresh.duration);
    (
        [(header::SET_COOKIE, cookie)],
        Json(success(SessionData {
            user: session.user,
            access_token: session.access.token,
            expires_in: session.access.duration,
        })),
    )
}

async fn register(
    State(state): State<AuthState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .auth
        .register(&payload.email, &payload.password, payload.name.as_deref())
        .await?;

    Ok((StatusCode::CREATED, session_response(&state.settings, session)))
}

async fn login(
    State(state): State<AuthState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.auth.login(&payload.email, &payload.password).await?;
    Ok(session_response(&state.settings, session))
}

/// Read the refresh token from the cookie, falling back to a JSON body.
fn refresh_token_from(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    if let Some(token) = get_cookie(headers, REFRESH_COOKIE_NAME).filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<RefreshRequest>(body)
        .ok()?
        .refresh_token
        .filter(|t| !t.is_empty())
}

async fn refresh(
    State(state): State<AuthState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let token = refresh_token_from(&headers, &body)
        .ok_or_else(|| ApiError::bad_request("Refresh token is required"))?;

    let access = state.auth.renew(&token).await?;

    Ok(Json(success(AccessData {
        access_token: access.token,
        expires_in: access.duration,
    })))
}

async fn logout(State(state): State<AuthState>, auth: Auth) -> impl IntoResponse {
    tracing::info!(user = %auth.uuid(), "User logged out");
    (
        [(header::SET_COOKIE, clear_refresh_cookie(&state.settings))],
        Json(message("Logged out successfully")),
    )
}

async fn me(State(state): State<AuthState>, auth: Auth) -> Result<impl IntoResponse, ApiError> {
    let user = state.auth.current_user(auth.uuid()).await?;
    Ok(Json(success(ProfileData { user })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_refresh_token_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("refresh_token=from-cookie"),
        );
        let body = br#"{"refreshToken":"from-body"}"#;

        assert_eq!(
            refresh_token_from(&headers, body).as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn test_refresh_token_body_fallback() {
        let headers = HeaderMap::new();

        assert_eq!(
            refresh_token_from(&headers, br#"{"refreshToken":"from-body"}"#).as_deref(),
            Some("from-body")
        );
        assert_eq!(refresh_token_from(&headers, b""), None);
        assert_eq!(refresh_token_from(&headers, b"{}"), None);
        assert_eq!(refresh_token_from(&headers, b"not json"), None);
        assert_eq!(
            refresh_token_from(&headers, br#"{"refreshToken":""}"#),
            None
        );
    }

    #[test]
    fn test_register_validation() {
        let request = RegisterRequest {
            email: "not-an-email".into(),
            password: "weak".into(),
            name: None,
        };
        let errors = request.validate().unwrap_err();
        let fields = super::super::error::field_errors(&errors);

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field, "email");
        assert_eq!(fields[1].field, "password");
        assert_eq!(
            fields[1].message,
            "Password must be at least 8 characters long"
        );

        let request = RegisterRequest {
            email: " user@example.com ".into(),
            password: "Secur3Pass".into(),
            name: Some("Alice".into()),
        };
        assert!(request.validate().is_ok());
    }
}
