//! Axum extractors for authentication.
//!
//! Access tokens arrive as `Authorization: Bearer <token>`. Verification is
//! signature and expiry only; no database lookup happens here, so a
//! deactivated account keeps working until its access token expires.

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::db::UserRole;
use crate::jwt::JwtConfig;

/// Compile-time set of roles allowed through an [`Auth`] extractor.
pub trait RoleConstraint {
    const ALLOWED: &'static [UserRole];
}

/// Any authenticated user.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    const ALLOWED: &'static [UserRole] = &[UserRole::User, UserRole::Admin];
}

/// Administrators only.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    const ALLOWED: &'static [UserRole] = &[UserRole::Admin];
}

/// Pull the token out of an `Authorization: Bearer` header.
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verify the request's access token.
fn authenticate(headers: &HeaderMap, jwt: &JwtConfig) -> Result<AuthenticatedUser, AuthErrorKind> {
    let token = bearer_token(headers).ok_or(AuthErrorKind::NotAuthenticated)?;
    let claims = jwt.validate_access_token(token).map_err(|e| {
        if e.is_expired() {
            AuthErrorKind::TokenExpired
        } else {
            AuthErrorKind::InvalidToken
        }
    })?;
    Ok(AuthenticatedUser { claims })
}

/// Extractor for endpoints that require a valid access token and one of
/// the roles in `R`.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub user: AuthenticatedUser,
    _role: PhantomData<R>,
}

impl<R: RoleConstraint> Deref for Auth<R> {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticate(&parts.headers, state.jwt()).map_err(ApiAuthError::new)?;

        if !R::ALLOWED.contains(&user.claims.role) {
            tracing::warn!(user = %user.claims.sub, role = user.claims.role.as_str(), "Role not permitted");
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }

        Ok(Auth {
            user,
            _role: PhantomData,
        })
    }
}

/// Optional authentication extractor. Never rejects: any failure yields `None`.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(authenticate(&parts.headers, state.jwt()).ok()))
    }
}
