//! Authentication error types for the Bearer extractors.

use axum::response::{IntoResponse, Response};

use crate::api::ApiError;

/// Why a request failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    TokenExpired,
    InvalidToken,
    InsufficientRole,
}

/// Extractor rejection. Renders through the shared error envelope.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "No token provided",
            AuthErrorKind::TokenExpired => "Token expired",
            AuthErrorKind::InvalidToken => "Invalid token",
            AuthErrorKind::InsufficientRole => "Insufficient permissions",
        }
    }
}

impl From<ApiAuthError> for ApiError {
    fn from(err: ApiAuthError) -> Self {
        match err.kind {
            AuthErrorKind::InsufficientRole => ApiError::forbidden(err.message()),
            _ => ApiError::unauthorized(err.message()),
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
