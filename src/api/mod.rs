mod admin;
mod auth;
mod error;
mod health;
mod response;
mod tasks;

use axum::Router;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;
use crate::server_config::ServerSettings;

pub use error::{
    ApiError, ErrorEnvelope, FieldError, ResultExt, ValidJson, expose_error_trace, field_errors,
};

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    settings: Arc<ServerSettings>,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        auth: AuthService::new(db.clone(), jwt.clone()),
        jwt: jwt.clone(),
        settings,
        rate_limit_config,
    };

    let tasks_state = tasks::TasksState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let admin_state = admin::AdminState {
        db: db.clone(),
        jwt,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/tasks", tasks::router(tasks_state))
        .nest("/admin", admin::router(admin_state))
        .nest("/health", health::router(db))
}
