//! Admin API endpoints.
//!
//! All endpoints require admin role.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt, validate_uuid};
use super::response::success;
use crate::auth::{AdminOnly, Auth};
use crate::db::{Database, User};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/status", patch(set_user_status))
        .with_state(state)
}

#[derive(Serialize)]
struct UsersData {
    users: Vec<User>,
}

#[derive(Serialize)]
struct UserData {
    user: User,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    is_active: bool,
}

/// List all users.
async fn list_users(
    State(state): State<AdminState>,
    _auth: Auth<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list()
        .await
        .db_err("Failed to list users")?;

    Ok(Json(success(UsersData { users })))
}

/// Activate or deactivate an account. Deactivation blocks login and
/// renewal; access tokens already issued stay valid until they expire.
async fn set_user_status(
    State(state): State<AdminState>,
    auth: Auth<AdminOnly>,
    Path(id): Path<String>,
    Json(payload): Json<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;

    if id == auth.uuid() && !payload.is_active {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }

    let updated = state
        .db
        .users()
        .set_active(&id, payload.is_active)
        .await
        .db_err("Failed to update user status")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    let user = state
        .db
        .users()
        .get_by_uuid(&id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(admin = %auth.uuid(), user = %user.uuid, active = user.is_active, "User status changed");
    Ok(Json(success(UserData { user })))
}
