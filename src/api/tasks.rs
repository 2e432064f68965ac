//! Tasks API.
//!
//! All endpoints require JWT authentication and only ever see the caller's
//! own tasks. Someone else's task is reported as not found.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};

use super::error::{ApiError, FieldError, ResultExt, ValidJson, validate_uuid};
use super::response::success;
use crate::auth::{Auth, AuthenticatedUser};
use crate::db::{
    Database, NewTask, SortField, SortOrder, Task, TaskFilter, TaskPatch, TaskPriority,
    TaskStatus,
};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

pub const MAX_PAGE_SIZE: u32 = 100;

/// State for task endpoints.
#[derive(Clone)]
pub struct TasksState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(TasksState);

pub fn router(state: TasksState) -> Router {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/stats", get(task_stats))
        .route(
            "/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .with_state(state)
}

// --- Request/Response types ---

fn validate_due_date(value: &str) -> Result<(), ValidationError> {
    let date = value.split(['T', ' ']).next().unwrap_or_default();
    let parts: Vec<&str> = date.split('-').collect();
    let well_formed = matches!(parts.as_slice(), [y, m, d]
        if y.len() == 4 && m.len() == 2 && d.len() == 2
            && [y, m, d].iter().all(|p| p.chars().all(|c| c.is_ascii_digit()))
            && (1..=12).contains(&m.parse::<u32>().unwrap_or(0))
            && (1..=31).contains(&d.parse::<u32>().unwrap_or(0)));

    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new("due_date")
            .with_message("Due date must be an ISO 8601 date (YYYY-MM-DD)".into()))
    }
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    title: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    description: Option<String>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    // Error key matches the wire name.
    #[serde(rename = "dueDate")]
    #[validate(custom(function = "validate_due_date"))]
    due_date: Option<String>,
}

/// Distinguish an absent field from an explicit `null`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTaskRequest {
    title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    description: Option<Option<String>>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "nullable")]
    due_date: Option<Option<String>>,
}

impl Validate for UpdateTaskRequest {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        let mut errors = validator::ValidationErrors::new();
        if let Some(title) = &self.title {
            let len = title.trim().chars().count();
            if len == 0 || len > 200 {
                errors.add(
                    "title",
                    ValidationError::new("length")
                        .with_message("Title must be 1 to 200 characters".into()),
                );
            }
        }
        if let Some(Some(description)) = &self.description {
            if description.chars().count() > 2000 {
                errors.add(
                    "description",
                    ValidationError::new("length")
                        .with_message("Description must be at most 2000 characters".into()),
                );
            }
        }
        if let Some(Some(due_date)) = &self.due_date {
            if let Err(e) = validate_due_date(due_date) {
                errors.add("dueDate", e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Deserialize)]
struct ListQuery {
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    search: Option<String>,
    #[serde(default)]
    sort_by: SortField,
    #[serde(default)]
    order: SortOrder,
    page: Option<u32>,
    limit: Option<u32>,
}

impl ListQuery {
    fn into_filter(self) -> Result<TaskFilter, ApiError> {
        let mut errors = Vec::new();
        let page = self.page.unwrap_or(1);
        if page < 1 {
            errors.push(FieldError {
                field: "page".into(),
                message: "Page must be at least 1".into(),
            });
        }
        let limit = self.limit.unwrap_or(10);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            errors.push(FieldError {
                field: "limit".into(),
                message: format!("Limit must be between 1 and {}", MAX_PAGE_SIZE),
            });
        }
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        Ok(TaskFilter {
            status: self.status,
            priority: self.priority,
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            sort_by: self.sort_by,
            order: self.order,
            page,
            limit,
        })
    }
}

#[derive(Serialize)]
struct Pagination {
    page: u32,
    limit: u32,
    total: i64,
    total_pages: i64,
}

#[derive(Serialize)]
struct TaskList {
    tasks: Vec<Task>,
    pagination: Pagination,
}

#[derive(Serialize)]
struct TaskData {
    task: Task,
}

// --- Helpers ---

/// Resolve the caller's database ID from the token subject.
async fn owner_id(db: &Database, user: &AuthenticatedUser) -> Result<i64, ApiError> {
    db.users()
        .get_by_uuid(user.uuid())
        .await
        .db_err("Failed to get user")?
        .map(|u| u.id)
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))
}

// --- Handlers ---

async fn list_tasks(
    State(state): State<TasksState>,
    auth: Auth,
    query: Result<Query<ListQuery>, axum::extract::rejection::QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let filter = query.into_filter()?;
    let user_id = owner_id(&state.db, &auth).await?;

    let (tasks, total) = state
        .db
        .tasks()
        .list(user_id, &filter)
        .await
        .db_err("Failed to list tasks")?;

    let limit = filter.limit as i64;
    Ok(Json(success(TaskList {
        tasks,
        pagination: Pagination {
            page: filter.page,
            limit: filter.limit,
            total,
            total_pages: (total + limit - 1) / limit,
        },
    })))
}

async fn create_task(
    State(state): State<TasksState>,
    auth: Auth,
    ValidJson(payload): ValidJson<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = owner_id(&state.db, &auth).await?;
    let uuid = uuid::Uuid::new_v4().to_string();

    let task = state
        .db
        .tasks()
        .create(
            &uuid,
            user_id,
            &NewTask {
                title: payload.title.trim().to_string(),
                description: payload.description,
                status: payload.status.unwrap_or(TaskStatus::Todo),
                priority: payload.priority.unwrap_or(TaskPriority::Medium),
                due_date: payload.due_date,
            },
        )
        .await
        .db_err("Failed to create task")?;

    tracing::debug!(user = %auth.uuid(), task = %task.uuid, "Task created");
    Ok((StatusCode::CREATED, Json(success(TaskData { task }))))
}

async fn task_stats(
    State(state): State<TasksState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = owner_id(&state.db, &auth).await?;
    let stats = state
        .db
        .tasks()
        .stats(user_id)
        .await
        .db_err("Failed to compute task stats")?;

    Ok(Json(success(stats)))
}

async fn get_task(
    State(state): State<TasksState>,
    auth: Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    let user_id = owner_id(&state.db, &auth).await?;

    let task = state
        .db
        .tasks()
        .get_by_uuid(&id, user_id)
        .await
        .db_err("Failed to get task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(Json(success(TaskData { task })))
}

async fn update_task(
    State(state): State<TasksState>,
    auth: Auth,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    let user_id = owner_id(&state.db, &auth).await?;

    let patch = TaskPatch {
        title: payload.title.map(|t| t.trim().to_string()),
        description: payload.description,
        status: payload.status,
        priority: payload.priority,
        due_date: payload.due_date,
    };
    if patch.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let task = state
        .db
        .tasks()
        .update(&id, user_id, &patch)
        .await
        .db_err("Failed to update task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(Json(success(TaskData { task })))
}

async fn delete_task(
    State(state): State<TasksState>,
    auth: Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    let user_id = owner_id(&state.db, &auth).await?;

    let deleted = state
        .db
        .tasks()
        .delete(&id, user_id)
        .await
        .db_err("Failed to delete task")?;

    if !deleted {
        return Err(ApiError::not_found("Task not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
