//! Task storage. Every query is scoped to the owning user.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, sqlite::SqlitePool};

#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "in_progress" => TaskStatus::InProgress,
            "done" => TaskStatus::Done,
            _ => TaskStatus::Todo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "low" => TaskPriority::Low,
            "high" => TaskPriority::High,
            _ => TaskPriority::Medium,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "id")]
    pub uuid: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    uuid: String,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    due_date: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            uuid: row.uuid,
            title: row.title,
            description: row.description,
            status: TaskStatus::from_str(&row.status),
            priority: TaskPriority::from_str(&row.priority),
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields for inserting a new task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
}

/// Partial update. `None` leaves a column untouched; `Some(None)` clears a
/// nullable column.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
    Title,
}

impl SortField {
    /// ORDER BY clause for this field, with `id` as the tie breaker.
    fn order_by(&self, order: SortOrder) -> String {
        let dir = order.keyword();
        match self {
            SortField::CreatedAt => format!("created_at {dir}, id {dir}"),
            SortField::UpdatedAt => format!("updated_at {dir}, id {dir}"),
            // NULL due dates sort after every real date in both directions.
            SortField::DueDate => format!("due_date IS NULL, due_date {dir}, id {dir}"),
            SortField::Priority => format!(
                "CASE priority WHEN 'high' THEN 3 WHEN 'medium' THEN 2 ELSE 1 END {dir}, id {dir}"
            ),
            SortField::Title => format!("title COLLATE NOCASE {dir}, id {dir}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filter, sort and page selection for listing tasks.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            search: None,
            sort_by: SortField::default(),
            order: SortOrder::default(),
            page: 1,
            limit: 10,
        }
    }
}

/// Aggregate counts over a user's tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: i64,
    pub todo: i64,
    pub in_progress: i64,
    pub done: i64,
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub overdue: i64,
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total: i64,
    todo: Option<i64>,
    in_progress: Option<i64>,
    done: Option<i64>,
    low: Option<i64>,
    medium: Option<i64>,
    high: Option<i64>,
    overdue: Option<i64>,
}

const TASK_COLUMNS: &str =
    "uuid, title, description, status, priority, due_date, created_at, updated_at";

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new task owned by `user_id`.
    pub async fn create(
        &self,
        uuid: &str,
        user_id: i64,
        task: &NewTask,
    ) -> Result<Task, sqlx::Error> {
        sqlx::query(
            "INSERT INTO tasks (uuid, user_id, title, description, status, priority, due_date)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(&task.due_date)
        .execute(&self.pool)
        .await?;

        self.get_by_uuid(uuid, user_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Get a task by UUID, only if owned by `user_id`.
    pub async fn get_by_uuid(&self, uuid: &str, user_id: i64) -> Result<Option<Task>, sqlx::Error> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE uuid = ? AND user_id = ?"
        ))
        .bind(uuid)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Task::from))
    }

    /// List a page of tasks and the total number matching the filter.
    pub async fn list(
        &self,
        user_id: i64,
        filter: &TaskFilter,
    ) -> Result<(Vec<Task>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tasks");
        push_filter(&mut count, user_id, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        push_filter(&mut select, user_id, filter);

        select.push(" ORDER BY ");
        select.push(filter.sort_by.order_by(filter.order));

        let offset = (filter.page.saturating_sub(1) as i64) * filter.limit as i64;
        select.push(" LIMIT ");
        select.push_bind(filter.limit as i64);
        select.push(" OFFSET ");
        select.push_bind(offset);

        let rows: Vec<TaskRow> = select.build_query_as().fetch_all(&self.pool).await?;
        Ok((rows.into_iter().map(Task::from).collect(), total))
    }

    /// Apply a partial update. Returns the updated task, or `None` if the
    /// task does not exist for this user.
    pub async fn update(
        &self,
        uuid: &str,
        user_id: i64,
        patch: &TaskPatch,
    ) -> Result<Option<Task>, sqlx::Error> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE tasks SET updated_at = datetime('now')");
        if let Some(title) = &patch.title {
            query.push(", title = ").push_bind(title.clone());
        }
        if let Some(description) = &patch.description {
            query.push(", description = ").push_bind(description.clone());
        }
        if let Some(status) = patch.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(priority) = patch.priority {
            query.push(", priority = ").push_bind(priority.as_str());
        }
        if let Some(due_date) = &patch.due_date {
            query.push(", due_date = ").push_bind(due_date.clone());
        }
        query.push(" WHERE uuid = ").push_bind(uuid.to_string());
        query.push(" AND user_id = ").push_bind(user_id);

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_uuid(uuid, user_id).await
    }

    /// Delete a task. Returns whether a row was removed.
    pub async fn delete(&self, uuid: &str, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE uuid = ? AND user_id = ?")
            .bind(uuid)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count tasks by status and priority, plus unfinished tasks past due.
    pub async fn stats(&self, user_id: i64) -> Result<TaskStats, sqlx::Error> {
        let row: StatsRow = sqlx::query_as(
            "SELECT
                COUNT(*) AS total,
                SUM(status = 'todo') AS todo,
                SUM(status = 'in_progress') AS in_progress,
                SUM(status = 'done') AS done,
                SUM(priority = 'low') AS low,
                SUM(priority = 'medium') AS medium,
                SUM(priority = 'high') AS high,
                SUM(status != 'done' AND due_date IS NOT NULL AND due_date < date('now')) AS overdue
             FROM tasks WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(TaskStats {
            total: row.total,
            todo: row.todo.unwrap_or(0),
            in_progress: row.in_progress.unwrap_or(0),
            done: row.done.unwrap_or(0),
            low: row.low.unwrap_or(0),
            medium: row.medium.unwrap_or(0),
            high: row.high.unwrap_or(0),
            overdue: row.overdue.unwrap_or(0),
        })
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, user_id: i64, filter: &TaskFilter) {
    query.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(priority) = filter.priority {
        query.push(" AND priority = ").push_bind(priority.as_str());
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        query
            .push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
