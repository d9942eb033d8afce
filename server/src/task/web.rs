use askama::Template;
use axum::{
    Form, Router,
    extract::{Extension, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::task::{
    Task, TaskService, TaskServiceError, format_created_at, format_event_date, parse_event_date,
};
use crate::web::{TASK_ADD_PATH, TASK_LIST_PATH, redirect_found};

/// Upper bound on the free-text topic. Submissions beyond this are rejected
/// rather than truncated.
const MAX_CONTENT_CHARS: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct CreateTaskForm {
    #[serde(rename = "type")]
    kind: String,
    content: String,
    date: String,
}

/// Custom error type for task handler operations.
#[derive(Debug, thiserror::Error)]
enum TaskWebError {
    /// Represents an error during template rendering.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    /// Represents a task service error.
    #[error("Task service error")]
    Service(#[from] TaskServiceError),
    /// Represents a submitted task type outside the known enumeration.
    #[error("Unrecognized task type '{0}'")]
    UnknownKind(String),
    /// Represents a topic that is blank or over the length bound.
    #[error("Rejected task content")]
    RejectedContent,
    /// Represents an event date that matches neither accepted format.
    #[error("Unparseable event date '{0}'")]
    UnparseableDate(String),
    /// Represents a failure to assemble the redirect response.
    #[error("Response construction failed")]
    Http(#[from] axum::http::Error),
}

impl IntoResponse for TaskWebError {
    fn into_response(self) -> Response {
        match self {
            TaskWebError::UnknownKind(_)
            | TaskWebError::RejectedContent
            | TaskWebError::UnparseableDate(_) => {
                (StatusCode::NOT_FOUND, "404 page not found").into_response()
            }
            _ => {
                let user_facing_error_message = "An unexpected error occurred while processing your request. Please try again later.";
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(format!(
                        "<h1>Internal Server Error</h1><p>{}</p>",
                        user_facing_error_message
                    )),
                )
                    .into_response()
            }
        }
    }
}

/// One preformatted row of the task table.
struct TaskRow {
    kind: String,
    event_date: String,
    created_at: String,
    content: String,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            kind: task.kind().to_string(),
            event_date: format_event_date(task.event_date()),
            created_at: format_created_at(task.created_at()),
            content: task.content().to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "tasks.html")]
struct TasksTemplate {
    tasks: Vec<TaskRow>,
    add_path: &'static str,
}

impl TasksTemplate {
    pub fn new(tasks: Vec<TaskRow>) -> Self {
        Self {
            tasks,
            add_path: TASK_ADD_PATH,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TaskState {
    pub db: Arc<sea_orm::DatabaseConnection>,
}

/// Handler for GET /tasks that displays the owner's tasks and the submission form.
/// The login guard guarantees a current user on this route.
#[tracing::instrument(skip(state))]
async fn list_tasks_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Html<String>, TaskWebError> {
    let task_service = TaskService::new(&state.db);
    let tasks = task_service.list_tasks_by_owner(&user.username).await?;
    let template = TasksTemplate::new(tasks.iter().map(TaskRow::from).collect());
    template.render().map(Html).map_err(TaskWebError::from)
}

/// Handler for POST /tasks/add that validates the submission, persists one
/// task record, and redirects back to the list.
#[tracing::instrument(skip(state))]
async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<CreateTaskForm>,
) -> Result<Response, TaskWebError> {
    let kind = form
        .kind
        .parse()
        .map_err(|_| TaskWebError::UnknownKind(form.kind.clone()))?;
    validate_content(&form.content)?;
    let event_date = parse_event_date(&form.date).map_err(|err| {
        tracing::warn!(date = %form.date, %err, "parsing event date failed");
        TaskWebError::UnparseableDate(form.date.clone())
    })?;

    let task_service = TaskService::new(&state.db);
    task_service
        .create_task(&user.username, kind, &form.content, event_date)
        .await?;
    redirect_found(TASK_LIST_PATH).map_err(TaskWebError::from)
}

/// Topics are stored verbatim and escaped at render time; the only checks at
/// ingest are non-blank and the length bound.
fn validate_content(content: &str) -> Result<(), TaskWebError> {
    if content.trim().is_empty() || content.chars().count() > MAX_CONTENT_CHARS {
        return Err(TaskWebError::RejectedContent);
    }
    Ok(())
}

/// Creates and returns the task router with the list and create routes.
pub fn create_task_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route(TASK_LIST_PATH, get(list_tasks_handler))
        .route(TASK_ADD_PATH, post(create_task_handler))
        .with_state(state)
}
