use askama::Template;
use axum::Router;
use axum::body::Body;
use axum::extract::Query;
use axum::http::{StatusCode, header};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{Html, Response};
use migration::MigratorTrait;
use sea_orm::Database;
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthState, auth_user_middleware, create_login_router, login_redirect_middleware};
use crate::config;
use crate::task::web::{TaskState, create_task_router};

// Paths used in the webapp, shared by handlers, redirects, and templates.
pub const TASK_LIST_PATH: &str = "/tasks";
pub const TASK_ADD_PATH: &str = "/tasks/add";
pub const PARSE_PATH: &str = "/parse/";
pub const LOGIN_PATH: &str = "/login";
pub const HEALTH_PATH: &str = "/health";

/// Custom error type for web handler operations.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Represents an error during template rendering.
    /// The specific `askama::Error` is captured as the source of this error.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
}

impl axum::response::IntoResponse for WebError {
    fn into_response(self) -> Response {
        let user_facing_error_message =
            "An unexpected error occurred while processing your request. Please try again later.";
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

/// Builds a 302 response to the given location. Assembling the response can
/// fail on an invalid header value; callers surface that as a 500.
pub(crate) fn redirect_found(location: &str) -> Result<Response, axum::http::Error> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Body::empty())
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: config::Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let db = Database::connect(&config.db_url).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let auth_state = Arc::new(AuthState::from_config(&config));
    let task_state = Arc::new(TaskState { db: Arc::new(db) });

    let app = create_app_router(auth_state, task_state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Constructs the full route table. Invoked once from server startup; tests
/// use it to build the same app over their own state.
pub fn create_app_router(auth_state: Arc<AuthState>, task_state: Arc<TaskState>) -> Router {
    let login_router = create_login_router(auth_state.clone());
    let task_router = create_task_router(task_state);

    let protected_routes = Router::new().merge(task_router).layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(auth_state.clone(), auth_user_middleware))
            .layer(from_fn(login_redirect_middleware)),
    );

    let public_routes = Router::new()
        .route(HEALTH_PATH, axum::routing::get(health_check_handler))
        .route(PARSE_PATH, axum::routing::get(hello_handler))
        .merge(login_router)
        .layer(from_fn_with_state(auth_state, auth_user_middleware));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveRequestHeadersLayer::new(std::iter::once(
                    header::COOKIE,
                )))
                .layer(TraceLayer::new_for_http()),
        )
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
pub struct HelloParams {
    #[serde(default)]
    user: String,
}

/// Handler for GET /parse/ that echoes the `user` query parameter back in a
/// fixed HTML fragment. The parameter is untrusted; the template engine
/// escapes it on interpolation.
#[tracing::instrument]
pub async fn hello_handler(
    Query(params): Query<HelloParams>,
) -> Result<Html<String>, WebError> {
    let template = HelloTemplate { user: params.user };
    template.render().map(Html).map_err(WebError::from)
}

#[derive(Template)]
#[template(path = "hello.html")]
struct HelloTemplate {
    user: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn hello_router() -> Router {
        Router::new().route(PARSE_PATH, axum::routing::get(hello_handler))
    }

    #[tokio::test]
    async fn can_handle_template_error_with_internal_server_error() {
        // Simulate a template rendering error using askama::Error::Custom
        let custom_error_message = "Simulated template rendering failure".to_string();
        let template_error = askama::Error::Custom(custom_error_message.into());

        let web_error = WebError::Template(template_error);
        let response = axum::response::IntoResponse::into_response(web_error);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_text = std::str::from_utf8(&body).unwrap();

        assert_eq!(
            body_text,
            "<h1>Internal Server Error</h1><p>An unexpected error occurred while processing your request. Please try again later.</p>"
        );
    }

    #[tokio::test]
    async fn can_echo_user_parameter() {
        let response = hello_router()
            .oneshot(
                Request::builder()
                    .uri("/parse/?user=world")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_text = std::str::from_utf8(&body).unwrap();
        assert!(body_text.contains("Hello <b>world</b>"));
    }

    #[tokio::test]
    async fn echoed_parameter_is_escaped() {
        let response = hello_router()
            .oneshot(
                Request::builder()
                    .uri("/parse/?user=%3Cscript%3Ealert(1)%3C%2Fscript%3E")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_text = std::str::from_utf8(&body).unwrap();
        assert!(body_text.contains("&lt;script&gt;"));
        assert!(!body_text.contains("<script>"));
    }

    #[tokio::test]
    async fn missing_user_parameter_defaults_to_empty() {
        let response = hello_router()
            .oneshot(
                Request::builder()
                    .uri("/parse/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_text = std::str::from_utf8(&body).unwrap();
        assert!(body_text.contains("Hello <b></b>"));
    }
}
