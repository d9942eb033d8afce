use askama::Template;
use axum::Router;
use axum::extract::{Extension, Form, Query, Request, State};
use axum::http::{StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::CookieJar;
use jsonwebtoken::encode;
use std::sync::Arc;

use crate::config::Config;
use crate::web::{LOGIN_PATH, TASK_LIST_PATH, redirect_found};

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
}

impl CurrentUser {
    /// Creates a new CurrentUser instance.
    pub fn new(username: String) -> Self {
        Self { username }
    }
}

/// Authentication state containing admin credentials and JWT secret.
#[derive(Clone)]
pub struct AuthState {
    pub admin_username: String,
    pub admin_password: String,
    pub jwt_secret: String,
}

impl AuthState {
    /// Creates a new AuthState from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            admin_username: config.admin_username.clone(),
            admin_password: config.admin_password.clone(),
            jwt_secret: config.jwt_secret.clone(),
        }
    }
}

/// Creates a login router with authentication routes.
pub fn create_login_router(state: Arc<AuthState>) -> Router {
    Router::new()
        .route(LOGIN_PATH, axum::routing::post(login_handler))
        .route(LOGIN_PATH, axum::routing::get(login_page_handler))
        .with_state(state)
}

/// Authentication middleware that checks for a valid JWT token and sets the
/// CurrentUser extension. This middleware only populates the extension and
/// does not perform redirects, so public routes can observe the identity too.
pub async fn auth_user_middleware(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token_cookie) = jar.get("auth_token") {
        if let Ok(claims) = decode_jwt(token_cookie.value(), &state.jwt_secret).await {
            let current_user = CurrentUser::new(claims.username);
            request.extensions_mut().insert(current_user);
        }
    }

    next.run(request).await
}

/// Login guard that redirects unauthenticated requests to the login page,
/// carrying the original request URL as the post-login return target.
/// Must be applied after auth_user_middleware so the CurrentUser extension
/// is already resolved.
pub async fn login_redirect_middleware(request: Request, next: Next) -> Response {
    let is_authenticated = request.extensions().get::<CurrentUser>().is_some();

    if !is_authenticated {
        return match login_redirect(request.uri()) {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(%err, "assembling login redirect failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
    }

    next.run(request).await
}

/// Builds the 302 response pointing at the login page with the original URI
/// as the return target.
fn login_redirect(target: &Uri) -> Result<Response, axum::http::Error> {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("return_to", &target.to_string())
        .finish();
    redirect_found(&format!("{LOGIN_PATH}?{query}"))
}

/// Restricts post-login redirects to site-local paths. Anything else falls
/// back to the task list.
fn sanitize_return_target(target: Option<&str>) -> &str {
    match target {
        Some(t) if t.starts_with('/') && !t.starts_with("//") && !t.starts_with("/\\") => t,
        _ => TASK_LIST_PATH,
    }
}

/// Represents the login request payload.
#[derive(serde::Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub return_to: Option<String>,
}

#[derive(serde::Deserialize, Debug)]
pub struct LoginQuery {
    pub return_to: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct Claims {
    pub exp: usize,       // Expiry time of the token
    pub iat: usize,       // Issued at time of the token
    pub username: String, // Username of the authenticated user
}

/// Custom error type for authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Represents an error during template rendering.
    /// The specific `askama::Error` is captured as the source of this error.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    /// Represents an error during JWT operations.
    #[error("JWT operation failed")]
    JwtError,
    /// Represents a failure to assemble the redirect response.
    #[error("Response construction failed")]
    Http(#[from] axum::http::Error),
}

impl IntoResponse for AuthError {
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

/// Handles the login request.
/// Checks submitted username and password against admin credentials.
/// On success, sets the session cookie and redirects to the return target.
#[tracing::instrument(skip(state, jar, payload))]
pub async fn login_handler(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    current_user: Option<Extension<CurrentUser>>,
    Form(payload): Form<LoginRequest>,
) -> Result<(CookieJar, Response), AuthError> {
    let target = sanitize_return_target(payload.return_to.as_deref()).to_owned();

    // Already logged in; nothing to do but return to the target.
    if current_user.is_some() {
        return Ok((jar, redirect_found(&target)?));
    }

    if payload.username == state.admin_username && payload.password == state.admin_password {
        let jwt_token = encode_jwt(payload.username.clone(), &state.jwt_secret)
            .await
            .map_err(|_| AuthError::JwtError)?;

        let cookie = axum_extra::extract::cookie::Cookie::build(("auth_token", jwt_token))
            .http_only(true)
            .secure(false) // Set to true in production with HTTPS
            .same_site(axum_extra::extract::cookie::SameSite::Lax)
            .max_age(time::Duration::hours(24))
            .path("/")
            .build();

        let updated_jar = jar.add(cookie);

        Ok((updated_jar, redirect_found(&target)?))
    } else {
        let html = LoginTemplate {
            error: true,
            return_to: payload.return_to,
        }
        .render()
        .map_err(AuthError::from)?;

        Ok((jar, Html(html).into_response()))
    }
}

pub async fn encode_jwt(username: String, jwt_secret: &str) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let expire = chrono::Duration::hours(24);
    let exp = (now + expire).timestamp() as usize;
    let iat = now.timestamp() as usize;
    let claims = Claims { exp, iat, username };
    let jwt = encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(jwt)
}

pub async fn decode_jwt(token: &str, jwt_secret: &str) -> anyhow::Result<Claims> {
    let token_data = jsonwebtoken::decode(
        token,
        &jsonwebtoken::DecodingKey::from_secret(jwt_secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: bool,
    pub return_to: Option<String>,
}

/// Handles GET requests to display the login page. An already authenticated
/// user is sent straight back to the return target.
#[tracing::instrument]
pub async fn login_page_handler(
    current_user: Option<Extension<CurrentUser>>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AuthError> {
    if current_user.is_some() {
        let target = sanitize_return_target(query.return_to.as_deref());
        return Ok(redirect_found(target)?);
    }

    let template = LoginTemplate {
        error: false,
        return_to: query.return_to,
    };
    let html = template.render().map_err(AuthError::from)?;
    Ok(Html(html).into_response())
}
