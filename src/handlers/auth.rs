use crate::gate::{
    Actor, DASHBOARD_PATH, LOGIN_PATH, SESSION_COOKIE, expired_session_cookie, safe_next,
    session_cookie,
};
use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};

pub const INVALID_CREDENTIALS: &str = "Invalid credentials or you don't have admin access.";

/// Login form submitted to the admin panel
#[derive(Deserialize, Serialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    /// Admin panel path to continue to after login
    pub next: Option<String>,
}

// Hand-written so the password never reaches the logs.
impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LoginPageQuery {
    /// Admin panel path to continue to after login
    pub next: Option<String>,
}

/// What the login page asks for
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginPrompt {
    pub fields: Vec<String>,
    /// Where a successful login continues to
    pub next: String,
}

/// Login prompt, or straight to the dashboard for a signed-in admin
#[utoipa::path(
    get,
    path = "/admin-panel/login/",
    tag = "auth",
    params(LoginPageQuery),
    responses(
        (status = 200, description = "Login prompt", body = ApiResponse<LoginPrompt>),
        (status = 303, description = "Already signed in, redirect to the admin panel")
    )
)]
#[instrument(skip(state, jar))]
pub async fn login_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<LoginPageQuery>,
) -> Response {
    trace!("Entering login_page function");
    let next = safe_next(query.next.as_deref()).to_string();

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(context) = state
            .registry
            .authenticate_session(Some(cookie.value()))
            .await
        {
            debug!("'{}' already signed in", context.username);
            return Redirect::to(&next).into_response();
        }
    }

    ApiResponse::ok(
        LoginPrompt {
            fields: vec!["username".to_string(), "password".to_string()],
            next,
        },
        "Sign in with a superuser account",
    )
    .into_response()
}

/// Authenticate an admin and start a session
#[utoipa::path(
    post,
    path = "/admin-panel/login/",
    tag = "auth",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in, session cookie set"),
        (status = 401, description = "Invalid credentials or no admin access", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, jar))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), ApiError> {
    trace!("Entering login function");
    debug!("Login attempt for '{}'", form.username);

    match state
        .registry
        .login(&form.username, &form.password, state.settings.session_timeout())
        .await
    {
        Ok(Some(session)) => {
            info!("Admin '{}' signed in", session.context.username);
            let target = safe_next(form.next.as_deref());
            Ok((
                jar.add(session_cookie(session.session_key)),
                Redirect::to(target),
            ))
        }
        Ok(None) => {
            warn!("Rejected login for '{}'", form.username);
            Err(ErrorResponse::with_status(
                StatusCode::UNAUTHORIZED,
                INVALID_CREDENTIALS,
                "INVALID_CREDENTIALS",
            ))
        }
        Err(e) => {
            error!("Login failed for '{}': {}", form.username, e);
            Err(ErrorResponse::from_registry(&e))
        }
    }
}

/// End the current admin session
#[utoipa::path(
    post,
    path = "/admin-panel/logout/",
    tag = "auth",
    responses(
        (status = 303, description = "Signed out, redirect to the login page")
    )
)]
#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    axum::Extension(actor): Actor,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    trace!("Entering logout function");

    if let Some(session_key) = actor.session_key.as_deref() {
        match state.registry.logout(session_key).await {
            Ok(_) => info!("Admin '{}' signed out", actor.username),
            Err(e) => error!("Failed to delete session of '{}': {}", actor.username, e),
        }
    }

    (jar.remove(expired_session_cookie()), Redirect::to(LOGIN_PATH))
}

/// `/admin-panel/` itself lands on the dashboard
pub async fn admin_index() -> Redirect {
    Redirect::to(DASHBOARD_PATH)
}
