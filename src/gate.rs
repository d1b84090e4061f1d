//! Request gates: the `Host` allow-list and the superuser session check.

use axum::{
    extract::{Request, State},
    http::{StatusCode, Uri, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use registry::{AuthContext, RegistryError};
use tracing::{debug, trace, warn};

use crate::schemas::{AppState, ErrorResponse};

/// Cookie name for the session key
pub const SESSION_COOKIE: &str = "salespulse_admin_session";
pub const ADMIN_PREFIX: &str = "/admin-panel";
pub const LOGIN_PATH: &str = "/admin-panel/login/";
pub const DASHBOARD_PATH: &str = "/admin-panel/dashboard/";

/// Admits the request only for an active superuser session and hands the
/// resulting [`AuthContext`] to the handler through request extensions.
/// Everyone else is redirected to the login page.
pub async fn require_superuser(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let session_key = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string());

    match state
        .registry
        .authenticate_session(session_key.as_deref())
        .await
    {
        Ok(context) => {
            trace!("Admin '{}' passed the gate", context.username);
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(RegistryError::Authorization(reason)) => {
            debug!("Gate denied {}: {}", request.uri().path(), reason);
            login_redirect(request.uri()).into_response()
        }
        Err(e) => ErrorResponse::from_registry(&e).into_response(),
    }
}

/// Rejects requests whose `Host` is not in the configured allow-list.
pub async fn check_allowed_host(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or_default()
        .to_string();

    if host_allowed(&host, &state.settings.allowed_hosts) {
        return next.run(request).await;
    }

    warn!("Rejected request for disallowed host '{}'", host);
    ErrorResponse::with_status(
        StatusCode::BAD_REQUEST,
        format!("Invalid HTTP_HOST header: '{host}'"),
        "DISALLOWED_HOST",
    )
    .into_response()
}

/// Matches a `Host` value (port ignored) against the allow-list.
pub fn host_allowed(host: &str, allowed_hosts: &[String]) -> bool {
    let domain = strip_port(host).to_ascii_lowercase();

    allowed_hosts.iter().any(|pattern| {
        let pattern = pattern.trim().to_ascii_lowercase();
        if pattern == "*" {
            return true;
        }
        if domain.is_empty() {
            return false;
        }
        match pattern.strip_prefix('.') {
            Some(parent) => domain == parent || domain.ends_with(&pattern),
            None => domain == pattern,
        }
    })
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal, keep the brackets
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((domain, port)) if port.chars().all(|c| c.is_ascii_digit()) => domain,
        _ => host,
    }
}

/// 303 to the login page carrying the original location in `next`.
pub fn login_redirect(uri: &Uri) -> Redirect {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(DASHBOARD_PATH);
    Redirect::to(&format!("{LOGIN_PATH}?next={}", urlencoding::encode(target)))
}

/// Only admin panel paths are accepted as post-login targets.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with("/admin-panel/") && !path.starts_with("//") => path,
        _ => DASHBOARD_PATH,
    }
}

pub fn session_cookie(session_key: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_key))
        .path(ADMIN_PREFIX)
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path(ADMIN_PREFIX).build()
}

/// Present in handlers behind [`require_superuser`].
pub type Actor = axum::Extension<AuthContext>;
