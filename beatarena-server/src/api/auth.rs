//! Session and role middleware
//!
//! A session token is accepted from `Authorization: Bearer <token>` or from
//! the `beatarena_session` cookie. The resolved user is stored in request
//! extensions as [`CurrentUser`] for downstream handlers.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use beatarena_common::db::{sessions, User};
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "beatarena_session";

/// Cookie carrying the OAuth `state` value between redirect and callback
pub const OAUTH_STATE_COOKIE: &str = "beatarena_oauth_state";

/// Authenticated caller, inserted by [`require_session`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Raw session token (needed to log out)
    pub token: String,
}

/// Value of cookie `name` from the request headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Session token from the Authorization header, falling back to the cookie
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| cookie_value(headers, SESSION_COOKIE))
}

/// `Set-Cookie` value storing a cookie for `max_age_secs` (0 clears it)
pub fn cookie_header(
    name: &str,
    value: &str,
    path: &str,
    max_age_secs: i64,
    secure: bool,
) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!(
        "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite=Lax",
        name, value, path, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("Invalid cookie header: {}", e)))
}

/// Session middleware
///
/// Returns 401 when no token is presented or the session is unknown or
/// expired.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    let user = sessions::resolve_session(&state.db, &token)
        .await?
        .ok_or_else(|| {
            debug!("Rejected unknown or expired session");
            ApiError::Unauthorized("Session expired or invalid".to_string())
        })?;

    request.extensions_mut().insert(CurrentUser { user, token });

    Ok(next.run(request).await)
}

/// Admin middleware, layered inside [`require_session`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = request
        .extensions()
        .get::<CurrentUser>()
        .map(|current| current.user.is_admin())
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    if !is_admin {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(request).await)
}
