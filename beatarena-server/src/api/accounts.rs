//! Registration, login, logout and Google sign-in

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use beatarena_common::auth::{default_avatar, hash_password, random_hex, verify_password, Role};
use beatarena_common::db::{sessions, users, NewUser, User};
use beatarena_common::time;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::{cookie_header, cookie_value, CurrentUser, OAUTH_STATE_COOKIE, SESSION_COOKIE};
use crate::error::{ApiError, ApiResult};
use crate::oauth::{GoogleProfile, PROVIDER};
use crate::AppState;

const OAUTH_STATE_TTL_SECS: i64 = 600;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Issued session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    if request.email.trim().is_empty()
        || request.password.trim().is_empty()
        || request.username.trim().is_empty()
    {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    }

    let role = if state.config.is_admin_email(&request.email) {
        Role::Admin
    } else {
        Role::User
    };

    let username = request.username.trim().to_string();
    let user = users::create_user(
        &state.db,
        &NewUser {
            email: request.email,
            name: username.clone(),
            avatar: default_avatar(&username),
            username,
            role,
            password: Some(hash_password(&request.password)),
            oauth: None,
        },
    )
    .await?;

    info!("Registered user {} ({})", user.username, user.role);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully".to_string(),
            user,
        }),
    ))
}

/// POST /api/auth/login
///
/// Unknown email and wrong password produce the same response.
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> ApiResult<Response> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let credentials = users::find_credentials_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&request.password, &credentials.password_hash, &credentials.password_salt) {
        return Err(invalid());
    }

    start_session(&state, credentials.user, HeaderMap::new()).await
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Response> {
    sessions::delete_session(&state.db, &current.token).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        cookie_header(SESSION_COOKIE, "", "/", 0, state.config.secure_cookies)?,
    );
    Ok((StatusCode::NO_CONTENT, headers).into_response())
}

/// GET /api/auth/google
///
/// Redirects to Google's consent page; the `state` value is kept in a
/// short-lived cookie and checked on callback.
pub async fn google_start(State(state): State<AppState>) -> ApiResult<Response> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Google sign-in is not configured".to_string()))?;

    let oauth_state = random_hex(16);
    let url = google.authorize_url(&oauth_state)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        cookie_header(
            OAUTH_STATE_COOKIE,
            &oauth_state,
            "/api/auth/google",
            OAUTH_STATE_TTL_SECS,
            state.config.secure_cookies,
        )?,
    );
    Ok((headers, Redirect::temporary(&url)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /api/auth/google/callback
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Response> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Google sign-in is not configured".to_string()))?;

    if let Some(error) = query.error {
        return Err(ApiError::Unauthorized(format!("Google sign-in was cancelled: {}", error)));
    }

    let expected = cookie_value(&headers, OAUTH_STATE_COOKIE);
    match (&expected, &query.state) {
        (Some(expected), Some(received)) if expected == received => {}
        _ => return Err(ApiError::Unauthorized("Invalid sign-in state".to_string())),
    }

    let code = query
        .code
        .ok_or_else(|| ApiError::BadRequest("Missing authorization code".to_string()))?;

    let profile = google.fetch_profile(&code).await?;
    let user = find_or_create_google_user(&state, profile).await?;

    let mut extra = HeaderMap::new();
    extra.insert(
        header::SET_COOKIE,
        cookie_header(OAUTH_STATE_COOKIE, "", "/api/auth/google", 0, state.config.secure_cookies)?,
    );
    start_session(&state, user, extra).await
}

/// Match a Google identity to an account: by linked subject first, then by
/// verified email (linking it), otherwise create a new account
async fn find_or_create_google_user(state: &AppState, profile: GoogleProfile) -> ApiResult<User> {
    if let Some(user) = users::find_by_oauth(&state.db, PROVIDER, &profile.sub).await? {
        return Ok(user);
    }

    if !profile.email_verified {
        return Err(ApiError::Unauthorized("Google account email is not verified".to_string()));
    }

    if let Some(user) = users::find_by_email(&state.db, &profile.email).await? {
        users::link_oauth(&state.db, user.id, PROVIDER, &profile.sub).await?;
        info!("Linked Google account to user {}", user.username);
        return Ok(user);
    }

    let base = profile
        .name
        .clone()
        .unwrap_or_else(|| profile.email.split('@').next().unwrap_or_default().to_string());
    let username = users::available_username(&state.db, &base).await?;
    let role = if state.config.is_admin_email(&profile.email) {
        Role::Admin
    } else {
        Role::User
    };

    let user = users::create_user(
        &state.db,
        &NewUser {
            name: profile.name.unwrap_or_else(|| username.clone()),
            avatar: profile.picture.unwrap_or_else(|| default_avatar(&username)),
            email: profile.email,
            username,
            role,
            password: None,
            oauth: Some((PROVIDER.to_string(), profile.sub)),
        },
    )
    .await?;

    info!("Created user {} from Google sign-in", user.username);
    Ok(user)
}

/// Create a session and answer with its token plus a session cookie
async fn start_session(state: &AppState, user: User, mut headers: HeaderMap) -> ApiResult<Response> {
    let ttl = Duration::hours(state.config.session_ttl_hours);
    let token = sessions::create_session(&state.db, user.id, ttl).await?;
    let expires_at = time::now() + ttl;

    headers.append(
        header::SET_COOKIE,
        cookie_header(SESSION_COOKIE, &token, "/", ttl.num_seconds(), state.config.secure_cookies)?,
    );

    Ok((
        headers,
        Json(SessionResponse {
            token,
            expires_at,
            user,
        }),
    )
        .into_response())
}
