//! beatarena-server library - HTTP service for beat contests
//!
//! JSON API over the shared database layer: accounts and sessions,
//! contests, excerpt uploads, duel voting and leaderboards.

use std::sync::Arc;

use axum::Router;
use beatarena_common::config::{Config, RootFolder};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod oauth;

pub use error::{ApiError, ApiResult};

use oauth::{GoogleOAuth, OAuthError};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub config: Arc<Config>,
    /// Root folder holding the database and stored excerpts
    pub root: RootFolder,
    /// Present only when `[google]` is configured
    pub google: Option<Arc<GoogleOAuth>>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config, root: RootFolder) -> Result<Self, OAuthError> {
        let google = match config.google.clone() {
            Some(google) => Some(Arc::new(GoogleOAuth::new(google)?)),
            None => None,
        };

        Ok(Self {
            db,
            config: Arc::new(config),
            root,
            google,
        })
    }
}

/// Build application router
///
/// Health, sign-in, contest browsing, leaderboards and excerpt streaming are
/// public; everything acting on behalf of a user requires a session, and
/// `/api/admin/*` additionally requires the admin role.
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::middleware;
    use axum::routing::{delete, get, post, put};

    // Multipart framing overhead on top of the audio file itself
    let upload_limit = state.config.max_upload_bytes + 64 * 1024;

    let admin = Router::new()
        .route(
            "/api/admin/contests",
            get(api::admin::list_contests).post(api::admin::create_contest),
        )
        .route("/api/admin/contests/:id/status", put(api::admin::update_contest_status))
        .route("/api/admin/submissions/:id/status", put(api::admin::update_submission_status))
        .layer(middleware::from_fn(api::require_admin));

    let uploads = Router::new()
        .route("/api/submissions/preview", post(api::submissions::preview))
        .route("/api/submissions/upload", post(api::submissions::upload))
        .layer(DefaultBodyLimit::max(upload_limit));

    // Protected routes (require a session)
    let protected = Router::new()
        .route("/api/auth/logout", post(api::accounts::logout))
        .route(
            "/api/user/profile",
            get(api::profile::get_profile).put(api::profile::update_profile),
        )
        .route("/api/user/rewards", get(api::profile::rewards))
        .route("/api/submissions/:id", delete(api::submissions::delete_submission))
        .route("/api/votes", post(api::votes::cast_vote))
        .route("/api/votes/pair", get(api::votes::next_pair))
        .route("/api/votes/counts", get(api::votes::vote_counts))
        .merge(uploads)
        .merge(admin)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_session,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/auth/register", post(api::accounts::register))
        .route("/api/auth/login", post(api::accounts::login))
        .route("/api/auth/google", get(api::accounts::google_start))
        .route("/api/auth/google/callback", get(api::accounts::google_callback))
        .route("/api/contests", get(api::contests::list_contests))
        .route("/api/contests/current", get(api::contests::current_contest))
        .route("/api/contests/:id", get(api::contests::get_contest))
        .route("/api/contests/:id/leaderboard", get(api::leaderboard::contest_leaderboard))
        .route("/api/leaderboard", get(api::leaderboard::all_leaderboards))
        .route("/api/beats/:id/stream", get(api::submissions::stream_beat))
        .route("/api/votes/stats", get(api::votes::vote_stats))
        .merge(api::health_routes());

    // Combine routers
    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
