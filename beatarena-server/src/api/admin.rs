//! Admin endpoints (contest authoring and moderation)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use beatarena_common::db::{contests, submissions, Contest, ContestStatus, ContestWithCreator, NewContest, Submission, SubmissionStatus};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ContestStatusRequest {
    pub status: ContestStatus,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionStatusRequest {
    pub status: SubmissionStatus,
}

/// GET /api/admin/contests
pub async fn list_contests(State(state): State<AppState>) -> ApiResult<Json<Vec<ContestWithCreator>>> {
    Ok(Json(contests::list_all(&state.db).await?))
}

/// POST /api/admin/contests
pub async fn create_contest(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<NewContest>,
) -> ApiResult<(StatusCode, Json<Contest>)> {
    let contest = contests::create_contest(&state.db, current.user.id, &request).await?;
    info!("Admin {} created contest '{}'", current.user.username, contest.title);
    Ok((StatusCode::CREATED, Json(contest)))
}

/// PUT /api/admin/contests/:id/status
pub async fn update_contest_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ContestStatusRequest>,
) -> ApiResult<Json<Contest>> {
    Ok(Json(contests::update_status(&state.db, id, request.status).await?))
}

/// PUT /api/admin/submissions/:id/status
pub async fn update_submission_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmissionStatusRequest>,
) -> ApiResult<Json<Submission>> {
    let submission = submissions::update_status(&state.db, id, request.status).await?;
    info!(
        "Admin {} set submission {} to {}",
        current.user.username,
        id,
        request.status.as_str()
    );
    Ok(Json(submission))
}
