//! Public contest endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use beatarena_common::db::{contests, submissions, ContestStatus, ContestWithCreator};
use beatarena_common::time;
use serde::Serialize;
use uuid::Uuid;

use super::leaderboard::{stream_url, ProducerView};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// A submission as listed on a contest page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestEntry {
    pub id: Uuid,
    pub stream_url: String,
    pub producer: ProducerView,
}

#[derive(Debug, Serialize)]
pub struct ContestDetail {
    #[serde(flatten)]
    pub contest: ContestWithCreator,
    pub submissions: Vec<ContestEntry>,
}

/// GET /api/contests
pub async fn list_contests(State(state): State<AppState>) -> ApiResult<Json<Vec<ContestWithCreator>>> {
    Ok(Json(contests::list_active(&state.db).await?))
}

/// GET /api/contests/current
pub async fn current_contest(State(state): State<AppState>) -> ApiResult<Json<ContestWithCreator>> {
    contests::find_current(&state.db, time::now())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No active contest".to_string()))
}

/// GET /api/contests/:id
///
/// Drafts are not public.
pub async fn get_contest(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ContestDetail>> {
    let contest = match contests::get_with_creator(&state.db, id).await {
        Ok(c) if c.contest.status != ContestStatus::Draft => c,
        Ok(_) | Err(beatarena_common::Error::NotFound(_)) => {
            return Err(ApiError::NotFound(format!("Contest {} not found", id)));
        }
        Err(e) => return Err(e.into()),
    };

    let reveal = contest.contest.has_ended(time::now());
    let entries = submissions::list_with_producers(&state.db, id)
        .await?
        .into_iter()
        .map(|s| ContestEntry {
            id: s.submission.id,
            stream_url: stream_url(s.submission.id),
            producer: ProducerView::new(&s.producer, reveal),
        })
        .collect();

    Ok(Json(ContestDetail {
        contest,
        submissions: entries,
    }))
}
