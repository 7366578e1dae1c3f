//! Leaderboards
//!
//! Producers stay anonymous until their contest has ended (end date passed
//! or status ended), so votes are cast on the music alone.

use axum::{
    extract::{Path, State},
    Json,
};
use beatarena_common::auth::default_avatar;
use beatarena_common::db::{contests, votes, Contest, ContestStatus, Creator};
use beatarena_common::time;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const ANONYMOUS_PRODUCER: &str = "Anonymous Producer";

/// Producer identity as shown publicly
#[derive(Debug, Clone, Serialize)]
pub struct ProducerView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    pub avatar: String,
}

impl ProducerView {
    /// Reveal `creator` only when `reveal` is set
    pub fn new(creator: &Creator, reveal: bool) -> Self {
        if reveal {
            Self {
                id: Some(creator.id),
                name: creator.name.clone(),
                avatar: creator.avatar.clone(),
            }
        } else {
            Self {
                id: None,
                name: ANONYMOUS_PRODUCER.to_string(),
                avatar: default_avatar("anonymous"),
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: u32,
    pub submission_id: Uuid,
    pub votes: u32,
    pub submitted_at: DateTime<Utc>,
    pub stream_url: String,
    pub producer: ProducerView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestSummary {
    pub id: Uuid,
    pub title: String,
    pub theme: String,
    pub status: ContestStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub ended: bool,
}

#[derive(Debug, Serialize)]
pub struct Leaderboard {
    pub contest: ContestSummary,
    pub entries: Vec<LeaderboardRow>,
}

pub fn stream_url(submission_id: Uuid) -> String {
    format!("/api/beats/{}/stream", submission_id)
}

async fn build_leaderboard(state: &AppState, contest: Contest) -> ApiResult<Leaderboard> {
    let ended = contest.has_ended(time::now());
    let ranked = votes::leaderboard(&state.db, contest.id).await?;

    let entries = ranked
        .into_iter()
        .map(|r| LeaderboardRow {
            rank: r.standing.rank,
            submission_id: r.standing.submission_id,
            votes: r.standing.votes,
            submitted_at: r.standing.submitted_at,
            stream_url: stream_url(r.standing.submission_id),
            producer: ProducerView::new(&r.producer, ended),
        })
        .collect();

    Ok(Leaderboard {
        contest: ContestSummary {
            id: contest.id,
            title: contest.title,
            theme: contest.theme,
            status: contest.status,
            start_date: contest.start_date,
            end_date: contest.end_date,
            ended,
        },
        entries,
    })
}

/// GET /api/contests/:id/leaderboard
pub async fn contest_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Leaderboard>> {
    let contest = contests::find_contest(&state.db, id)
        .await?
        .filter(|c| c.status != ContestStatus::Draft)
        .ok_or_else(|| ApiError::NotFound(format!("Contest {} not found", id)))?;

    Ok(Json(build_leaderboard(&state, contest).await?))
}

/// GET /api/leaderboard
///
/// One board per active or ended contest, newest start first.
pub async fn all_leaderboards(State(state): State<AppState>) -> ApiResult<Json<Vec<Leaderboard>>> {
    let mut boards = Vec::new();
    for contest in contests::list_published(&state.db).await? {
        boards.push(build_leaderboard(&state, contest).await?);
    }
    Ok(Json(boards))
}
