//! Duel voting endpoints

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use beatarena_common::db::{contests, votes, Contest, Vote};
use beatarena_common::voting::{eligible_pool, select_pair, Ballot, PairSelection, VoteBudget};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::auth::CurrentUser;
use super::leaderboard::stream_url;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestQuery {
    pub contest_id: Option<Uuid>,
}

impl ContestQuery {
    fn require(&self) -> ApiResult<Uuid> {
        self.contest_id
            .ok_or_else(|| ApiError::BadRequest("contestId is required".to_string()))
    }
}

/// One side of a duel
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelBeat {
    pub id: Uuid,
    pub stream_url: String,
}

impl DuelBeat {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            stream_url: stream_url(id),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairResponse {
    pub contest_id: Uuid,
    pub beat_a: DuelBeat,
    pub beat_b: DuelBeat,
    pub remaining_votes: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub contest_id: Uuid,
    pub beat1_id: Uuid,
    pub beat2_id: Uuid,
    pub voted_beat_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub vote: Vote,
    pub remaining_votes: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCount {
    pub contest_id: Uuid,
    pub used: u32,
    pub remaining: u32,
    pub limit: u32,
}

async fn active_contest(state: &AppState, id: Uuid) -> ApiResult<Contest> {
    contests::find_contest(&state.db, id)
        .await?
        .filter(|c| c.is_open())
        .ok_or_else(|| ApiError::NotFound("Contest not found or not active".to_string()))
}

fn budget(state: &AppState) -> VoteBudget {
    VoteBudget::new(state.config.votes_per_contest)
}

/// GET /api/votes/pair?contestId=..
pub async fn next_pair(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ContestQuery>,
) -> ApiResult<Json<PairResponse>> {
    let contest = active_contest(&state, query.require()?).await?;
    let voter = current.user.id;

    let budget = budget(&state);
    let used = votes::count_votes(&state.db, contest.id, voter).await?;
    budget.check(used)?;

    let candidates = votes::candidates(&state.db, contest.id).await?;
    let pool = eligible_pool(&candidates, voter);
    let judged = votes::voted_pairs(&state.db, contest.id, voter).await?;

    let selection = select_pair(&pool, &judged, &mut rand::thread_rng());
    match selection {
        PairSelection::Pair(a, b) => {
            debug!("Pair for {} in {}: {} vs {}", voter, contest.id, a, b);
            Ok(Json(PairResponse {
                contest_id: contest.id,
                beat_a: DuelBeat::new(a),
                beat_b: DuelBeat::new(b),
                remaining_votes: budget.remaining(used),
            }))
        }
        PairSelection::NotEnoughSubmissions => Err(ApiError::BadRequest(
            "Not enough submissions to vote".to_string(),
        )),
        PairSelection::Exhausted => Err(ApiError::Conflict(
            "You have already voted on every available pair".to_string(),
        )),
    }
}

/// POST /api/votes
pub async fn cast_vote(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<VoteRequest>,
) -> ApiResult<(StatusCode, Json<VoteResponse>)> {
    let contest = active_contest(&state, request.contest_id).await?;
    let budget = budget(&state);

    let ballot = Ballot {
        beat1: request.beat1_id,
        beat2: request.beat2_id,
        voted: request.voted_beat_id,
    };
    let vote = votes::cast_vote(&state.db, contest.id, current.user.id, ballot, budget).await?;
    let used = votes::count_votes(&state.db, contest.id, current.user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(VoteResponse {
            vote,
            remaining_votes: budget.remaining(used),
        }),
    ))
}

/// GET /api/votes/counts
pub async fn vote_counts(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<VoteCount>>> {
    let budget = budget(&state);
    let counts = votes::usage_for_voter(&state.db, current.user.id)
        .await?
        .into_iter()
        .map(|(contest_id, used)| VoteCount {
            contest_id,
            used,
            remaining: budget.remaining(used),
            limit: budget.limit,
        })
        .collect();
    Ok(Json(counts))
}

/// GET /api/votes/stats?contestId=..
///
/// Votes won per submission; submissions without votes are absent.
pub async fn vote_stats(
    State(state): State<AppState>,
    Query(query): Query<ContestQuery>,
) -> ApiResult<Json<HashMap<Uuid, u32>>> {
    let contest_id = query.require()?;
    contests::get_contest(&state.db, contest_id).await?;
    Ok(Json(votes::vote_stats(&state.db, contest_id).await?))
}
