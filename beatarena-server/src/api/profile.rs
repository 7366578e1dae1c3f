//! Profile and rewards of the signed-in user

use axum::{extract::State, Extension, Json};
use beatarena_common::db::{contests, submissions, users, votes, ProfileUpdate, User};
use beatarena_common::time;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Win,
    Participation,
}

#[derive(Debug, Serialize)]
pub struct Reward {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: RewardType,
}

/// GET /api/user/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<User>> {
    Ok(Json(users::get_user(&state.db, current.user.id).await?))
}

/// PUT /api/user/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    Ok(Json(users::update_profile(&state.db, current.user.id, &update).await?))
}

/// GET /api/user/rewards
///
/// One participation reward per contest entered, plus a win for every ended
/// contest where the user's submission is ranked first with at least one
/// vote. Newest first.
pub async fn rewards(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Reward>>> {
    let now = time::now();
    let mut rewards = Vec::new();

    for submission in submissions::list_for_user(&state.db, current.user.id).await? {
        let contest = contests::get_contest(&state.db, submission.contest_id).await?;

        rewards.push(Reward {
            id: format!("participation-{}", contest.id),
            title: "Contest Entry".to_string(),
            description: format!("Entered \"{}\"", contest.title),
            date: submission.submitted_at,
            kind: RewardType::Participation,
        });

        if !contest.has_ended(now) {
            continue;
        }

        let board = votes::leaderboard(&state.db, contest.id).await?;
        let won = board.iter().any(|r| {
            r.standing.submission_id == submission.id && r.standing.rank == 1 && r.standing.votes > 0
        });
        if won {
            rewards.push(Reward {
                id: format!("win-{}", contest.id),
                title: "Contest Winner".to_string(),
                description: format!("Won \"{}\"", contest.title),
                date: contest.end_date.min(now),
                kind: RewardType::Win,
            });
        }
    }

    rewards.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(Json(rewards))
}
