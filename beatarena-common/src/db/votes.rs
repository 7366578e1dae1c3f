//! Vote queries
//!
//! Casting a vote runs every check and the insert in one transaction. The
//! budget is enforced by the insert itself (`INSERT ... SELECT ... WHERE
//! count < limit`), so two concurrent votes cannot both take the last slot,
//! and the unique index on `(contest_id, voter_id, pair_low, pair_high)`
//! backs the one-vote-per-pair rule.

use std::collections::{HashMap, HashSet};

use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::models::{parse_id, Creator, SubmissionStatus, Vote};
use super::submissions::list_with_producers;
use crate::time;
use crate::voting::{rank, tally, Ballot, Candidate, LeaderboardEntry, PairKey, Standing, VoteBudget};
use crate::{Error, Result};

/// Leaderboard row joined with the producer's public identity
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSubmission {
    pub standing: Standing,
    pub producer: Creator,
}

/// Record a duel vote
pub async fn cast_vote(
    pool: &SqlitePool,
    contest_id: Uuid,
    voter_id: Uuid,
    ballot: Ballot,
    budget: VoteBudget,
) -> Result<Vote> {
    let key = ballot.validate()?;
    let contest = contest_id.to_string();
    let voter = voter_id.to_string();

    let mut tx = pool.begin().await?;

    let rows = sqlx::query(
        "SELECT id, user_id, status FROM submissions WHERE contest_id = ? AND id IN (?, ?)",
    )
    .bind(&contest)
    .bind(ballot.beat1.to_string())
    .bind(ballot.beat2.to_string())
    .fetch_all(&mut *tx)
    .await?;

    if rows.len() != 2 {
        return Err(Error::InvalidInput(
            "Both beats must be submissions to this contest".to_string(),
        ));
    }
    for row in &rows {
        let owner: String = row.get("user_id");
        let status: String = row.get("status");
        if parse_id(&owner)? == voter_id {
            return Err(Error::InvalidInput(
                "You cannot vote on your own submission".to_string(),
            ));
        }
        if status.parse::<SubmissionStatus>()? == SubmissionStatus::Rejected {
            return Err(Error::InvalidInput(
                "Rejected submissions cannot be voted on".to_string(),
            ));
        }
    }

    let already: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM votes WHERE contest_id = ? AND voter_id = ? AND pair_low = ? AND pair_high = ?",
    )
    .bind(&contest)
    .bind(&voter)
    .bind(key.low.to_string())
    .bind(key.high.to_string())
    .fetch_optional(&mut *tx)
    .await?;

    if already.is_some() {
        return Err(Error::Conflict("You have already voted on this pair".to_string()));
    }

    let id = Uuid::new_v4();
    let created_at = time::now();

    let result = sqlx::query(
        r#"
        INSERT INTO votes (
            id, contest_id, voter_id, beat1_id, beat2_id, voted_id,
            pair_low, pair_high, created_at
        )
        SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?
        WHERE (SELECT COUNT(*) FROM votes WHERE contest_id = ? AND voter_id = ?) < ?
        "#,
    )
    .bind(id.to_string())
    .bind(&contest)
    .bind(&voter)
    .bind(ballot.beat1.to_string())
    .bind(ballot.beat2.to_string())
    .bind(ballot.voted.to_string())
    .bind(key.low.to_string())
    .bind(key.high.to_string())
    .bind(time::to_db(&created_at))
    .bind(&contest)
    .bind(&voter)
    .bind(i64::from(budget.limit))
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::from_unique(e, "You have already voted on this pair"))?;

    if result.rows_affected() == 0 {
        return Err(VoteBudget::exhausted());
    }

    tx.commit().await?;

    debug!("Vote {} by {} in contest {}", id, voter_id, contest_id);

    Ok(Vote {
        id,
        contest_id,
        voter_id,
        beat1_id: ballot.beat1,
        beat2_id: ballot.beat2,
        voted_beat_id: ballot.voted,
        created_at,
    })
}

/// Non-rejected submissions that can appear in duels
pub async fn candidates(pool: &SqlitePool, contest_id: Uuid) -> Result<Vec<Candidate>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT id, user_id FROM submissions WHERE contest_id = ? AND status != 'rejected' ORDER BY submitted_at, id",
    )
    .bind(contest_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|(id, owner)| {
            Ok(Candidate {
                submission_id: parse_id(id)?,
                owner_id: parse_id(owner)?,
            })
        })
        .collect()
}

/// Pairs the voter has already judged in a contest
pub async fn voted_pairs(pool: &SqlitePool, contest_id: Uuid, voter_id: Uuid) -> Result<HashSet<PairKey>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT pair_low, pair_high FROM votes WHERE contest_id = ? AND voter_id = ?",
    )
    .bind(contest_id.to_string())
    .bind(voter_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|(low, high)| Ok(PairKey::new(parse_id(low)?, parse_id(high)?)))
        .collect()
}

/// Votes cast by a voter in a contest
pub async fn count_votes(pool: &SqlitePool, contest_id: Uuid, voter_id: Uuid) -> Result<u32> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE contest_id = ? AND voter_id = ?")
        .bind(contest_id.to_string())
        .bind(voter_id.to_string())
        .fetch_one(pool)
        .await?;

    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

/// Votes used per contest for every active contest and every contest the
/// voter took part in
pub async fn usage_for_voter(pool: &SqlitePool, voter_id: Uuid) -> Result<Vec<(Uuid, u32)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT c.id, (SELECT COUNT(*) FROM votes v WHERE v.contest_id = c.id AND v.voter_id = ?) AS used
        FROM contests c
        WHERE c.status = 'active'
           OR EXISTS (SELECT 1 FROM votes v WHERE v.contest_id = c.id AND v.voter_id = ?)
        ORDER BY c.start_date DESC
        "#,
    )
    .bind(voter_id.to_string())
    .bind(voter_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|(id, used)| Ok((parse_id(id)?, u32::try_from(*used).unwrap_or(u32::MAX))))
        .collect()
}

/// Votes won per submission in a contest
pub async fn vote_stats(pool: &SqlitePool, contest_id: Uuid) -> Result<HashMap<Uuid, u32>> {
    let rows: Vec<String> = sqlx::query_scalar("SELECT voted_id FROM votes WHERE contest_id = ?")
        .bind(contest_id.to_string())
        .fetch_all(pool)
        .await?;

    let winners = rows.iter().map(|id| parse_id(id)).collect::<Result<Vec<_>>>()?;
    Ok(tally(winners))
}

/// Ranked leaderboard of a contest's non-rejected submissions
pub async fn leaderboard(pool: &SqlitePool, contest_id: Uuid) -> Result<Vec<RankedSubmission>> {
    let submissions = list_with_producers(pool, contest_id).await?;
    let stats = vote_stats(pool, contest_id).await?;

    let producers: HashMap<Uuid, Creator> = submissions
        .iter()
        .map(|s| (s.submission.id, s.producer.clone()))
        .collect();

    let entries = submissions
        .iter()
        .map(|s| LeaderboardEntry {
            submission_id: s.submission.id,
            owner_id: s.submission.user_id,
            submitted_at: s.submission.submitted_at,
        })
        .collect();

    Ok(rank(entries, &stats)
        .into_iter()
        .filter_map(|standing| {
            producers
                .get(&standing.submission_id)
                .cloned()
                .map(|producer| RankedSubmission { standing, producer })
        })
        .collect())
}
