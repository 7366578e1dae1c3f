//! Submission queries

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::models::{parse_id, Creator, NewSubmission, Submission, SubmissionStatus, SubmissionWithProducer};
use crate::time;
use crate::{Error, Result};

const SUBMISSION_COLUMNS: &str = "s.id, s.contest_id, s.user_id, s.track_path, s.extract_start, \
     s.extract_end, s.duration, s.status, s.submitted_at";

fn submission_from_row(row: &SqliteRow) -> Result<Submission> {
    let id: String = row.get("id");
    let contest_id: String = row.get("contest_id");
    let user_id: String = row.get("user_id");
    let status: String = row.get("status");
    let submitted_at: String = row.get("submitted_at");

    Ok(Submission {
        id: parse_id(&id)?,
        contest_id: parse_id(&contest_id)?,
        user_id: parse_id(&user_id)?,
        track_path: row.get("track_path"),
        extract_start: row.get("extract_start"),
        extract_end: row.get("extract_end"),
        duration: row.get("duration"),
        status: status.parse()?,
        submitted_at: time::from_db(&submitted_at)?,
    })
}

/// Record a submission
///
/// A second submission by the same user to the same contest is a `Conflict`.
pub async fn create_submission(pool: &SqlitePool, new_submission: &NewSubmission) -> Result<Submission> {
    sqlx::query(
        r#"
        INSERT INTO submissions (
            id, contest_id, user_id, track_path, extract_start, extract_end,
            duration, status, submitted_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(new_submission.id.to_string())
    .bind(new_submission.contest_id.to_string())
    .bind(new_submission.user_id.to_string())
    .bind(&new_submission.track_path)
    .bind(new_submission.extract_start)
    .bind(new_submission.extract_end)
    .bind(new_submission.duration)
    .bind(time::to_db(&time::now()))
    .execute(pool)
    .await
    .map_err(|e| Error::from_unique(e, "You have already submitted a track for this contest"))?;

    get_submission(pool, new_submission.id).await
}

pub async fn get_submission(pool: &SqlitePool, id: Uuid) -> Result<Submission> {
    let row = sqlx::query(&format!("SELECT {} FROM submissions s WHERE s.id = ?", SUBMISSION_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => submission_from_row(&row),
        None => Err(Error::NotFound(format!("Submission {}", id))),
    }
}

pub async fn find_by_contest_and_user(
    pool: &SqlitePool,
    contest_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Submission>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM submissions s WHERE s.contest_id = ? AND s.user_id = ?",
        SUBMISSION_COLUMNS
    ))
    .bind(contest_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(submission_from_row).transpose()
}

/// A user's submissions across contests, newest first
pub async fn list_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Submission>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM submissions s WHERE s.user_id = ? ORDER BY s.submitted_at DESC",
        SUBMISSION_COLUMNS
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(submission_from_row).collect()
}

/// Non-rejected submissions of a contest with their producers
pub async fn list_with_producers(pool: &SqlitePool, contest_id: Uuid) -> Result<Vec<SubmissionWithProducer>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}, u.name AS producer_name, u.avatar AS producer_avatar
        FROM submissions s
        JOIN users u ON u.id = s.user_id
        WHERE s.contest_id = ? AND s.status != 'rejected'
        ORDER BY s.submitted_at, s.id
        "#,
        SUBMISSION_COLUMNS
    ))
    .bind(contest_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let submission = submission_from_row(row)?;
            Ok(SubmissionWithProducer {
                producer: Creator {
                    id: submission.user_id,
                    name: row.get("producer_name"),
                    avatar: row.get("producer_avatar"),
                },
                submission,
            })
        })
        .collect()
}

/// Delete a submission (its votes cascade), returning the deleted row
pub async fn delete_submission(pool: &SqlitePool, id: Uuid) -> Result<Submission> {
    let submission = get_submission(pool, id).await?;

    sqlx::query("DELETE FROM submissions WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(submission)
}

pub async fn update_status(pool: &SqlitePool, id: Uuid, status: SubmissionStatus) -> Result<Submission> {
    let result = sqlx::query("UPDATE submissions SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Submission {}", id)));
    }

    get_submission(pool, id).await
}
