//! Contest queries

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::models::{parse_id, Contest, ContestStatus, ContestWithCreator, Creator, NewContest};
use crate::time;
use crate::{Error, Result};

const CONTEST_COLUMNS: &str = "c.id, c.title, c.description, c.theme, c.start_date, c.end_date, \
     c.cover_image, c.rules, c.status, c.created_by, c.created_at, c.updated_at";

fn contest_from_row(row: &SqliteRow) -> Result<Contest> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let created_by: String = row.get("created_by");
    let start_date: String = row.get("start_date");
    let end_date: String = row.get("end_date");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Contest {
        id: parse_id(&id)?,
        title: row.get("title"),
        description: row.get("description"),
        theme: row.get("theme"),
        start_date: time::from_db(&start_date)?,
        end_date: time::from_db(&end_date)?,
        cover_image: row.get("cover_image"),
        rules: row.get("rules"),
        status: status.parse()?,
        created_by: parse_id(&created_by)?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

fn with_creator_from_row(row: &SqliteRow) -> Result<ContestWithCreator> {
    let contest = contest_from_row(row)?;
    Ok(ContestWithCreator {
        created_by_user: Creator {
            id: contest.created_by,
            name: row.get("creator_name"),
            avatar: row.get("creator_avatar"),
        },
        contest,
    })
}

/// Insert a contest authored by `created_by`; status defaults to draft
pub async fn create_contest(pool: &SqlitePool, created_by: Uuid, new_contest: &NewContest) -> Result<Contest> {
    new_contest.validate()?;

    let id = Uuid::new_v4();
    let now = time::to_db(&time::now());
    let status = new_contest.status.unwrap_or(ContestStatus::Draft);

    sqlx::query(
        r#"
        INSERT INTO contests (
            id, title, description, theme, start_date, end_date, cover_image,
            rules, status, created_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(new_contest.title.trim())
    .bind(new_contest.description.trim())
    .bind(new_contest.theme.trim())
    .bind(time::to_db(&new_contest.start_date))
    .bind(time::to_db(&new_contest.end_date))
    .bind(new_contest.cover_image.trim())
    .bind(new_contest.rules.trim())
    .bind(status.as_str())
    .bind(created_by.to_string())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    info!("Created contest {} ({})", id, status);

    get_contest(pool, id).await
}

pub async fn get_contest(pool: &SqlitePool, id: Uuid) -> Result<Contest> {
    find_contest(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Contest {}", id)))
}

pub async fn find_contest(pool: &SqlitePool, id: Uuid) -> Result<Option<Contest>> {
    let row = sqlx::query(&format!("SELECT {} FROM contests c WHERE c.id = ?", CONTEST_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(contest_from_row).transpose()
}

pub async fn get_with_creator(pool: &SqlitePool, id: Uuid) -> Result<ContestWithCreator> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {}, u.name AS creator_name, u.avatar AS creator_avatar
        FROM contests c
        JOIN users u ON u.id = c.created_by
        WHERE c.id = ?
        "#,
        CONTEST_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => with_creator_from_row(&row),
        None => Err(Error::NotFound(format!("Contest {}", id))),
    }
}

/// Active contests, newest start first
pub async fn list_active(pool: &SqlitePool) -> Result<Vec<ContestWithCreator>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}, u.name AS creator_name, u.avatar AS creator_avatar
        FROM contests c
        JOIN users u ON u.id = c.created_by
        WHERE c.status = 'active'
        ORDER BY c.start_date DESC
        "#,
        CONTEST_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(with_creator_from_row).collect()
}

/// Contests that have (or had) public results, newest start first
pub async fn list_published(pool: &SqlitePool) -> Result<Vec<Contest>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM contests c WHERE c.status IN ('active', 'ended') ORDER BY c.start_date DESC",
        CONTEST_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(contest_from_row).collect()
}

/// Every contest, newest created first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<ContestWithCreator>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}, u.name AS creator_name, u.avatar AS creator_avatar
        FROM contests c
        JOIN users u ON u.id = c.created_by
        ORDER BY c.created_at DESC
        "#,
        CONTEST_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(with_creator_from_row).collect()
}

/// The active contest whose date window contains `now`
///
/// When windows overlap the most recently started one wins.
pub async fn find_current(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Option<ContestWithCreator>> {
    let now = time::to_db(&now);
    let row = sqlx::query(&format!(
        r#"
        SELECT {}, u.name AS creator_name, u.avatar AS creator_avatar
        FROM contests c
        JOIN users u ON u.id = c.created_by
        WHERE c.status = 'active' AND c.start_date <= ? AND c.end_date >= ?
        ORDER BY c.start_date DESC
        LIMIT 1
        "#,
        CONTEST_COLUMNS
    ))
    .bind(&now)
    .bind(&now)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(with_creator_from_row).transpose()
}

/// Move a contest along its lifecycle
///
/// Backwards transitions are rejected; setting the current status again is
/// a no-op.
pub async fn update_status(pool: &SqlitePool, id: Uuid, next: ContestStatus) -> Result<Contest> {
    let contest = get_contest(pool, id).await?;

    if !contest.status.can_transition_to(next) {
        return Err(Error::InvalidInput(format!(
            "Cannot change contest status from {} to {}",
            contest.status, next
        )));
    }
    if contest.status == next {
        return Ok(contest);
    }

    sqlx::query("UPDATE contests SET status = ?, updated_at = ? WHERE id = ?")
        .bind(next.as_str())
        .bind(time::to_db(&time::now()))
        .bind(id.to_string())
        .execute(pool)
        .await?;

    info!("Contest {} status {} -> {}", id, contest.status, next);

    get_contest(pool, id).await
}
