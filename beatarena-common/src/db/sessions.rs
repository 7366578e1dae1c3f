//! Login sessions
//!
//! The raw token is handed to the client once; only its SHA-256 digest is
//! stored, so a leaked database does not leak usable sessions.

use chrono::Duration;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::User;
use super::users::user_from_row;
use crate::auth::{generate_session_token, hash_session_token};
use crate::time;
use crate::Result;

/// Issue a session for `user_id`, returning the raw token
pub async fn create_session(pool: &SqlitePool, user_id: Uuid, ttl: Duration) -> Result<String> {
    let token = generate_session_token();
    let now = time::now();

    sqlx::query(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(hash_session_token(&token))
    .bind(user_id.to_string())
    .bind(time::to_db(&now))
    .bind(time::to_db(&(now + ttl)))
    .execute(pool)
    .await?;

    Ok(token)
}

/// Resolve a raw token to its user, ignoring expired sessions
pub async fn resolve_session(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT u.id, u.username, u.email, u.name, u.avatar, u.bio,
               u.soundcloud, u.instagram, u.twitter, u.role, u.created_at, u.updated_at
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = ? AND s.expires_at > ?
        "#,
    )
    .bind(hash_session_token(token))
    .bind(time::to_db(&time::now()))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Revoke a session; unknown tokens are ignored
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_session_token(token))
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove expired sessions, returning how many were deleted
pub async fn purge_expired(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(time::to_db(&time::now()))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
