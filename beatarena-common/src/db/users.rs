//! User account queries

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::models::{parse_id, NewUser, ProfileUpdate, SocialLinks, User};
use crate::auth::Role;
use crate::time;
use crate::{Error, Result};

const USER_COLUMNS: &str = "id, username, email, name, avatar, bio, soundcloud, instagram, twitter, role, created_at, updated_at";

/// Stored credentials for password login
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
    pub password_salt: String,
}

/// Emails are matched case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn user_from_row(row: &SqliteRow) -> Result<User> {
    let id: String = row.get("id");
    let role: String = row.get("role");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(User {
        id: parse_id(&id)?,
        username: row.get("username"),
        email: row.get("email"),
        name: row.get("name"),
        avatar: row.get("avatar"),
        bio: row.get("bio"),
        social_links: SocialLinks {
            soundcloud: row.get("soundcloud"),
            instagram: row.get("instagram"),
            twitter: row.get("twitter"),
        },
        role: role.parse::<Role>()?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

/// Create a new account
///
/// Username and email must be unused; a clash is reported as `Conflict`.
pub async fn create_user(pool: &SqlitePool, new_user: &NewUser) -> Result<User> {
    let username = new_user.username.trim();
    let email = normalize_email(&new_user.email);

    if username.is_empty() {
        return Err(Error::InvalidInput("Username is required".to_string()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(Error::InvalidInput("A valid email is required".to_string()));
    }

    let taken: Option<(String, String)> =
        sqlx::query_as("SELECT username, email FROM users WHERE username = ? OR email = ? LIMIT 1")
            .bind(username)
            .bind(&email)
            .fetch_optional(pool)
            .await?;

    if let Some((existing_username, _)) = taken {
        let field = if existing_username == username { "Username" } else { "Email" };
        return Err(Error::Conflict(format!("{} already in use", field)));
    }

    let id = Uuid::new_v4();
    let now = time::to_db(&time::now());
    let (hash, salt) = match &new_user.password {
        Some(p) => (p.hash.as_str(), p.salt.as_str()),
        None => ("", ""),
    };
    let (provider, subject) = match &new_user.oauth {
        Some((provider, subject)) => (Some(provider.as_str()), Some(subject.as_str())),
        None => (None, None),
    };

    sqlx::query(
        r#"
        INSERT INTO users (
            id, username, email, password_hash, password_salt, name, avatar, bio,
            role, oauth_provider, oauth_subject, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, '', ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(username)
    .bind(&email)
    .bind(hash)
    .bind(salt)
    .bind(new_user.name.trim())
    .bind(&new_user.avatar)
    .bind(new_user.role.as_str())
    .bind(provider)
    .bind(subject)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| Error::from_unique(e, "Username or email already in use"))?;

    get_user(pool, id).await
}

/// Load a user by id
pub async fn get_user(pool: &SqlitePool, id: Uuid) -> Result<User> {
    find_user(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", id)))
}

pub async fn find_user(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Load a user together with password hash and salt
pub async fn find_credentials_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Credentials>> {
    let row = sqlx::query(&format!(
        "SELECT {}, password_hash, password_salt FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(Credentials {
            user: user_from_row(&row)?,
            password_hash: row.get("password_hash"),
            password_salt: row.get("password_salt"),
        })),
        None => Ok(None),
    }
}

/// Find the account linked to an external identity
pub async fn find_by_oauth(pool: &SqlitePool, provider: &str, subject: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE oauth_provider = ? AND oauth_subject = ?",
        USER_COLUMNS
    ))
    .bind(provider)
    .bind(subject)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Attach an external identity to an existing account
pub async fn link_oauth(pool: &SqlitePool, user_id: Uuid, provider: &str, subject: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET oauth_provider = ?, oauth_subject = ?, updated_at = ? WHERE id = ?",
    )
    .bind(provider)
    .bind(subject)
    .bind(time::to_db(&time::now()))
    .bind(user_id.to_string())
    .execute(pool)
    .await
    .map_err(|e| Error::from_unique(e, "External account already linked to another user"))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {}", user_id)));
    }
    Ok(())
}

/// Pick a username derived from `base` that is not yet taken
pub async fn available_username(pool: &SqlitePool, base: &str) -> Result<String> {
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase();
    let cleaned = if cleaned.is_empty() { "producer".to_string() } else { cleaned };

    let mut candidate = cleaned.clone();
    let mut suffix = 1;
    loop {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE username = ?")
            .bind(&candidate)
            .fetch_optional(pool)
            .await?;
        if exists.is_none() {
            return Ok(candidate);
        }
        suffix += 1;
        candidate = format!("{}{}", cleaned, suffix);
    }
}

/// Apply a partial profile update
///
/// Absent fields keep their value; a blank name is rejected.
pub async fn update_profile(pool: &SqlitePool, user_id: Uuid, update: &ProfileUpdate) -> Result<User> {
    let current = get_user(pool, user_id).await?;

    let name = match &update.name {
        Some(name) if name.trim().is_empty() => {
            return Err(Error::InvalidInput("Name cannot be empty".to_string()));
        }
        Some(name) => name.trim().to_string(),
        None => current.name,
    };
    let bio = update.bio.clone().unwrap_or(current.bio);
    let links = update.social_links.clone().unwrap_or(current.social_links);
    let blank_to_none = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    sqlx::query(
        r#"
        UPDATE users
        SET name = ?, bio = ?, soundcloud = ?, instagram = ?, twitter = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(&bio)
    .bind(blank_to_none(links.soundcloud))
    .bind(blank_to_none(links.instagram))
    .bind(blank_to_none(links.twitter))
    .bind(time::to_db(&time::now()))
    .bind(user_id.to_string())
    .execute(pool)
    .await?;

    get_user(pool, user_id).await
}

