//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::Role;
use crate::{Error, Result};

/// Parse a stored id
pub(crate) fn parse_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Invalid stored id '{}': {}", value, e)))
}

// ========================================
// Users
// ========================================

/// Optional links shown on a producer profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub soundcloud: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
}

/// Account as exposed by the API (never carries credentials)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: String,
    pub avatar: String,
    pub bio: String,
    pub social_links: SocialLinks,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Fields needed to create an account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub name: String,
    pub avatar: String,
    pub role: Role,
    /// Absent for accounts created through OAuth
    pub password: Option<crate::auth::PasswordHash>,
    /// `(provider, subject)` for accounts created through OAuth
    pub oauth: Option<(String, String)>,
}

/// Editable profile fields
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub social_links: Option<SocialLinks>,
}

// ========================================
// Contests
// ========================================

/// Contest lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContestStatus {
    Draft,
    Active,
    Ended,
}

impl ContestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContestStatus::Draft => "draft",
            ContestStatus::Active => "active",
            ContestStatus::Ended => "ended",
        }
    }

    /// Lifecycle only moves forward: draft → active → ended (or draft → ended)
    pub fn can_transition_to(&self, next: ContestStatus) -> bool {
        use ContestStatus::*;
        matches!(
            (*self, next),
            (Draft, Draft) | (Draft, Active) | (Draft, Ended) | (Active, Active) | (Active, Ended) | (Ended, Ended)
        )
    }
}

impl fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(ContestStatus::Draft),
            "active" => Ok(ContestStatus::Active),
            "ended" => Ok(ContestStatus::Ended),
            other => Err(Error::InvalidInput(format!("Unknown contest status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contest {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub theme: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub cover_image: String,
    pub rules: String,
    pub status: ContestStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contest {
    /// Submissions and votes are accepted only while active
    pub fn is_open(&self) -> bool {
        self.status == ContestStatus::Active
    }

    /// Active and inside its date window
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && self.start_date <= now && now <= self.end_date
    }

    /// Results (and producer identities) are public once this is true
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.status == ContestStatus::Ended || self.end_date < now
    }
}

/// Public name and avatar of a user shown next to content
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Creator {
    pub id: Uuid,
    pub name: String,
    pub avatar: String,
}

/// Contest with its creator's public identity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestWithCreator {
    #[serde(flatten)]
    pub contest: Contest,
    pub created_by_user: Creator,
}

/// Admin input for a new contest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContest {
    pub title: String,
    pub description: String,
    pub theme: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub cover_image: String,
    pub rules: String,
    #[serde(default)]
    pub status: Option<ContestStatus>,
}

impl NewContest {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("title", &self.title),
            ("description", &self.description),
            ("theme", &self.theme),
            ("coverImage", &self.cover_image),
            ("rules", &self.rules),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::InvalidInput(format!("Missing required field: {}", field)));
            }
        }
        if self.end_date <= self.start_date {
            return Err(Error::InvalidInput("End date must be after start date".to_string()));
        }
        Ok(())
    }
}

// ========================================
// Submissions
// ========================================

/// Moderation status of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for SubmissionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "approved" => Ok(SubmissionStatus::Approved),
            "rejected" => Ok(SubmissionStatus::Rejected),
            other => Err(Error::InvalidInput(format!("Unknown submission status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub contest_id: Uuid,
    pub user_id: Uuid,
    /// Excerpt file name relative to the uploads directory
    #[serde(skip_serializing)]
    pub track_path: String,
    pub extract_start: f64,
    pub extract_end: f64,
    /// Duration of the full uploaded track in seconds
    pub duration: f64,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Fields needed to record a submission
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub id: Uuid,
    pub contest_id: Uuid,
    pub user_id: Uuid,
    pub track_path: String,
    pub extract_start: f64,
    pub extract_end: f64,
    pub duration: f64,
}

/// Submission joined with its producer's public identity
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionWithProducer {
    pub submission: Submission,
    pub producer: Creator,
}

// ========================================
// Votes
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: Uuid,
    pub contest_id: Uuid,
    pub voter_id: Uuid,
    pub beat1_id: Uuid,
    pub beat2_id: Uuid,
    pub voted_beat_id: Uuid,
    pub created_at: DateTime<Utc>,
}
