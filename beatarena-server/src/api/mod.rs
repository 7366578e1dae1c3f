//! HTTP API handlers

pub mod accounts;
pub mod admin;
pub mod auth;
pub mod contests;
pub mod health;
pub mod leaderboard;
pub mod profile;
pub mod submissions;
pub mod votes;

pub use auth::{require_admin, require_session, CurrentUser};
pub use health::health_routes;
