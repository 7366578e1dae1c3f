//! # BeatArena Common Library
//!
//! Shared code for the BeatArena contest service:
//! - Database schema and queries (users, sessions, contests, submissions, votes)
//! - Pairwise voting and leaderboard ranking
//! - Audio excerpt selection and WAV re-encoding
//! - Credential hashing and session tokens
//! - Configuration loading

pub mod audio;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod time;
pub mod voting;

pub use error::{Error, Result};
