//! Database models and queries

pub mod contests;
pub mod init;
pub mod models;
pub mod sessions;
pub mod submissions;
pub mod users;
pub mod votes;

pub use init::init_database;
pub use models::*;
