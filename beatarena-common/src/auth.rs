//! Credential hashing and session tokens
//!
//! Passwords are stored as a random salt plus an iterated SHA-256 digest.
//! Session tokens are random 32-byte values handed to the client once; only
//! their SHA-256 digest is persisted.
//!
//! This module contains ONLY pure functions. Session persistence lives in
//! `db::sessions`, HTTP extraction in the server crate.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Rounds of SHA-256 applied to salted passwords
pub const PASSWORD_HASH_ROUNDS: u32 = 10_000;

const SALT_BYTES: usize = 16;
const TOKEN_BYTES: usize = 32;

/// Account role used for route gating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

/// Salted password digest as stored in the `users` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> PasswordHash {
    let salt = random_hex(SALT_BYTES);
    let hash = hash_with_salt(password, &salt);
    PasswordHash { hash, salt }
}

/// Check a password against a stored hash and salt
///
/// Accounts created through OAuth have an empty hash and never match.
pub fn verify_password(password: &str, stored_hash: &str, salt: &str) -> bool {
    if stored_hash.is_empty() {
        return false;
    }
    let calculated = hash_with_salt(password, salt);
    constant_time_eq(calculated.as_bytes(), stored_hash.as_bytes())
}

fn hash_with_salt(password: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();

    for _ in 1..PASSWORD_HASH_ROUNDS {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt.as_bytes())
            .finalize();
    }

    format!("{:x}", digest)
}

/// Generate a new session token (64 hex characters)
pub fn generate_session_token() -> String {
    random_hex(TOKEN_BYTES)
}

/// Digest under which a session token is stored
pub fn hash_session_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Random hex string of `bytes` random bytes
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{:02x}", b)).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Default avatar for a username
pub fn default_avatar(username: &str) -> String {
    format!("https://api.dicebear.com/7.x/avataaars/svg?seed={}", username)
}
