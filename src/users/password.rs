//! bcrypt helpers.
//!
//! Hashing at a realistic cost takes tens of milliseconds, so request paths
//! use the `*_in_background` variants, which run on tokio's blocking pool.

use thiserror::Error;
use tokio::task::JoinError;

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("password hashing task failed: {0}")]
    Task(#[from] JoinError),
}

pub fn hash_password(raw: &str, cost: u32) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(raw, cost)?)
}

/// Whether `value` already looks like a bcrypt hash rather than a raw password.
pub fn is_hashed(value: &str) -> bool {
    BCRYPT_PREFIXES.iter().any(|prefix| value.starts_with(prefix))
}

/// Malformed hashes never match.
pub fn verify_password(raw: &str, hash: &str) -> bool {
    bcrypt::verify(raw, hash).unwrap_or(false)
}

pub async fn hash_in_background(raw: String, cost: u32) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&raw, cost)).await?
}

/// Hash `password` unless the client already sent a bcrypt hash.
pub async fn prepare_in_background(password: String, cost: u32) -> Result<String, PasswordError> {
    if is_hashed(&password) {
        return Ok(password);
    }
    hash_in_background(password, cost).await
}

/// A failed blocking task counts as a mismatch.
pub async fn verify_in_background(raw: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&raw, &hash))
        .await
        .unwrap_or(false)
}
