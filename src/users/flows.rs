//! Account flows that need bcrypt.
//!
//! Each flow reads what it needs under the state lock, releases it, hashes or
//! verifies on the blocking pool, and re-takes the lock only to commit. Guards
//! are scoped so none of them lives across an `.await`.

use crate::error::AppError;
use crate::state::AppState;
use crate::users::accounts::{AccountError, Registration, UserUpdate};
use crate::users::password::{hash_in_background, prepare_in_background, verify_in_background};
use crate::users::{NewUser, User, UserId};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use time::OffsetDateTime;
use tracing::{info, warn};

type SharedState = Arc<RwLock<AppState>>;

fn read(state: &SharedState) -> Result<RwLockReadGuard<'_, AppState>, AppError> {
    state.read().map_err(|_| AppError::StateLock)
}

fn write(state: &SharedState) -> Result<RwLockWriteGuard<'_, AppState>, AppError> {
    state.write().map_err(|_| AppError::StateLock)
}

pub async fn register_account(
    state: &SharedState,
    registration: Registration,
    now: OffsetDateTime,
) -> Result<User, AccountError> {
    info!(email = %registration.email, "Registration attempt");
    let cost = {
        let guard = read(state)?;
        guard
            .accounts()
            .ensure_email_available(&registration.email)?;
        guard.accounts().settings().bcrypt_cost
    };

    let Registration {
        email,
        password,
        first_name,
        last_name,
    } = registration;
    let password_hash = prepare_in_background(password, cost).await?;

    let mut guard = write(state)?;
    guard.accounts_mut().register(
        NewUser {
            email,
            password_hash,
            first_name,
            last_name,
        },
        now,
    )
}

pub async fn login_account(
    state: &SharedState,
    email: &str,
    password: &str,
) -> Result<User, AccountError> {
    let user = {
        let guard = read(state)?;
        guard.accounts().login_candidate(email)?
    };

    if !verify_in_background(password.to_string(), user.password_hash.clone()).await {
        warn!(email, "Invalid password");
        return Err(AccountError::InvalidCredentials);
    }
    info!(user_id = user.user_id, "Login successful");
    Ok(user)
}

pub async fn reset_account_password(
    state: &SharedState,
    email: Option<&str>,
    token: Option<&str>,
    new_password: Option<&str>,
    now: OffsetDateTime,
) -> Result<(), AccountError> {
    let (Some(email), Some(token), Some(new_password)) = (email, token, new_password) else {
        return Err(AccountError::MissingParameters);
    };
    let cost = {
        let guard = read(state)?;
        guard.accounts().check_reset_token(email, token, now)?;
        guard.accounts().settings().bcrypt_cost
    };

    let password_hash = hash_in_background(new_password.to_string(), cost).await?;

    // The token is checked again: it may have been reissued while hashing.
    let mut guard = write(state)?;
    guard
        .accounts_mut()
        .reset_password(email, token, password_hash, now)
}

pub async fn update_account(
    state: &SharedState,
    user_id: UserId,
    mut update: UserUpdate,
) -> Result<User, AccountError> {
    let cost = {
        let guard = read(state)?;
        guard.accounts().get(user_id)?;
        guard.accounts().settings().bcrypt_cost
    };

    let password_hash = match update.take_new_password() {
        Some(raw) => Some(hash_in_background(raw, cost).await?),
        None => None,
    };

    let mut guard = write(state)?;
    guard.accounts_mut().update(user_id, update, password_hash)
}
