//! Account state transitions: registration, email verification, login and password reset.
//!
//! Every flow takes the current time explicitly; codes and tokens are six
//! random digits with an expiry taken from [`AuthSettings`]. Methods here
//! never hash: callers pass bcrypt hashes prepared off the request thread
//! (see [`crate::users::flows`]).

use crate::config::AuthSettings;
use crate::error::AppError;
use crate::mailer::{MailError, Mailer, password_reset_email, verification_email};
use crate::users::password::{PasswordError, is_hashed};
use crate::users::{NewUser, User, UserId, UserStore};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Please verify your email before logging in")]
    EmailNotVerified { email: String },
    #[error("User not found")]
    UserNotFound,
    #[error("No account found with that email address")]
    AccountNotFound,
    #[error("Verification code expired. Please request a new one.")]
    VerificationCodeExpired,
    #[error("Invalid verification code")]
    InvalidVerificationCode,
    #[error("Missing required parameters")]
    MissingParameters,
    #[error("Invalid reset code")]
    InvalidResetCode,
    #[error("Reset code has expired. Please request a new one.")]
    ResetCodeExpired,
    #[error("code expiry out of range")]
    ExpiryOutOfRange,
    #[error("Failed to send email. Please try again later.")]
    VerificationEmailFailed(#[source] MailError),
    #[error("Failed to send reset email. Please try again later.")]
    ResetEmailFailed(#[source] MailError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    State(#[from] AppError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    /// Raw password; the web client posts it as `passwordHash`.
    #[serde(alias = "passwordHash")]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub first_name: String,
    pub last_name: String,
    pub notification_preferences: Option<bool>,
    pub email_verified: Option<bool>,
    #[serde(alias = "passwordHash")]
    pub password: Option<String>,
}

impl UserUpdate {
    /// Raw password to hash, if any. Empty values and values that are
    /// already bcrypt hashes leave the stored password untouched.
    pub fn take_new_password(&mut self) -> Option<String> {
        self.password
            .take()
            .filter(|password| !password.is_empty() && !is_hashed(password))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    AlreadyVerified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendOutcome {
    Sent,
    AlreadyVerified,
}

#[derive(Debug)]
pub struct AccountService {
    users: UserStore,
    mailer: Arc<dyn Mailer>,
    settings: AuthSettings,
}

impl AccountService {
    pub fn new(mailer: Arc<dyn Mailer>, settings: AuthSettings) -> Self {
        Self {
            users: UserStore::new(),
            mailer,
            settings,
        }
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn get(&self, user_id: UserId) -> Result<&User, AccountError> {
        self.users.get(user_id).ok_or(AccountError::UserNotFound)
    }

    pub fn ensure_email_available(&self, email: &str) -> Result<(), AccountError> {
        if self.users.find_by_email(email).is_some() {
            warn!(email, "Email already registered");
            return Err(AccountError::EmailTaken);
        }
        Ok(())
    }

    /// Store an account whose password is already hashed and mail its verification code.
    pub fn register(&mut self, new_user: NewUser, now: OffsetDateTime) -> Result<User, AccountError> {
        self.ensure_email_available(&new_user.email)?;
        let expiry = expiry_after(now, self.settings.verification_ttl)?;

        let code = generate_code();
        let user = self.users.insert(new_user, now);
        user.verification_code = Some(code.clone());
        user.verification_code_expiry = Some(expiry);
        let user = user.clone();
        info!(user_id = user.user_id, "User created");

        // Registration stands even when the mail cannot be sent; the user can ask for a resend.
        let message = verification_email(&user.email, &user.first_name, &code);
        if let Err(e) = self.mailer.send(&message) {
            warn!(email = %user.email, error = %e, "Failed to send verification email");
        }

        Ok(user)
    }

    /// The account a login for `email` would check the password against.
    pub fn login_candidate(&self, email: &str) -> Result<User, AccountError> {
        let Some(user) = self.users.find_by_email(email) else {
            warn!(email, "Login for unknown email");
            return Err(AccountError::InvalidCredentials);
        };
        if !user.email_verified {
            warn!(email, "Login before email verification");
            return Err(AccountError::EmailNotVerified {
                email: user.email.clone(),
            });
        }
        Ok(user.clone())
    }

    pub fn verify_email(
        &mut self,
        email: &str,
        code: &str,
        now: OffsetDateTime,
    ) -> Result<VerificationOutcome, AccountError> {
        let user = self
            .users
            .find_by_email_mut(email)
            .ok_or(AccountError::UserNotFound)?;
        if user.email_verified {
            return Ok(VerificationOutcome::AlreadyVerified);
        }
        if user.verification_code_expiry.is_none_or(|expiry| expiry < now) {
            warn!(email, "Verification code expired");
            return Err(AccountError::VerificationCodeExpired);
        }
        if user.verification_code.as_deref() != Some(code) {
            warn!(email, "Invalid verification code");
            return Err(AccountError::InvalidVerificationCode);
        }

        user.email_verified = true;
        user.verification_code = None;
        user.verification_code_expiry = None;
        info!(email, "Email verified");
        Ok(VerificationOutcome::Verified)
    }

    pub fn resend_verification(
        &mut self,
        email: &str,
        now: OffsetDateTime,
    ) -> Result<ResendOutcome, AccountError> {
        let ttl = self.settings.verification_ttl;
        let user = self
            .users
            .find_by_email_mut(email)
            .ok_or(AccountError::UserNotFound)?;
        if user.email_verified {
            return Ok(ResendOutcome::AlreadyVerified);
        }

        let expiry = expiry_after(now, ttl)?;
        let code = generate_code();
        user.verification_code = Some(code.clone());
        user.verification_code_expiry = Some(expiry);

        let message = verification_email(&user.email, &user.first_name, &code);
        self.mailer
            .send(&message)
            .map_err(AccountError::VerificationEmailFailed)?;
        info!(email, "Verification code resent");
        Ok(ResendOutcome::Sent)
    }

    /// Issue a reset token and mail it; returns the address it was sent to.
    pub fn forgot_password(
        &mut self,
        email: &str,
        now: OffsetDateTime,
    ) -> Result<String, AccountError> {
        let ttl = self.settings.reset_ttl;
        let user = self
            .users
            .find_by_email_mut(email)
            .ok_or(AccountError::AccountNotFound)?;

        let expiry = expiry_after(now, ttl)?;
        let token = generate_code();
        user.reset_token = Some(token.clone());
        user.reset_token_expiry = Some(expiry);

        let message = password_reset_email(&user.email, &user.first_name, &token);
        self.mailer
            .send(&message)
            .map_err(AccountError::ResetEmailFailed)?;
        info!(email, "Password reset code sent");
        Ok(user.email.clone())
    }

    pub fn check_reset_token(
        &self,
        email: &str,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<(), AccountError> {
        let user = self
            .users
            .find_by_email(email)
            .ok_or(AccountError::UserNotFound)?;
        check_reset_token(user, token, now)
    }

    /// Replace the password with `password_hash` if `token` is still valid.
    pub fn reset_password(
        &mut self,
        email: &str,
        token: &str,
        password_hash: String,
        now: OffsetDateTime,
    ) -> Result<(), AccountError> {
        let user = self
            .users
            .find_by_email_mut(email)
            .ok_or(AccountError::UserNotFound)?;
        check_reset_token(user, token, now)?;

        user.password_hash = password_hash;
        user.reset_token = None;
        user.reset_token_expiry = None;
        info!(email, "Password reset");
        Ok(())
    }

    /// Apply a profile update; `password_hash` replaces the stored hash when given.
    pub fn update(
        &mut self,
        user_id: UserId,
        update: UserUpdate,
        password_hash: Option<String>,
    ) -> Result<User, AccountError> {
        let user = self
            .users
            .get_mut(user_id)
            .ok_or(AccountError::UserNotFound)?;

        user.first_name = update.first_name;
        user.last_name = update.last_name;
        if let Some(notify) = update.notification_preferences {
            user.notification_preferences = notify;
        }
        if let Some(verified) = update.email_verified {
            user.email_verified = verified;
        }
        if let Some(password_hash) = password_hash {
            user.password_hash = password_hash;
        }
        Ok(user.clone())
    }

    pub fn delete(&mut self, user_id: UserId) -> bool {
        self.users.remove(user_id).is_some()
    }
}

fn check_reset_token(user: &User, token: &str, now: OffsetDateTime) -> Result<(), AccountError> {
    if user.reset_token.as_deref() != Some(token) {
        warn!(email = %user.email, "Invalid reset code");
        return Err(AccountError::InvalidResetCode);
    }
    if user.reset_token_expiry.is_none_or(|expiry| expiry < now) {
        warn!(email = %user.email, "Reset code expired");
        return Err(AccountError::ResetCodeExpired);
    }
    Ok(())
}

fn expiry_after(now: OffsetDateTime, ttl: Duration) -> Result<OffsetDateTime, AccountError> {
    now.checked_add(ttl).ok_or_else(|| {
        warn!(ttl = %ttl, "Code expiry out of range");
        AccountError::ExpiryOutOfRange
    })
}

/// Six decimal digits, zero padded.
fn generate_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000))
}
