use thiserror::Error;
use tracing::{debug, info};

pub mod mock;

pub const APP_DISPLAY_NAME: &str = "TrainTrack PH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

pub trait Mailer: Send + Sync + std::fmt::Debug {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Writes outgoing mail to the log instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(to = %message.to, subject = %message.subject, "Email queued");
        debug!(body = %message.body, "Email body");
        Ok(())
    }
}

pub fn verification_email(to: &str, first_name: &str, code: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Verify Your {APP_DISPLAY_NAME} Account"),
        body: format!(
            "Hi {first_name},\n\n\
             Welcome to {APP_DISPLAY_NAME}. Enter this code to verify your email address:\n\n\
             {code}\n\n\
             If you did not create an account, ignore this email.\n"
        ),
    }
}

pub fn password_reset_email(to: &str, first_name: &str, token: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Reset Your {APP_DISPLAY_NAME} Password"),
        body: format!(
            "Hi {first_name},\n\n\
             Use this code to reset your password:\n\n\
             {token}\n\n\
             The code is valid for a short time. If you did not request a reset, ignore this email.\n"
        ),
    }
}
