use crate::mailer::{EmailMessage, MailError, Mailer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Keeps every message it is asked to send; can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.set_failing(true);
        mailer
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_sent(&self) -> Option<EmailMessage> {
        self.sent().pop()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(MailError::Delivery("mock mailer configured to fail".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}
