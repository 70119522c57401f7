use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("state lock poisoned")]
    StateLock,
    #[error("station not found: {0}")]
    StationNotFound(u64),
}
