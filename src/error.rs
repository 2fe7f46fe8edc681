use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Webhook verification failed: {0}")]
    WebhookVerification(String),

    #[error("Workflow dispatch failed: {0}")]
    Dispatch(String),

    #[error("Repository {0} has already been requested or is in progress")]
    AlreadyInProgress(String),

    #[error("Status store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<octocrab::Error> for AppError {
    fn from(e: octocrab::Error) -> Self {
        AppError::Dispatch(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
