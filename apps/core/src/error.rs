use std::io;
use thiserror::Error;

/// Crate-wide error type, consolidating every failure the pipeline can observe into a single enum.
///
/// The orchestrator never lets one of these escape a turn: each variant is mapped onto a
/// designed outcome (fallback reply, skipped strategy, failed tool result).
#[derive(Debug, Error)]
pub enum AppError {
    /// The generation provider rejected the request or could not be reached.
    #[error("Provider error: {0}")]
    Provider(String),

    /// A structured response did not match the schema it was requested with.
    #[error("Schema validation failed: {0}")]
    Schema(String),

    /// Represents data validation errors (e.g., malformed tool arguments, bad tenant data).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing endpoint, unparseable environment value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A collaborator (scheduling, payment, notification, handoff) failed.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Reading an example library or context file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Represents errors specific to the actor system, such as mailbox failures.
    #[error("Actor error: {0}")]
    Actor(#[from] crate::actors::messages::ActorError),

    /// A bug, or a subscriber that was already installed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::Provider(s) => AppError::Provider(s.clone()),
            AppError::Schema(s) => AppError::Schema(s.clone()),
            AppError::Validation(s) => AppError::Validation(s.clone()),
            AppError::Config(s) => AppError::Config(s.clone()),
            AppError::Tool(s) => AppError::Tool(s.clone()),
            AppError::Io(e) => AppError::Io(io::Error::new(e.kind(), e.to_string())),
            AppError::Timeout(s) => AppError::Timeout(s.clone()),
            AppError::Actor(e) => AppError::Actor(e.clone()),
            AppError::Internal(s) => AppError::Internal(s.clone()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(format!("Operation timed out: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON error: {}", err))
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Validation(format!("URL parse error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Validation errors: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(format!("HTTP timeout: {}", err))
        } else {
            AppError::Provider(format!("HTTP error: {}", err))
        }
    }
}
