//! Application error types

use homeward_api::ApiError;
use thiserror::Error;

/// Errors surfaced by the automation runtime
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration or builder misuse; fail fast at registration
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The server rejected the access token
    #[error("invalid authentication token")]
    InvalidToken,

    /// WebSocket dial or REST transport failure
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// A time, duration or cron string failed to parse
    #[error(transparent)]
    Parse(#[from] homeward_core::ParseError),

    /// The server knows no entity by this id
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The application context was cancelled
    #[error("application is shut down")]
    Shutdown,
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidToken => AppError::InvalidToken,
            ApiError::UnknownEntity(id) => AppError::UnknownEntity(id),
            other => AppError::ConnectFailed(other.to_string()),
        }
    }
}

impl From<homeward_scheduling::BuildError> for AppError {
    fn from(err: homeward_scheduling::BuildError) -> Self {
        AppError::InvalidArgs(err.to_string())
    }
}
