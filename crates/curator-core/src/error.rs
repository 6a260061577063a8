use thiserror::Error;

/// Core error type for Curator scheduling operations.
#[derive(Error, Debug)]
pub enum CuratorError {
    /// Submission attempted on a dispatcher that was never started or has stopped.
    #[error("Dispatcher '{0}' is not active")]
    NotActive(String),

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CuratorError {
    /// Check if this is the not-active precondition failure.
    pub fn is_not_active(&self) -> bool {
        matches!(self, Self::NotActive(_))
    }

    /// Check if this is a cron parse failure.
    pub fn is_invalid_cron(&self) -> bool {
        matches!(self, Self::InvalidCron { .. })
    }
}

/// Result type alias using CuratorError.
pub type Result<T> = std::result::Result<T, CuratorError>;
