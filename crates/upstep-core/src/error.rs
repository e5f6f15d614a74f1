use thiserror::Error;

/// Core error types for Upstep domain values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid account status: {0}")]
    InvalidStatus(String),

    #[error("Invalid level: {0}")]
    InvalidLevel(String),

    #[error("Invalid listing key: {0}")]
    InvalidListingKey(String),
}

impl CoreError {
    /// Create a new InvalidStatus error
    pub fn invalid_status(status: impl Into<String>) -> Self {
        Self::InvalidStatus(status.into())
    }

    /// Create a new InvalidLevel error
    pub fn invalid_level(level: impl Into<String>) -> Self {
        Self::InvalidLevel(level.into())
    }

    /// Create a new InvalidListingKey error
    pub fn invalid_listing_key(key: impl Into<String>) -> Self {
        Self::InvalidListingKey(key.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
