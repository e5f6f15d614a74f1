//! Storage error types for the account store abstraction layer.

/// Errors that can occur during account store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The requested account was not found.
    #[error("Account not found: {id}")]
    NotFound {
        /// The ID that matched no account.
        id: String,
    },

    /// An account with the same unique field already exists.
    #[error("Account already exists: {field} '{value}' is already in use")]
    AlreadyExists {
        /// The unique field that collided.
        field: String,
        /// The colliding value.
        value: String,
    },

    /// The account data was rejected by the store.
    #[error("Invalid account: {message}")]
    Invalid {
        /// Description of why the data is invalid.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AlreadyExists {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StorageError::not_found("abc");
        assert_eq!(err.to_string(), "Account not found: abc");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_already_exists_display() {
        let err = StorageError::already_exists("email", "a@b.co");
        assert_eq!(
            err.to_string(),
            "Account already exists: email 'a@b.co' is already in use"
        );
        assert!(!err.is_not_found());
    }
}
