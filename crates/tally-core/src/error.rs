//! Error types and result aliases for Tally.
//!
//! Errors raised by ledger backends and configuration loading share this type.
//! Domain crates wrap it in their own taxonomies.

/// The result type used throughout Tally.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Tally core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A ledger store call failed (network, auth, quota, upstream 5xx).
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The store rejected a write as conflicting with existing content.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Credentials or other startup configuration were unusable.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true for failures of the store itself (as opposed to bad input).
    #[must_use]
    pub fn is_store_fault(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Serialization { .. } | Self::Internal { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
        let err = Error::storage_with_source("sheets get failed", io);
        assert!(err.is_store_fault());
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "storage error: sheets get failed");
    }

    #[test]
    fn conflict_is_not_a_store_fault() {
        let err = Error::Conflict {
            message: "duplicate row".into(),
        };
        assert!(!err.is_store_fault());
    }
}
