//! Allocation and merge error taxonomy.

use tally_core::TimestampParseError;

/// Failure of one ticket allocation.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    /// The submission was rejected before touching the ledger.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Human readable message.
        message: String,
    },

    /// The ledger store could not be read or written (retryable).
    #[error("ledger store unavailable: {message}")]
    StoreUnavailable {
        /// Human readable message.
        message: String,
        /// The underlying store error, if any.
        #[source]
        source: Option<tally_core::Error>,
    },

    /// The store rejected the new row as a duplicate.
    ///
    /// With the exclusion gate in place this never happens; seeing it means
    /// something else is writing tickets to the primary range.
    #[error("allocation conflict: {message}")]
    AllocationConflict {
        /// Human readable message.
        message: String,
    },
}

impl AllocationError {
    /// Stable label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::AllocationConflict { .. } => "conflict",
        }
    }
}

impl From<tally_core::Error> for AllocationError {
    fn from(value: tally_core::Error) -> Self {
        match value {
            tally_core::Error::Conflict { message } => Self::AllocationConflict { message },
            other => Self::StoreUnavailable {
                message: other.to_string(),
                source: Some(other),
            },
        }
    }
}

/// Failure of one merge cycle. The destination is untouched unless the
/// failure happened between the clear and the append.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The ledger store could not be read or written (retryable).
    #[error("ledger store unavailable: {message}")]
    StoreUnavailable {
        /// Human readable message.
        message: String,
        /// The underlying store error, if any.
        #[source]
        source: Option<tally_core::Error>,
    },

    /// A source row carries a timestamp that cannot be parsed.
    #[error("{range} row {row}: {source}")]
    TimestampParse {
        /// A1 range the row was read from.
        range: String,
        /// One-based sheet row number.
        row: u32,
        /// The parse failure.
        #[source]
        source: TimestampParseError,
    },
}

impl MergeError {
    /// Stable label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::TimestampParse { .. } => "timestamp_parse",
        }
    }
}

impl From<tally_core::Error> for MergeError {
    fn from(value: tally_core::Error) -> Self {
        Self::StoreUnavailable {
            message: value.to_string(),
            source: Some(value),
        }
    }
}
