//! Ticket identifiers and order records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ledger::Row;
use crate::timestamp::LedgerTime;

/// Prefix used by the current ledger generation.
pub const DEFAULT_TICKET_PREFIX: char = 'O';

/// A prefixed sequential ticket identifier such as `O17`.
///
/// The prefix distinguishes ledger generations; the number is unique within a
/// ledger range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketId {
    prefix: char,
    number: u64,
}

impl TicketId {
    /// Creates a ticket identifier.
    #[must_use]
    pub const fn new(prefix: char, number: u64) -> Self {
        Self { prefix, number }
    }

    /// Parses a ledger cell carrying `prefix` followed by a decimal number.
    ///
    /// Returns `None` for cells with another prefix or a non-numeric suffix.
    #[must_use]
    pub fn parse(raw: &str, prefix: char) -> Option<Self> {
        let digits = raw.trim().strip_prefix(prefix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(|number| Self::new(prefix, number))
    }

    /// Returns the generation prefix.
    #[must_use]
    pub const fn prefix(&self) -> char {
        self.prefix
    }

    /// Returns the sequence number.
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.number)
    }
}

impl Serialize for TicketId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One submitted order as written to the primary ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// Allocated ticket.
    pub ticket_id: TicketId,
    /// Order category (the coffee type).
    pub category: String,
    /// Submission instant.
    pub submitted_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Renders the record as a ledger row: `[ticket, category, timestamp]`.
    #[must_use]
    pub fn to_row(&self, time: &LedgerTime) -> Row {
        vec![
            self.ticket_id.to_string(),
            self.category.clone(),
            time.format(self.submitted_at),
        ]
    }
}
