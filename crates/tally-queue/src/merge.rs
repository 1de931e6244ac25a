//! Cross-sheet merge.
//!
//! A merge reads every row of two source ranges, orders the union by the
//! submission timestamp in the third cell, then clears the destination and
//! appends the ordered rows. Rows are copied verbatim; only the sort key is
//! parsed.
//!
//! ## Guarantees
//!
//! - All rows are parsed before the destination is touched, so a malformed
//!   timestamp leaves the previous combined view in place.
//! - The sort is stable: rows with equal timestamps keep source A before
//!   source B and their sheet order within each source.
//! - Re-running a merge over unchanged sources produces the same
//!   destination.
//!
//! Clear and append are two separate store calls. A reader between them sees
//! an empty destination, and a failed append leaves it empty until the next
//! successful merge.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tally_core::{LedgerRange, LedgerStore, LedgerTime, Row, TimestampParseError};

use crate::error::MergeError;

const TIMESTAMP_CELL: usize = 2;

/// Sources and destination of one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    /// First source (the primary ledger).
    pub source_a: LedgerRange,
    /// Second source (the secondary intake sheet).
    pub source_b: LedgerRange,
    /// Range cleared and rewritten by the merge.
    pub destination: LedgerRange,
}

/// Executes [`MergePlan`]s against a ledger store.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    store: Arc<dyn LedgerStore>,
    time: LedgerTime,
}

impl MergeEngine {
    /// Creates an engine using the default ledger timezone.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            time: LedgerTime::default(),
        }
    }

    /// Sets the timezone timestamps are interpreted in.
    #[must_use]
    pub fn with_time(mut self, time: LedgerTime) -> Self {
        self.time = time;
        self
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Runs one merge and returns the number of rows written.
    ///
    /// When both sources are empty the destination is cleared and nothing is
    /// appended.
    ///
    /// # Errors
    ///
    /// - [`MergeError::StoreUnavailable`] if any read, the clear or the
    ///   append fails.
    /// - [`MergeError::TimestampParse`] if a non-blank source row has a
    ///   missing or malformed timestamp. The destination is untouched.
    pub async fn merge(&self, plan: &MergePlan) -> Result<usize, MergeError> {
        let rows_a = self.store.get(&plan.source_a).await?;
        let rows_b = self.store.get(&plan.source_b).await?;
        tracing::debug!(
            source_a = rows_a.len(),
            source_b = rows_b.len(),
            "read merge sources"
        );

        let combined = combine(
            &self.time,
            [(&plan.source_a, rows_a), (&plan.source_b, rows_b)],
        )?;

        self.store.clear(&plan.destination).await?;
        if !combined.is_empty() {
            self.store.append(&plan.destination, &combined).await?;
        }
        Ok(combined.len())
    }
}

/// Concatenates `sources` in order and stably sorts the rows by timestamp.
///
/// Rows whose cells are all empty are dropped; they are gaps in the sheet,
/// not orders.
///
/// # Errors
///
/// Returns [`MergeError::TimestampParse`] for the first row whose timestamp
/// cell is missing or cannot be parsed.
pub fn combine<'a, I>(time: &LedgerTime, sources: I) -> Result<Vec<Row>, MergeError>
where
    I: IntoIterator<Item = (&'a LedgerRange, Vec<Row>)>,
{
    let mut keyed: Vec<(DateTime<Utc>, Row)> = Vec::new();
    for (range, rows) in sources {
        for (offset, row) in rows.into_iter().enumerate() {
            if row.iter().all(String::is_empty) {
                continue;
            }
            let instant = row_timestamp(time, &row).map_err(|source| {
                MergeError::TimestampParse {
                    range: range.a1(),
                    row: sheet_row(range, offset),
                    source,
                }
            })?;
            keyed.push((instant, row));
        }
    }

    keyed.sort_by_key(|(instant, _)| *instant);
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

fn row_timestamp(time: &LedgerTime, row: &Row) -> Result<DateTime<Utc>, TimestampParseError> {
    match row.get(TIMESTAMP_CELL) {
        Some(cell) => time.parse(cell),
        None => Err(TimestampParseError {
            value: String::new(),
            reason: "row has no timestamp cell",
        }),
    }
}

fn sheet_row(range: &LedgerRange, offset: usize) -> u32 {
    u32::try_from(offset)
        .ok()
        .and_then(|offset| range.start_row().checked_add(offset))
        .unwrap_or(u32::MAX)
}
