//! Where the queue lives inside the spreadsheet.

use tally_core::ticket::DEFAULT_TICKET_PREFIX;
use tally_core::{LedgerRange, LedgerTime, Result};

use crate::merge::MergePlan;

/// Default primary ledger range (submissions from this service).
pub const DEFAULT_PRIMARY_RANGE: &str = "Giselle!A2:C";

/// Default secondary ledger range (orders entered elsewhere).
pub const DEFAULT_SECONDARY_RANGE: &str = "peepee!A2:C";

/// Default combined range rewritten by every merge.
pub const DEFAULT_COMBINED_RANGE: &str = "'Combined sheet'!A2:C";

/// Ranges, ticket prefix and timezone of one order queue.
///
/// Row 1 of every sheet is a header and is never read or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLayout {
    /// Range receiving allocated orders; its first column holds ticket ids.
    pub primary: LedgerRange,
    /// Range of orders entered outside this service.
    pub secondary: LedgerRange,
    /// Destination of the merge.
    pub combined: LedgerRange,
    /// Ticket prefix for the current ledger generation.
    pub ticket_prefix: char,
    /// Timestamp formatting for written rows.
    pub time: LedgerTime,
}

impl LedgerLayout {
    /// Builds a layout from A1 strings.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if any range fails to parse.
    pub fn from_a1(primary: &str, secondary: &str, combined: &str) -> Result<Self> {
        Ok(Self {
            primary: primary.parse()?,
            secondary: secondary.parse()?,
            combined: combined.parse()?,
            ticket_prefix: DEFAULT_TICKET_PREFIX,
            time: LedgerTime::default(),
        })
    }

    /// Builds the layout of the production spreadsheet.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in ranges; the `Result` mirrors [`Self::from_a1`].
    pub fn standard() -> Result<Self> {
        Self::from_a1(
            DEFAULT_PRIMARY_RANGE,
            DEFAULT_SECONDARY_RANGE,
            DEFAULT_COMBINED_RANGE,
        )
    }

    /// Returns the merge plan: primary and secondary into combined.
    #[must_use]
    pub fn merge_plan(&self) -> MergePlan {
        MergePlan {
            source_a: self.primary.clone(),
            source_b: self.secondary.clone(),
            destination: self.combined.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_layout_uses_default_ranges() {
        let layout = LedgerLayout::standard().unwrap();
        assert_eq!(layout.primary.a1(), DEFAULT_PRIMARY_RANGE);
        assert_eq!(layout.secondary.a1(), DEFAULT_SECONDARY_RANGE);
        assert_eq!(layout.combined.a1(), DEFAULT_COMBINED_RANGE);
        assert_eq!(layout.ticket_prefix, 'O');
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(LedgerLayout::from_a1("Giselle", DEFAULT_SECONDARY_RANGE, DEFAULT_COMBINED_RANGE).is_err());
    }

    #[test]
    fn merge_plan_reads_primary_then_secondary() {
        let plan = LedgerLayout::standard().unwrap().merge_plan();
        assert_eq!(plan.source_a.sheet(), "Giselle");
        assert_eq!(plan.source_b.sheet(), "peepee");
        assert_eq!(plan.destination.sheet(), "Combined sheet");
    }
}
