//! Row and range fixtures.

use tally_core::{LedgerRange, Row};

/// Parses an A1 range, panicking on malformed input.
pub fn range(a1: &str) -> LedgerRange {
    a1.parse().expect("valid A1 range")
}

/// Builds a row from string cells.
pub fn row(cells: &[&str]) -> Row {
    cells.iter().map(|cell| (*cell).to_string()).collect()
}

/// Builds an order row `[ticket, category, timestamp]`.
pub fn order_row(ticket: &str, category: &str, timestamp: &str) -> Row {
    row(&[ticket, category, timestamp])
}

/// Primary ledger range used across tests.
pub const PRIMARY: &str = "Giselle!A2:C";

/// Secondary intake range used across tests.
pub const SECONDARY: &str = "peepee!A2:C";

/// Combined destination range used across tests.
pub const COMBINED: &str = "Combined sheet!A2:C";
