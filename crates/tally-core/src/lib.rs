//! # tally-core
//!
//! Core primitives for the Tally order queue.
//!
//! Tally keeps a small shop's order queue in a shared spreadsheet. This crate
//! holds the pieces every other crate builds on:
//!
//! - **Ledger Store**: the `get` / `append` / `clear` capability over named
//!   spreadsheet ranges, with an in-memory backend and a Google Sheets backend
//! - **Tickets**: prefixed sequential identifiers and the order records that carry them
//! - **Timestamps**: the locale-formatted submission time written to the ledger
//! - **Error Types**: shared error definitions and result types
//! - **Observability**: logging initialisation and span helpers
//!
//! ## Example
//!
//! ```rust
//! use tally_core::prelude::*;
//!
//! let range: LedgerRange = "Giselle!A2:C".parse().unwrap();
//! assert_eq!(range.sheet(), "Giselle");
//!
//! let ticket = TicketId::new('O', 7);
//! assert_eq!(ticket.to_string(), "O7");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod ledger;
pub mod observability;
pub mod sheets;
pub mod ticket;
pub mod timestamp;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::ledger::{LedgerRange, LedgerStore, MemoryLedger, Row};
    pub use crate::ticket::{OrderRecord, TicketId};
    pub use crate::timestamp::{Clock, LedgerTime, SystemClock, TimestampParseError};
}

pub use error::{Error, Result};
pub use ledger::{LedgerRange, LedgerStore, MemoryLedger, Row};
pub use observability::{LogFormat, init_logging};
pub use sheets::{ServiceAccountKey, SheetsAuth, SheetsLedger};
pub use ticket::{OrderRecord, TicketId};
pub use timestamp::{Clock, LedgerTime, SystemClock, TimestampParseError};
