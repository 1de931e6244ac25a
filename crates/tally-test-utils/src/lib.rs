//! Shared test utilities for Tally tests.
//!
//! This crate provides:
//! - [`TracingLedger`]: in-memory ledger that records every call and can inject failures
//! - [`StepClock`]: a deterministic clock for ordering assertions
//! - Row and range fixtures
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_test_utils::{TracingLedger, OpKind, range};
//!
//! let ledger = TracingLedger::new();
//! ledger.inject_failure(OpKind::Append, "Giselle");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod clock;
pub mod fixtures;
pub mod ledger;

pub use clock::*;
pub use fixtures::*;
pub use ledger::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tally=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
