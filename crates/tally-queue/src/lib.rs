//! # tally-queue
//!
//! Ticket allocation and ledger merging for the Tally order queue.
//!
//! This crate is responsible for:
//! - Handing every submitted order a unique, strictly increasing ticket
//!   (`O1`, `O2`, ...) even when submissions arrive concurrently
//! - Combining the primary ledger and the secondary intake sheet into one
//!   sheet ordered by submission time
//! - Running that merge after each submission and on a fixed timer
//!
//! ## Components
//!
//! - [`ExclusionGate`]: serializes allocations (read, compute, append)
//! - [`TicketAllocator`]: max-plus-one ticket allocation under the gate
//! - [`MergeEngine`]: read both sources, sort by timestamp, clear and rewrite
//! - [`MergeTrigger`]: post-submission and periodic merge invocation
//! - [`OrderDesk`]: allocation followed by the post-submission merge
//!
//! ## Example
//!
//! ```rust,ignore
//! let layout = LedgerLayout::default();
//! let desk = OrderDesk::from_layout(store, &layout);
//! let submission = desk.submit("latte").await?;
//! println!("ticket {}", submission.record.ticket_id);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod allocator;
pub mod desk;
pub mod error;
pub mod gate;
pub mod layout;
pub mod merge;
pub mod metrics;
pub mod trigger;

pub use allocator::TicketAllocator;
pub use desk::{DEFAULT_SUBMIT_MERGE_TIMEOUT, MergeOutcome, OrderDesk, Submission};
pub use error::{AllocationError, MergeError};
pub use gate::{ExclusionGate, GateGuard};
pub use layout::LedgerLayout;
pub use merge::{MergeEngine, MergePlan};
pub use trigger::{MergeStats, MergeTrigger, TickOutcome, TriggerSource};
