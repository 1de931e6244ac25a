//! Test ledger with operation tracing.
//!
//! Wraps [`MemoryLedger`] and records every call so tests can assert on call
//! order, and lets tests inject store faults per operation and sheet.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tally_core::error::{Error, Result};
use tally_core::{LedgerRange, LedgerStore, MemoryLedger, Row};

/// Kind of ledger call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// `get`
    Get,
    /// `append`
    Append,
    /// `clear`
    Clear,
}

/// Record of a ledger call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    /// Get operation.
    Get {
        /// Range that was read.
        range: String,
    },
    /// Append operation.
    Append {
        /// Range appended to.
        range: String,
        /// Number of rows appended.
        rows: usize,
    },
    /// Clear operation.
    Clear {
        /// Range that was cleared.
        range: String,
    },
}

impl LedgerOp {
    /// Returns the call kind.
    pub fn kind(&self) -> OpKind {
        match self {
            Self::Get { .. } => OpKind::Get,
            Self::Append { .. } => OpKind::Append,
            Self::Clear { .. } => OpKind::Clear,
        }
    }

    /// Returns the A1 range the call addressed.
    pub fn range(&self) -> &str {
        match self {
            Self::Get { range } | Self::Append { range, .. } | Self::Clear { range } => range,
        }
    }
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    kind: OpKind,
    sheet: String,
    remaining: Option<u32>,
    conflict: bool,
}

/// In-memory ledger with operation tracing.
#[derive(Debug, Clone, Default)]
pub struct TracingLedger {
    inner: MemoryLedger,
    operations: Arc<Mutex<Vec<LedgerOp>>>,
    failures: Arc<Mutex<Vec<InjectedFailure>>>,
    latency: Option<Duration>,
}

impl TracingLedger {
    /// Creates a new empty tracing ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger that sleeps for `latency` inside every call.
    ///
    /// The sleep is a suspension point, so concurrent callers interleave at
    /// every store call the way they would against a remote store.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Returns the wrapped memory ledger (for seeding and snapshots).
    pub fn memory(&self) -> &MemoryLedger {
        &self.inner
    }

    /// Seeds rows without recording an operation.
    pub async fn seed(&self, range: &LedgerRange, rows: &[Row]) {
        self.inner.append(range, rows).await.expect("seed");
    }

    /// Returns all recorded operations.
    pub fn operations(&self) -> Vec<LedgerOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Returns recorded operations against `sheet`.
    pub fn operations_on(&self, sheet: &str) -> Vec<LedgerOp> {
        self.operations()
            .into_iter()
            .filter(|op| {
                op.range()
                    .parse::<LedgerRange>()
                    .is_ok_and(|range| range.sheet() == sheet)
            })
            .collect()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Makes every `kind` call against `sheet` fail with a storage error.
    pub fn inject_failure(&self, kind: OpKind, sheet: impl Into<String>) {
        self.push_failure(kind, sheet.into(), None, false);
    }

    /// Makes the next `kind` call against `sheet` fail with a storage error.
    pub fn inject_failure_once(&self, kind: OpKind, sheet: impl Into<String>) {
        self.push_failure(kind, sheet.into(), Some(1), false);
    }

    /// Makes every `kind` call against `sheet` fail with a conflict error.
    pub fn inject_conflict(&self, kind: OpKind, sheet: impl Into<String>) {
        self.push_failure(kind, sheet.into(), None, true);
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.failures.lock().expect("lock").clear();
    }

    fn push_failure(&self, kind: OpKind, sheet: String, remaining: Option<u32>, conflict: bool) {
        self.failures.lock().expect("lock").push(InjectedFailure {
            kind,
            sheet,
            remaining,
            conflict,
        });
    }

    fn record(&self, op: LedgerOp) {
        self.operations.lock().expect("lock").push(op);
    }

    fn check_failure(&self, kind: OpKind, range: &LedgerRange) -> Result<()> {
        let mut failures = self.failures.lock().expect("lock");
        let Some(index) = failures
            .iter()
            .position(|f| f.kind == kind && f.sheet == range.sheet())
        else {
            return Ok(());
        };

        let failure = &mut failures[index];
        let conflict = failure.conflict;
        if let Some(remaining) = failure.remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                failures.remove(index);
            }
        }

        if conflict {
            Err(Error::Conflict {
                message: format!("Injected conflict for range: {range}"),
            })
        } else {
            Err(Error::storage(format!("Injected failure for range: {range}")))
        }
    }

    async fn maybe_delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait::async_trait]
impl LedgerStore for TracingLedger {
    async fn get(&self, range: &LedgerRange) -> Result<Vec<Row>> {
        self.record(LedgerOp::Get {
            range: range.a1(),
        });
        self.maybe_delay().await;
        self.check_failure(OpKind::Get, range)?;
        self.inner.get(range).await
    }

    async fn append(&self, range: &LedgerRange, rows: &[Row]) -> Result<()> {
        self.record(LedgerOp::Append {
            range: range.a1(),
            rows: rows.len(),
        });
        self.maybe_delay().await;
        self.check_failure(OpKind::Append, range)?;
        self.inner.append(range, rows).await
    }

    async fn clear(&self, range: &LedgerRange) -> Result<()> {
        self.record(LedgerOp::Clear {
            range: range.a1(),
        });
        self.maybe_delay().await;
        self.check_failure(OpKind::Clear, range)?;
        self.inner.clear(range).await
    }
}
