//! Sequential ticket allocation.
//!
//! A ticket is the highest existing number in the primary ledger's id column
//! plus one. Reading that maximum and appending the new row happen inside the
//! [`ExclusionGate`], so concurrent submissions in this process always get
//! distinct, strictly increasing tickets. Gaps left by deleted rows are never
//! refilled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tally_core::observability::allocation_span;
use tally_core::ticket::DEFAULT_TICKET_PREFIX;
use tally_core::{Clock, LedgerRange, LedgerStore, LedgerTime, OrderRecord, Row, SystemClock, TicketId};
use tracing::Instrument;

use crate::error::AllocationError;
use crate::gate::ExclusionGate;
use crate::layout::LedgerLayout;
use crate::metrics;

/// Allocates tickets and records orders in the primary ledger.
#[derive(Debug, Clone)]
pub struct TicketAllocator {
    store: Arc<dyn LedgerStore>,
    gate: Arc<ExclusionGate>,
    ids: LedgerRange,
    primary: LedgerRange,
    prefix: char,
    time: LedgerTime,
    clock: Arc<dyn Clock>,
}

impl TicketAllocator {
    /// Creates an allocator writing to `primary`, with its own gate.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, primary: LedgerRange) -> Self {
        Self {
            store,
            gate: Arc::new(ExclusionGate::new()),
            ids: primary.first_column(),
            primary,
            prefix: DEFAULT_TICKET_PREFIX,
            time: LedgerTime::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Creates an allocator for `layout`.
    #[must_use]
    pub fn from_layout(store: Arc<dyn LedgerStore>, layout: &LedgerLayout) -> Self {
        Self::new(store, layout.primary.clone())
            .with_prefix(layout.ticket_prefix)
            .with_time(layout.time)
    }

    /// Shares an existing gate, so several allocators serialize together.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<ExclusionGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Sets the ticket prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: char) -> Self {
        self.prefix = prefix;
        self
    }

    /// Sets the timestamp format.
    #[must_use]
    pub fn with_time(mut self, time: LedgerTime) -> Self {
        self.time = time;
        self
    }

    /// Sets the clock used to stamp submissions.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the gate guarding allocation.
    #[must_use]
    pub fn gate(&self) -> &Arc<ExclusionGate> {
        &self.gate
    }

    /// Returns the range orders are appended to.
    #[must_use]
    pub fn primary(&self) -> &LedgerRange {
        &self.primary
    }

    /// Allocates the next ticket for `category` and appends the order row.
    ///
    /// # Errors
    ///
    /// - [`AllocationError::InvalidInput`] if `category` is blank; the ledger
    ///   is not touched.
    /// - [`AllocationError::StoreUnavailable`] if reading or appending fails.
    /// - [`AllocationError::AllocationConflict`] if the store rejects the row.
    ///
    /// The gate is released on every path.
    /// The category is stored exactly as given; only the blank check trims.
    pub async fn allocate(&self, category: &str) -> Result<OrderRecord, AllocationError> {
        if category.trim().is_empty() {
            let err = AllocationError::InvalidInput {
                message: "category must not be empty".to_string(),
            };
            metrics::record_allocation_error(err.kind());
            return Err(err);
        }

        let span = allocation_span(category, &self.primary.a1());
        async move {
            let waiting = Instant::now();
            let guard = self.gate.acquire().await;
            metrics::record_gate_wait(waiting.elapsed());

            let result = self.allocate_locked(category).await;
            guard.release();

            match &result {
                Ok(record) => {
                    metrics::record_allocation();
                    tracing::info!(ticket = %record.ticket_id, "allocated ticket");
                }
                Err(err) => {
                    metrics::record_allocation_error(err.kind());
                    tracing::error!(error = %err, "ticket allocation failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Like [`Self::allocate`], but gives up after `timeout`, including time
    /// spent waiting for the gate.
    ///
    /// A timed-out call leaves the gate open. If it expired during the
    /// append the row may still have reached the store.
    ///
    /// # Errors
    ///
    /// As [`Self::allocate`]; expiry is reported as
    /// [`AllocationError::StoreUnavailable`].
    pub async fn allocate_within(
        &self,
        category: &str,
        timeout: Duration,
    ) -> Result<OrderRecord, AllocationError> {
        match tokio::time::timeout(timeout, self.allocate(category)).await {
            Ok(result) => result,
            Err(_) => {
                let err = AllocationError::StoreUnavailable {
                    message: format!("allocation timed out after {}ms", timeout.as_millis()),
                    source: None,
                };
                metrics::record_allocation_error(err.kind());
                tracing::warn!(error = %err, category, "ticket allocation abandoned");
                Err(err)
            }
        }
    }

    async fn allocate_locked(&self, category: &str) -> Result<OrderRecord, AllocationError> {
        let existing = self.store.get(&self.ids).await?;
        let ticket_id = next_ticket(&existing, self.prefix).ok_or_else(|| {
            AllocationError::AllocationConflict {
                message: format!("ticket sequence for prefix {} is exhausted", self.prefix),
            }
        })?;
        tracing::debug!(%ticket_id, existing = existing.len(), "computed next ticket");

        let record = OrderRecord {
            ticket_id,
            category: category.to_string(),
            submitted_at: self.clock.now(),
        };
        self.store
            .append(&self.primary, &[record.to_row(&self.time)])
            .await?;
        Ok(record)
    }
}

/// Computes the ticket following the highest `prefix` ticket in `rows`.
///
/// Only the first cell of each row is considered. Cells without the prefix
/// or with a non-numeric suffix are ignored; with no valid ticket the
/// sequence starts at 1. Returns `None` if the sequence would overflow.
#[must_use]
pub fn next_ticket(rows: &[Row], prefix: char) -> Option<TicketId> {
    let highest = rows
        .iter()
        .filter_map(|row| row.first())
        .filter_map(|cell| TicketId::parse(cell, prefix))
        .map(|ticket| ticket.number())
        .max()
        .unwrap_or(0);
    highest
        .checked_add(1)
        .map(|number| TicketId::new(prefix, number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tally_test_utils::{OpKind, StepClock, TracingLedger, order_row, range, row};

    const PRIMARY: &str = "Giselle!A2:C";

    fn allocator(ledger: &TracingLedger) -> TicketAllocator {
        TicketAllocator::new(Arc::new(ledger.clone()), range(PRIMARY))
    }

    #[test]
    fn next_ticket_is_max_plus_one() {
        let rows = vec![row(&["O1"]), row(&["O2"]), row(&["O5"])];
        assert_eq!(next_ticket(&rows, 'O'), Some(TicketId::new('O', 6)));
    }

    #[test]
    fn next_ticket_ignores_foreign_and_malformed_cells() {
        let rows = vec![
            row(&["O3"]),
            row(&["P99"]),
            row(&["O7x"]),
            row(&[]),
            row(&["", "latte"]),
        ];
        assert_eq!(next_ticket(&rows, 'O'), Some(TicketId::new('O', 4)));
    }

    #[test]
    fn next_ticket_starts_at_one() {
        assert_eq!(next_ticket(&[], 'O'), Some(TicketId::new('O', 1)));
        assert_eq!(
            next_ticket(&[row(&["Form ID"])], 'O'),
            Some(TicketId::new('O', 1))
        );
    }

    #[test]
    fn next_ticket_reports_exhaustion() {
        let last = format!("O{}", u64::MAX);
        let rows = vec![row(&[last.as_str()])];
        assert_eq!(next_ticket(&rows, 'O'), None);
    }

    #[tokio::test]
    async fn allocate_appends_a_stamped_row() {
        let ledger = TracingLedger::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let allocator = allocator(&ledger).with_clock(Arc::new(StepClock::fixed(start)));

        let record = allocator.allocate("latte").await.unwrap();
        assert_eq!(record.ticket_id.to_string(), "O1");
        assert_eq!(record.category, "latte");

        let rows = ledger.memory().snapshot("Giselle").unwrap();
        assert_eq!(rows[1], order_row("O1", "latte", "01/01/2024, 9:00:00 am"));
        assert!(!allocator.gate().is_held());
    }

    #[tokio::test]
    async fn allocate_stores_the_category_verbatim() {
        let ledger = TracingLedger::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let allocator = allocator(&ledger).with_clock(Arc::new(StepClock::fixed(start)));

        let record = allocator.allocate("  iced latte ").await.unwrap();
        assert_eq!(record.category, "  iced latte ");

        let rows = ledger.get(&range(PRIMARY)).await.unwrap();
        assert_eq!(rows, vec![order_row("O1", "  iced latte ", "01/01/2024, 9:00:00 am")]);
    }

    #[tokio::test]
    async fn allocate_skips_over_gaps() {
        let ledger = TracingLedger::new();
        ledger
            .seed(
                &range(PRIMARY),
                &[order_row("O1", "a", "t"), order_row("O2", "b", "t"), order_row("O5", "c", "t")],
            )
            .await;

        let record = allocator(&ledger).allocate("mocha").await.unwrap();
        assert_eq!(record.ticket_id, TicketId::new('O', 6));
    }

    #[tokio::test]
    async fn blank_category_never_touches_the_ledger() {
        let ledger = TracingLedger::new();
        let err = allocator(&ledger).allocate("   ").await.unwrap_err();
        assert!(matches!(err, AllocationError::InvalidInput { .. }));
        assert!(ledger.operations().is_empty());
    }

    #[tokio::test]
    async fn read_failure_releases_the_gate() {
        let ledger = TracingLedger::new();
        ledger.inject_failure_once(OpKind::Get, "Giselle");
        let allocator = allocator(&ledger);

        let err = allocator.allocate("latte").await.unwrap_err();
        assert!(matches!(err, AllocationError::StoreUnavailable { .. }));
        assert!(!allocator.gate().is_held());

        let record = allocator.allocate("latte").await.unwrap();
        assert_eq!(record.ticket_id.number(), 1);
    }

    #[tokio::test]
    async fn append_conflict_is_reported_as_conflict() {
        let ledger = TracingLedger::new();
        ledger.inject_conflict(OpKind::Append, "Giselle");

        let err = allocator(&ledger).allocate("latte").await.unwrap_err();
        assert!(matches!(err, AllocationError::AllocationConflict { .. }));
    }

    #[tokio::test]
    async fn append_failure_does_not_consume_a_number() {
        let ledger = TracingLedger::new();
        ledger.inject_failure_once(OpKind::Append, "Giselle");
        let allocator = allocator(&ledger);

        assert!(allocator.allocate("latte").await.is_err());
        let record = allocator.allocate("latte").await.unwrap();
        assert_eq!(record.ticket_id.number(), 1);
    }

    #[tokio::test]
    async fn allocate_within_times_out_while_waiting_for_the_gate() {
        let ledger = TracingLedger::new();
        let allocator = allocator(&ledger);

        let held = allocator.gate().acquire().await;
        let err = allocator
            .allocate_within("latte", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::StoreUnavailable { source: None, .. }));
        held.release();

        assert!(ledger.operations().is_empty());
        let record = allocator
            .allocate_within("latte", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(record.ticket_id.number(), 1);
    }

    #[tokio::test]
    async fn allocate_within_cancels_a_slow_store() {
        let ledger = TracingLedger::with_latency(Duration::from_millis(200));
        let allocator = allocator(&ledger);

        let err = allocator
            .allocate_within("latte", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::StoreUnavailable { .. }));
        assert!(!allocator.gate().is_held());
    }

    #[tokio::test]
    async fn respects_a_custom_prefix() {
        let ledger = TracingLedger::new();
        ledger
            .seed(&range(PRIMARY), &[order_row("O9", "a", "t"), order_row("N2", "b", "t")])
            .await;

        let record = allocator(&ledger).with_prefix('N').allocate("latte").await.unwrap();
        assert_eq!(record.ticket_id.to_string(), "N3");
    }

    #[tokio::test]
    async fn reads_only_the_id_column() {
        let ledger = TracingLedger::new();
        allocator(&ledger).allocate("latte").await.unwrap();

        let ops = ledger.operations();
        assert_eq!(ops[0].kind(), OpKind::Get);
        assert_eq!(ops[0].range(), "Giselle!A2:A");
        assert_eq!(ops[1].kind(), OpKind::Append);
        assert_eq!(ops[1].range(), PRIMARY);
    }
}
