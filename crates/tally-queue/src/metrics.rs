//! Queue metrics.
//!
//! Counters and histograms for ticket allocation and ledger merging. These
//! complement the structured logs emitted inside the allocation and merge
//! spans; the recorder itself is installed by the binary.

use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_histogram, histogram};

// ============================================================================
// Allocation Metrics
// ============================================================================

/// Tickets successfully allocated.
pub const TICKETS_ALLOCATED: &str = "tally_tickets_allocated_total";

/// Allocation failures, labelled by kind.
pub const ALLOCATION_ERRORS: &str = "tally_allocation_errors_total";

/// Time spent waiting for the exclusion gate.
pub const GATE_WAIT: &str = "tally_gate_wait_seconds";

// ============================================================================
// Merge Metrics
// ============================================================================

/// Merge cycles started, labelled by trigger.
pub const MERGE_CYCLES: &str = "tally_merge_cycles_total";

/// Rows written to the combined range.
pub const MERGE_ROWS_WRITTEN: &str = "tally_merge_rows_written_total";

/// Merge failures, labelled by kind.
pub const MERGE_ERRORS: &str = "tally_merge_errors_total";

/// Periodic ticks skipped because the secondary range was empty.
pub const MERGE_SKIPPED: &str = "tally_merge_skipped_total";

/// Merge cycle duration.
pub const MERGE_DURATION: &str = "tally_merge_duration_seconds";

// ============================================================================
// Metric Registration
// ============================================================================

/// Registers all queue metric descriptions.
///
/// Call this once at application startup after installing the recorder.
pub fn register_metrics() {
    describe_counter!(TICKETS_ALLOCATED, "Total tickets allocated");
    describe_counter!(ALLOCATION_ERRORS, "Total failed ticket allocations");
    describe_histogram!(GATE_WAIT, "Time spent waiting for the allocation gate in seconds");
    describe_counter!(MERGE_CYCLES, "Total merge cycles started");
    describe_counter!(MERGE_ROWS_WRITTEN, "Total rows written by merges");
    describe_counter!(MERGE_ERRORS, "Total failed merge cycles");
    describe_counter!(MERGE_SKIPPED, "Total periodic merges skipped on an empty source");
    describe_histogram!(MERGE_DURATION, "Duration of merge cycles in seconds");
}

// ============================================================================
// Metric Recording
// ============================================================================

/// Records a successful allocation.
pub fn record_allocation() {
    counter!(TICKETS_ALLOCATED).increment(1);
}

/// Records a failed allocation.
pub fn record_allocation_error(kind: &'static str) {
    counter!(ALLOCATION_ERRORS, "kind" => kind).increment(1);
}

/// Records how long a caller waited for the gate.
pub fn record_gate_wait(waited: Duration) {
    histogram!(GATE_WAIT).record(waited.as_secs_f64());
}

/// Records a merge failure.
pub fn record_merge_error(trigger: &'static str, kind: &'static str) {
    counter!(MERGE_ERRORS, "trigger" => trigger, "kind" => kind).increment(1);
}

/// Records a skipped periodic tick.
pub fn record_merge_skipped() {
    counter!(MERGE_SKIPPED).increment(1);
}

/// RAII-style timer for one merge cycle.
pub struct MergeTimer {
    trigger: &'static str,
    start: Instant,
}

impl MergeTimer {
    /// Starts timing a merge and counts the cycle.
    #[must_use]
    pub fn start(trigger: &'static str) -> Self {
        counter!(MERGE_CYCLES, "trigger" => trigger).increment(1);
        Self {
            trigger,
            start: Instant::now(),
        }
    }

    /// Stops the timer and records the rows written.
    pub fn finish(self, rows_written: usize) {
        let duration = self.start.elapsed().as_secs_f64();
        histogram!(MERGE_DURATION, "trigger" => self.trigger).record(duration);
        counter!(MERGE_ROWS_WRITTEN).increment(rows_written as u64);

        tracing::debug!(
            trigger = self.trigger,
            duration_secs = duration,
            rows_written,
            "Recorded merge metrics"
        );
    }
}
