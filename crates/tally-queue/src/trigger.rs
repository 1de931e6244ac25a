//! Merge invocation: after each submission and on a fixed interval.
//!
//! The periodic path is guarded: it reads the secondary range first and only
//! merges when that range holds data. The post-submission path always
//! merges. Merges from every path run one at a time on the trigger's own
//! lock, separate from the allocation gate, so a clear is never interleaved
//! with another merge's append.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_core::observability::merge_span;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use crate::error::MergeError;
use crate::merge::{MergeEngine, MergePlan};
use crate::metrics::{self, MergeTimer};

/// Default period of the guarded merge.
pub const DEFAULT_MERGE_INTERVAL: Duration = Duration::from_secs(30);

/// What caused a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// A successful submission.
    Submission,
    /// The periodic timer.
    Periodic,
    /// An explicit request (the combine endpoint).
    Manual,
}

impl TriggerSource {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Periodic => "periodic",
            Self::Manual => "manual",
        }
    }
}

/// Result of one periodic tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The secondary range was empty; nothing was written.
    Skipped,
    /// A merge ran and wrote `rows` rows.
    Merged {
        /// Rows written to the destination.
        rows: usize,
    },
}

/// Point-in-time merge counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    /// Merges that completed.
    pub successful: u64,
    /// Merges that failed.
    pub failed: u64,
    /// Periodic ticks skipped on an empty secondary range.
    pub skipped: u64,
    /// Merges running or waiting for the merge lock.
    pub in_flight: u64,
    /// Completion time of the latest successful merge.
    pub last_success: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
    successful: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    in_flight: AtomicU64,
    last_success_ts: AtomicI64,
}

impl Counters {
    fn record_success(&self) {
        self.last_success_ts
            .store(Utc::now().timestamp_millis(), Ordering::Release);
        self.successful.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MergeStats {
        let last = self.last_success_ts.load(Ordering::Acquire);
        MergeStats {
            successful: self.successful.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
            in_flight: self.in_flight.load(Ordering::Acquire),
            last_success: (last != 0)
                .then(|| DateTime::from_timestamp_millis(last))
                .flatten(),
        }
    }
}

struct InFlight<'a>(&'a AtomicU64);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicU64) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs merges for one [`MergePlan`] and keeps their statistics.
#[derive(Debug)]
pub struct MergeTrigger {
    engine: MergeEngine,
    plan: MergePlan,
    interval: Duration,
    counters: Counters,
    merging: Mutex<()>,
}

impl MergeTrigger {
    /// Creates a trigger with the default 30 second interval.
    #[must_use]
    pub fn new(engine: MergeEngine, plan: MergePlan) -> Self {
        Self {
            engine,
            plan,
            interval: DEFAULT_MERGE_INTERVAL,
            counters: Counters::default(),
            merging: Mutex::new(()),
        }
    }

    /// Sets the period of the guarded merge.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns the merge plan.
    #[must_use]
    pub fn plan(&self) -> &MergePlan {
        &self.plan
    }

    /// Returns the period of the guarded merge.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the current counters.
    #[must_use]
    pub fn stats(&self) -> MergeStats {
        self.counters.snapshot()
    }

    /// Merges unconditionally and records the outcome.
    ///
    /// Waits for any merge already running on this trigger to finish first.
    ///
    /// # Errors
    ///
    /// Propagates the [`MergeError`] of the failed merge.
    pub async fn run_once(&self, source: TriggerSource) -> Result<usize, MergeError> {
        let span = merge_span(source.as_str(), &self.plan.destination.a1());
        async move {
            let _in_flight = InFlight::enter(&self.counters.in_flight);
            let _merging = self.merging.lock().await;
            let timer = MergeTimer::start(source.as_str());

            match self.engine.merge(&self.plan).await {
                Ok(rows) => {
                    timer.finish(rows);
                    self.counters.record_success();
                    tracing::info!(rows, "merge completed");
                    Ok(rows)
                }
                Err(err) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    metrics::record_merge_error(source.as_str(), err.kind());
                    tracing::error!(error = %err, "merge failed");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Merges after a successful submission.
    ///
    /// # Errors
    ///
    /// Propagates the [`MergeError`] of the failed merge.
    pub async fn after_submission(&self) -> Result<usize, MergeError> {
        self.run_once(TriggerSource::Submission).await
    }

    /// Runs one guarded tick: merges only if the secondary range has data.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::StoreUnavailable`] if the guard read fails, or
    /// the error of the merge itself.
    pub async fn tick(&self) -> Result<TickOutcome, MergeError> {
        let secondary = self.engine.store().get(&self.plan.source_b).await?;
        if secondary.is_empty() {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            metrics::record_merge_skipped();
            tracing::debug!(range = %self.plan.source_b, "secondary range empty, skipping merge");
            return Ok(TickOutcome::Skipped);
        }
        let rows = self.run_once(TriggerSource::Periodic).await?;
        Ok(TickOutcome::Merged { rows })
    }

    /// Runs guarded ticks every interval until `shutdown` resolves.
    ///
    /// The first tick fires immediately. Tick failures are logged and the
    /// loop keeps going; a tick that overruns the interval delays the next
    /// one rather than bunching them up.
    pub async fn run_periodic<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            source = %self.plan.source_b,
            "starting periodic merge loop"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("periodic merge loop stopped");
                    break;
                }
                _ = timer.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::warn!(error = %err, "periodic merge tick failed");
                    }
                }
            }
        }
    }
}
