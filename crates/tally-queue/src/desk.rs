//! Order intake: allocate a ticket, then refresh the combined view.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tally_core::{LedgerStore, OrderRecord};

use crate::allocator::TicketAllocator;
use crate::error::AllocationError;
use crate::layout::LedgerLayout;
use crate::merge::MergeEngine;
use crate::trigger::MergeTrigger;

/// How long a submission waits for its follow-up merge.
pub const DEFAULT_SUBMIT_MERGE_TIMEOUT: Duration = Duration::from_secs(10);

/// How the post-submission merge went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MergeOutcome {
    /// The combined view was rewritten.
    Merged {
        /// Rows written.
        rows: usize,
    },
    /// The merge failed; the order itself is recorded.
    Failed {
        /// Merge error message.
        message: String,
    },
}

/// A recorded order and the outcome of the merge that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// The allocated order.
    pub record: OrderRecord,
    /// Post-submission merge result.
    pub merge: MergeOutcome,
}

/// Accepts orders for one ledger layout.
#[derive(Debug, Clone)]
pub struct OrderDesk {
    allocator: TicketAllocator,
    trigger: Arc<MergeTrigger>,
    merge_timeout: Duration,
}

impl OrderDesk {
    /// Creates a desk from its parts.
    #[must_use]
    pub fn new(allocator: TicketAllocator, trigger: Arc<MergeTrigger>) -> Self {
        Self {
            allocator,
            trigger,
            merge_timeout: DEFAULT_SUBMIT_MERGE_TIMEOUT,
        }
    }

    /// Sets how long [`OrderDesk::submit`] waits for the follow-up merge.
    #[must_use]
    pub fn with_merge_timeout(mut self, timeout: Duration) -> Self {
        self.merge_timeout = timeout;
        self
    }

    /// Wires an allocator and a trigger for `layout` over `store`.
    #[must_use]
    pub fn from_layout(store: Arc<dyn LedgerStore>, layout: &LedgerLayout) -> Self {
        let allocator = TicketAllocator::from_layout(Arc::clone(&store), layout);
        let engine = MergeEngine::new(store).with_time(layout.time);
        let trigger = MergeTrigger::new(engine, layout.merge_plan());
        Self::new(allocator, Arc::new(trigger))
    }

    /// Returns the allocator.
    #[must_use]
    pub fn allocator(&self) -> &TicketAllocator {
        &self.allocator
    }

    /// Returns the merge trigger.
    #[must_use]
    pub fn trigger(&self) -> &Arc<MergeTrigger> {
        &self.trigger
    }

    /// Returns how long a submission waits for its follow-up merge.
    #[must_use]
    pub fn merge_timeout(&self) -> Duration {
        self.merge_timeout
    }

    /// Records an order and then merges.
    ///
    /// The merge runs after the allocation gate is released, on its own task.
    /// A failed merge does not undo the order; it is reported in
    /// [`Submission::merge`]. A merge still running after the merge timeout
    /// is reported as failed and left to finish in the background, so
    /// dropping this future never interrupts a merge between its clear and
    /// its append.
    ///
    /// # Errors
    ///
    /// Returns the [`AllocationError`] if no ticket could be allocated; no
    /// merge is attempted in that case.
    pub async fn submit(&self, category: &str) -> Result<Submission, AllocationError> {
        let record = self.allocator.allocate(category).await?;

        let trigger = Arc::clone(&self.trigger);
        let merge = tokio::spawn(async move { trigger.after_submission().await });
        let merge = match tokio::time::timeout(self.merge_timeout, merge).await {
            Ok(Ok(Ok(rows))) => MergeOutcome::Merged { rows },
            Ok(Ok(Err(err))) => MergeOutcome::Failed {
                message: err.to_string(),
            },
            Ok(Err(join)) => MergeOutcome::Failed {
                message: format!("merge task failed: {join}"),
            },
            Err(_) => {
                tracing::warn!(
                    ticket = %record.ticket_id,
                    timeout_ms = self.merge_timeout.as_millis(),
                    "post-submission merge still running, reporting partial success"
                );
                MergeOutcome::Failed {
                    message: format!(
                        "merge did not finish within {} ms",
                        self.merge_timeout.as_millis()
                    ),
                }
            }
        };
        Ok(Submission { record, merge })
    }
}
