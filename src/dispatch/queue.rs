//! Strictly serial push queue.
//!
//! Exactly one task is in flight at a time; this is the rate-limit
//! mechanism against the campaign service, not a bottleneck to widen.
//! Tasks are delivered in enqueue order with a fixed inter-push delay,
//! bounded retries, and a terminal skip for the enrollment conflict.

use async_trait::async_trait;
use snafu::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::campaign::ContactPayload;
use crate::db::NewContact;
use crate::emit;
use crate::error::{ApiError, DbError, DispatchError, WorkerJoinSnafu};
use crate::metrics::events::{ContactPushed, DispatchQueueDepth, PushOutcome};

/// Push capability against the campaign service.
#[async_trait]
pub trait ContactPusher: Send + Sync {
    async fn push(&self, payload: &ContactPayload) -> Result<(), ApiError>;
}

/// Best-effort persistence of confirmed pushes.
#[async_trait]
pub trait ContactSink: Send + Sync {
    async fn record_contact(&self, contact: &NewContact) -> Result<(), DbError>;
}

/// One unit of dispatch work: the wire payload plus the contact row to
/// persist on success.
#[derive(Debug, Clone)]
pub struct PushTask {
    pub payload: ContactPayload,
    pub contact: NewContact,
}

/// Terminal state of a push task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The push was confirmed by the service.
    Succeeded,
    /// The contact is already enrolled; never retried.
    SkippedTerminal,
    /// Retries were exhausted.
    Failed,
}

/// Counts of terminal task states for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub pushed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.pushed + self.skipped + self.failed
    }

    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Succeeded => self.pushed += 1,
            TaskOutcome::SkippedTerminal => self.skipped += 1,
            TaskOutcome::Failed => self.failed += 1,
        }
    }
}

/// Retry discipline for a single task.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per task, including the first.
    pub max_attempts: u32,
    /// Delay after a successful push and before each retry.
    pub delay: Duration,
}

/// Handle to the background serial worker.
pub struct SerialQueue {
    tx: mpsc::Sender<PushTask>,
    handle: JoinHandle<DispatchReport>,
}

impl SerialQueue {
    /// Spawn the worker. `expected` is the batch size, used for the
    /// remaining-count progress log.
    pub fn spawn(
        pusher: Arc<dyn ContactPusher>,
        sink: Arc<dyn ContactSink>,
        policy: RetryPolicy,
        expected: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(Self::run(rx, pusher, sink, policy, expected));
        Self { tx, handle }
    }

    /// Enqueue a task. Tasks are delivered in enqueue order.
    pub async fn enqueue(&self, task: PushTask) -> Result<(), DispatchError> {
        self.tx
            .send(task)
            .await
            .map_err(|_| DispatchError::QueueClosed)
    }

    /// Close the queue and wait for every enqueued task to reach a terminal
    /// state.
    pub async fn finish(self) -> Result<DispatchReport, DispatchError> {
        drop(self.tx);
        self.handle.await.context(WorkerJoinSnafu)
    }

    async fn run(
        mut rx: mpsc::Receiver<PushTask>,
        pusher: Arc<dyn ContactPusher>,
        sink: Arc<dyn ContactSink>,
        policy: RetryPolicy,
        expected: usize,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut remaining = expected;

        while let Some(task) = rx.recv().await {
            remaining = remaining.saturating_sub(1);
            emit!(DispatchQueueDepth { count: remaining });

            let outcome = Self::deliver(&task, &*pusher, &*sink, &policy, remaining).await;
            report.record(outcome);
            emit!(ContactPushed {
                outcome: PushOutcome::from(outcome)
            });
        }

        emit!(DispatchQueueDepth { count: 0 });
        report
    }

    /// Drive one task to a terminal state.
    async fn deliver(
        task: &PushTask,
        pusher: &dyn ContactPusher,
        sink: &dyn ContactSink,
        policy: &RetryPolicy,
        remaining: usize,
    ) -> TaskOutcome {
        let email = task.payload.email.as_str();

        for attempt in 1..=policy.max_attempts {
            match pusher.push(&task.payload).await {
                Ok(()) => {
                    // Persistence is best-effort: a failure here must not
                    // block the queue or undo the confirmed push.
                    if let Err(e) = sink.record_contact(&task.contact).await {
                        error!("Failed to insert contact {} to database: {}", email, e);
                    }
                    info!(
                        "Contact with email {} created and pushed to campaign ID {} (remaining: {})",
                        email, task.payload.campaign_id, remaining
                    );
                    tokio::time::sleep(policy.delay).await;
                    return TaskOutcome::Succeeded;
                }
                Err(e) if !e.is_retryable() => {
                    warn!("Skipping {}: {}", email, e);
                    return TaskOutcome::SkippedTerminal;
                }
                Err(e) => {
                    if attempt < policy.max_attempts {
                        warn!(
                            "Push failed for {} (attempt {}/{}), retrying: {}",
                            email, attempt, policy.max_attempts, e
                        );
                        tokio::time::sleep(policy.delay).await;
                    } else {
                        error!(
                            "Failed after {} attempts for {}: {}",
                            policy.max_attempts, email, e
                        );
                    }
                }
            }
        }

        TaskOutcome::Failed
    }
}
