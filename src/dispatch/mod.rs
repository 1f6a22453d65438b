//! Contact dispatch: the serial, rate-limited push of classified rows into
//! a campaign.
//!
//! Builds per-contact payloads, feeds them through the serial queue, and
//! reports terminal counts for the batch.

mod payload;
mod queue;

pub use payload::{PayloadMeta, build_task, clean_company_name};
pub use queue::{
    ContactPusher, ContactSink, DispatchReport, PushTask, RetryPolicy, SerialQueue, TaskOutcome,
};

use std::sync::Arc;
use tracing::info;

use crate::classify::ClassifiedRow;
use crate::config::DispatchConfig;
use crate::error::DispatchError;

/// Dispatches classified rows to the campaign service, one at a time.
pub struct ContactDispatcher {
    pusher: Arc<dyn ContactPusher>,
    sink: Arc<dyn ContactSink>,
    policy: RetryPolicy,
    meta: PayloadMeta,
}

impl ContactDispatcher {
    pub fn new(
        pusher: Arc<dyn ContactPusher>,
        sink: Arc<dyn ContactSink>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            pusher,
            sink,
            policy: RetryPolicy {
                max_attempts: config.max_attempts,
                delay: config.push_delay(),
            },
            meta: PayloadMeta::from_config(config),
        }
    }

    /// Push a batch of classified rows to the given campaign.
    ///
    /// Completes only after every task reached a terminal state. The report
    /// carries pushed/skipped/failed counts; a queue-level failure aborts
    /// the remaining batch.
    pub async fn dispatch(
        &self,
        rows: &[ClassifiedRow],
        campaign_id: u64,
    ) -> Result<DispatchReport, DispatchError> {
        if rows.is_empty() {
            return Ok(DispatchReport::default());
        }

        let queue = SerialQueue::spawn(
            self.pusher.clone(),
            self.sink.clone(),
            self.policy,
            rows.len(),
        );

        for classified in rows {
            queue
                .enqueue(build_task(classified, campaign_id, &self.meta))
                .await?;
        }

        let report = queue.finish().await?;
        info!(
            "All contacts pushed to campaign {}. Total pushed: {}, skipped: {}, failed: {}",
            campaign_id, report.pushed, report.skipped, report.failed
        );
        Ok(report)
    }
}
