//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

use crate::dispatch::TaskOutcome;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Status of an external request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when rows pass the row filter.
pub struct RowsFiltered {
    pub count: u64,
}

impl InternalEvent for RowsFiltered {
    fn emit(self) {
        trace!(count = self.count, "Rows filtered");
        counter!("flurry_rows_filtered_total").increment(self.count);
    }
}

/// Event emitted when a row's survival decision is made.
pub struct RowClassified {
    pub survived: bool,
}

impl InternalEvent for RowClassified {
    fn emit(self) {
        trace!(survived = self.survived, "Row classified");
        let outcome = if self.survived { "survived" } else { "excluded" };
        counter!("flurry_rows_classified_total", "outcome" => outcome).increment(1);
    }
}

/// Backing store targeted by an existence lookup.
#[derive(Debug, Clone, Copy)]
pub enum LookupStore {
    Primary,
    Registry,
}

impl LookupStore {
    fn as_str(&self) -> &'static str {
        match self {
            LookupStore::Primary => "primary",
            LookupStore::Registry => "registry",
        }
    }
}

/// Event emitted when an existence lookup completes.
pub struct LookupRequest {
    pub store: LookupStore,
    pub status: RequestStatus,
}

impl InternalEvent for LookupRequest {
    fn emit(self) {
        trace!(
            store = self.store.as_str(),
            status = self.status.as_str(),
            "Lookup request"
        );
        counter!(
            "flurry_lookup_requests_total",
            "store" => self.store.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Terminal outcome of a contact push, as a metric label.
#[derive(Debug, Clone, Copy)]
pub enum PushOutcome {
    Pushed,
    Skipped,
    Failed,
}

impl From<TaskOutcome> for PushOutcome {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Succeeded => PushOutcome::Pushed,
            TaskOutcome::SkippedTerminal => PushOutcome::Skipped,
            TaskOutcome::Failed => PushOutcome::Failed,
        }
    }
}

impl PushOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            PushOutcome::Pushed => "pushed",
            PushOutcome::Skipped => "skipped",
            PushOutcome::Failed => "failed",
        }
    }
}

/// Event emitted when a push task reaches a terminal state.
pub struct ContactPushed {
    pub outcome: PushOutcome,
}

impl InternalEvent for ContactPushed {
    fn emit(self) {
        trace!(outcome = self.outcome.as_str(), "Contact pushed");
        counter!("flurry_contacts_pushed_total", "outcome" => self.outcome.as_str()).increment(1);
    }
}

/// Event emitted when the dispatch queue depth changes.
pub struct DispatchQueueDepth {
    pub count: usize,
}

impl InternalEvent for DispatchQueueDepth {
    fn emit(self) {
        trace!(count = self.count, "Dispatch queue depth");
        gauge!("flurry_dispatch_queue_depth").set(self.count as f64);
    }
}

/// Status of a processed unit of work (folder or file).
#[derive(Debug, Clone, Copy)]
pub enum UnitStatus {
    Success,
    Skipped,
    Failed,
}

impl UnitStatus {
    fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Success => "success",
            UnitStatus::Skipped => "skipped",
            UnitStatus::Failed => "failed",
        }
    }
}

/// Event emitted when a folder finishes processing.
pub struct FolderProcessed {
    pub status: UnitStatus,
}

impl InternalEvent for FolderProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Folder processed");
        counter!("flurry_folders_processed_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Event emitted when a file finishes processing.
pub struct FileProcessed {
    pub status: UnitStatus,
}

impl InternalEvent for FileProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), "File processed");
        counter!("flurry_files_processed_total", "status" => self.status.as_str()).increment(1);
    }
}

// ============================================================================
// External request events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    List,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::List => "list",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "flurry_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request duration"
        );
        histogram!(
            "flurry_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}

/// Campaign API operation types.
#[derive(Debug, Clone, Copy)]
pub enum ApiOperation {
    FindCampaign,
    CreateCampaign,
    PushContact,
}

impl ApiOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiOperation::FindCampaign => "find_campaign",
            ApiOperation::CreateCampaign => "create_campaign",
            ApiOperation::PushContact => "push_contact",
        }
    }
}

/// Event emitted when a campaign API request completes.
pub struct ApiRequest {
    pub operation: ApiOperation,
    pub status: RequestStatus,
}

impl InternalEvent for ApiRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "API request"
        );
        counter!(
            "flurry_api_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a campaign API request completes with duration.
pub struct ApiRequestDuration {
    pub operation: ApiOperation,
    pub duration: Duration,
}

impl InternalEvent for ApiRequestDuration {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            duration_ms = self.duration.as_millis(),
            "API request duration"
        );
        histogram!(
            "flurry_api_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
