//! Error types for flurry using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error"))]
    S3Config { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Source path is empty.
    #[snafu(display("Source path cannot be empty"))]
    EmptySourcePath,

    /// Database URL is empty.
    #[snafu(display("Database URL cannot be empty"))]
    EmptyDatabaseUrl,

    /// Campaign API key is empty.
    #[snafu(display("Campaign API key cannot be empty"))]
    EmptyApiKey,

    /// Campaign email account is empty.
    #[snafu(display("Campaign email account cannot be empty"))]
    EmptyEmailAccount,

    /// Campaign sequence has no email templates.
    #[snafu(display("Campaign must have at least one email template"))]
    EmptyTemplates,

    /// Retry bound of zero would never attempt a push.
    #[snafu(display("dispatch.max_attempts must be at least 1"))]
    ZeroAttempts,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },
}

// ============ Filter Errors ============

/// Errors that can occur while parsing and filtering CSV exports.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FilterError {
    /// CSV parsing failed.
    #[snafu(display("Failed to parse CSV for {name}"))]
    CsvParse { source: csv::Error, name: String },

    /// CSV serialization failed.
    #[snafu(display("Failed to serialize filtered rows"))]
    CsvWrite { source: csv::Error },

    /// Flushing the serialized CSV buffer failed.
    #[snafu(display("Failed to flush serialized rows"))]
    CsvFlush { source: std::io::Error },

    /// Failed to write the filtered staging copy.
    #[snafu(display("Failed to write staging copy to {path}"))]
    StagingWrite {
        source: std::io::Error,
        path: String,
    },
}

// ============ Database Errors ============

/// Errors that can occur against the relational store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DbError {
    /// Failed to open the connection pool.
    #[snafu(display("Failed to connect to database"))]
    Connect { source: sqlx::Error },

    /// A statement failed.
    #[snafu(display("Database query failed"))]
    Query { source: sqlx::Error },
}

// ============ Campaign API Errors ============

/// Errors surfaced by the campaign service.
///
/// The service's status taxonomy is mapped once, at the HTTP client layer,
/// so retry/skip decisions downstream match on a variant instead of prose.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApiError {
    /// 400 - malformed request payload.
    #[snafu(display("Wrong input parameter: {message}"))]
    BadRequest { message: String },

    /// 401 - the API key was rejected.
    #[snafu(display("User not found. Invalid API key."))]
    Unauthorized,

    /// 403 - the API key doesn't have access to the requested resource.
    #[snafu(display("Access denied. The API key doesn't have access to the requested resource."))]
    Forbidden,

    /// 404 - the requested resource could not be found.
    #[snafu(display("The requested resource could not be found: {message}"))]
    NotFound { message: String },

    /// 5xx - server-side failure.
    #[snafu(display("Server error (status {status}): {message}"))]
    Server { status: u16, message: String },

    /// Any other status the service returns.
    #[snafu(display("Unexpected error (status {status}): {message}"))]
    Unexpected { status: u16, message: String },

    /// The contact is already enrolled in the target sequence.
    /// Terminal: never retried, recorded as a skip.
    #[snafu(display("Contact is already in this sequence: {message}"))]
    AlreadyEnrolled { message: String },

    /// Transport-level failure (connect, timeout, TLS).
    #[snafu(display("Campaign API request failed"))]
    Transport { source: reqwest::Error },

    /// The response body could not be decoded.
    #[snafu(display("Failed to decode campaign API response"))]
    Decode { source: reqwest::Error },
}

impl ApiError {
    /// Check if this error represents a "not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Check if this error is worth retrying.
    ///
    /// Everything except the already-enrolled conflict enters the retry
    /// path; the conflict is terminal by contract.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ApiError::AlreadyEnrolled { .. })
    }
}

// ============ Dispatch Errors ============

/// Queue-level dispatch failures. Per-task failures are outcomes, not errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DispatchError {
    /// The queue worker went away while tasks were still being enqueued.
    #[snafu(display("Dispatch queue closed unexpectedly"))]
    QueueClosed,

    /// The queue worker panicked or was aborted.
    #[snafu(display("Dispatch worker failed"))]
    WorkerJoin { source: tokio::task::JoinError },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level pipeline errors that aggregate all error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Storage error.
    #[snafu(display("Storage error"))]
    PipelineStorage { source: StorageError },

    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Filter error.
    #[snafu(display("Filter error"))]
    Filter { source: FilterError },

    /// Database error.
    #[snafu(display("Database error"))]
    Db { source: DbError },

    /// Campaign service error.
    #[snafu(display("Campaign API error"))]
    Api { source: ApiError },

    /// Dispatch queue error.
    #[snafu(display("Dispatch error"))]
    Dispatch { source: DispatchError },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },
}
