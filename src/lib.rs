//! flurry: A batch pipeline for pushing business-registry contacts into an
//! email campaign service.
//!
//! The pipeline walks a cloud-storage folder tree of CSV exports, filters
//! rows by geography, classifies contacts against the relational store to
//! drop known addresses, and drains the survivors through a strictly serial,
//! rate-limited push queue into the campaign service. Processed folders and
//! files are recorded so reruns resume where they left off.
//!
//! # Example
//!
//! ```ignore
//! use flurry::{Config, run_pipeline, error::PipelineError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_file("config.yaml")?;
//!     let stats = run_pipeline(config).await?;
//!     println!("Pushed {} contacts", stats.contacts_pushed);
//!     Ok(())
//! }
//! ```

pub mod campaign;
pub mod classify;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod pipeline;
pub mod storage;

// Re-export main types
pub use config::Config;
pub use pipeline::{Pipeline, PipelineStats, run_pipeline};
pub use storage::{StorageProvider, StorageProviderRef};
