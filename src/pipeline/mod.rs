//! Main processing pipeline.
//!
//! Walks the export folder tree and sequences filter → classify →
//! resolve-campaign → dispatch per file, with processed-folder and
//! processed-file checkpoints so a rerun resumes where it left off.
//!
//! Per-folder and per-file errors are caught and logged; they abort only
//! their own unit of work, never the outer loop.

mod signal;

use snafu::prelude::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::campaign::{CampaignClient, CampaignDirectory, CampaignResolver};
use crate::classify::{EmailLookup, classify_rows};
use crate::config::Config;
use crate::db::{CheckpointStore, ContactStore};
use crate::dispatch::{ContactDispatcher, ContactPusher, ContactSink};
use crate::emit;
use crate::error::{
    ApiSnafu, DbSnafu, DispatchSnafu, FilterSnafu, PipelineError, PipelineStorageSnafu,
    StagingWriteSnafu,
};
use crate::filter::{filter_rows, rows_to_csv};
use crate::metrics::events::{FileProcessed, FolderProcessed, RowsFiltered, UnitStatus};
use crate::storage::{FileRef, FolderRef, StorageProvider, StorageProviderRef};

/// Statistics about the pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub folders_processed: usize,
    pub folders_skipped: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub rows_filtered: usize,
    pub rows_survived: usize,
    pub contacts_pushed: usize,
    pub contacts_skipped: usize,
    pub contacts_failed: usize,
}

/// Result of one unit of work (a folder or a file).
enum UnitOutcome {
    Processed,
    Skipped,
}

/// Main processing pipeline.
pub struct Pipeline {
    config: Config,
    storage: StorageProviderRef,
    checkpoints: Arc<dyn CheckpointStore>,
    lookup: Arc<dyn EmailLookup>,
    resolver: CampaignResolver,
    dispatcher: ContactDispatcher,
    shutdown: CancellationToken,
    stats: PipelineStats,
}

impl Pipeline {
    /// Create a pipeline with production collaborators from configuration.
    pub async fn new(config: Config, shutdown: CancellationToken) -> Result<Self, PipelineError> {
        let storage = Arc::new(
            StorageProvider::for_url_with_options(
                &config.source.path,
                config.source.storage_options.clone(),
            )
            .await
            .context(PipelineStorageSnafu)?,
        );

        let store = Arc::new(
            ContactStore::connect(&config.database)
                .await
                .context(DbSnafu)?,
        );

        let client = Arc::new(CampaignClient::new(&config.campaign).context(ApiSnafu)?);

        Ok(Self::assemble(
            config, storage, store.clone(), store.clone(), client.clone(), client, store, shutdown,
        ))
    }

    /// Wire a pipeline from its collaborators.
    ///
    /// `new` uses this with the production storage/store/client; tests
    /// substitute fakes for the external services.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        config: Config,
        storage: StorageProviderRef,
        checkpoints: Arc<dyn CheckpointStore>,
        lookup: Arc<dyn EmailLookup>,
        directory: Arc<dyn CampaignDirectory>,
        pusher: Arc<dyn ContactPusher>,
        sink: Arc<dyn ContactSink>,
        shutdown: CancellationToken,
    ) -> Self {
        let resolver = CampaignResolver::new(directory, &config.campaign);
        let dispatcher = ContactDispatcher::new(pusher, sink, &config.dispatch);

        Self {
            config,
            storage,
            checkpoints,
            lookup,
            resolver,
            dispatcher,
            shutdown,
            stats: PipelineStats::default(),
        }
    }

    /// Run the pipeline once over the folder tree.
    pub async fn run(&mut self) -> Result<PipelineStats, PipelineError> {
        info!("Starting pipeline over {}", self.storage.canonical_url());

        let folders = self
            .storage
            .list_folders()
            .await
            .context(PipelineStorageSnafu)?;
        info!("Found {} folders", folders.len());

        for folder in folders {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, stopping run");
                break;
            }

            match self.process_folder(&folder).await {
                Ok(UnitOutcome::Processed) => {
                    self.stats.folders_processed += 1;
                    emit!(FolderProcessed {
                        status: UnitStatus::Success
                    });
                }
                Ok(UnitOutcome::Skipped) => {
                    self.stats.folders_skipped += 1;
                    emit!(FolderProcessed {
                        status: UnitStatus::Skipped
                    });
                }
                Err(e) => {
                    warn!("Failed to process folder {}: {}", folder.name, e);
                    emit!(FolderProcessed {
                        status: UnitStatus::Failed
                    });
                }
            }
        }

        info!("Done processing storage folders and files.");
        Ok(self.stats.clone())
    }

    /// Process one folder: attempt every file inside, then mark the folder.
    ///
    /// The folder is marked processed even when some of its files failed;
    /// a rerun will not revisit it. Only a marker-write failure leaves the
    /// folder unmarked (and counted as failed).
    async fn process_folder(&mut self, folder: &FolderRef) -> Result<UnitOutcome, PipelineError> {
        if self
            .checkpoints
            .folder_processed(folder)
            .await
            .context(DbSnafu)?
        {
            debug!("Folder {} already processed, skipping", folder.name);
            return Ok(UnitOutcome::Skipped);
        }

        if let Err(e) = self.process_files(folder).await {
            warn!("Failed to process files in folder {}: {}", folder.name, e);
        }

        self.checkpoints
            .mark_folder_processed(folder)
            .await
            .context(DbSnafu)?;

        Ok(UnitOutcome::Processed)
    }

    /// Process every export file inside a folder.
    async fn process_files(&mut self, folder: &FolderRef) -> Result<(), PipelineError> {
        let files = self
            .storage
            .list_files(folder, &self.config.source.file_extension)
            .await
            .context(PipelineStorageSnafu)?;
        info!("Found {} files in folder {}", files.len(), folder.name);

        for file in files {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, stopping folder {}", folder.name);
                break;
            }

            match self.process_file(folder, &file).await {
                Ok(UnitOutcome::Processed) => {
                    self.stats.files_processed += 1;
                    emit!(FileProcessed {
                        status: UnitStatus::Success
                    });
                }
                Ok(UnitOutcome::Skipped) => {
                    self.stats.files_skipped += 1;
                    emit!(FileProcessed {
                        status: UnitStatus::Skipped
                    });
                }
                Err(e) => {
                    warn!(
                        "Failed to process file {} in folder {}: {}",
                        file.name, folder.name, e
                    );
                    emit!(FileProcessed {
                        status: UnitStatus::Failed
                    });
                }
            }
        }

        Ok(())
    }

    /// Run the per-file pipeline: filter → classify → resolve → dispatch →
    /// mark processed.
    async fn process_file(
        &mut self,
        folder: &FolderRef,
        file: &FileRef,
    ) -> Result<UnitOutcome, PipelineError> {
        if self
            .checkpoints
            .file_processed(&folder.id, &file.id)
            .await
            .context(DbSnafu)?
        {
            debug!("File {} already processed, skipping", file.name);
            return Ok(UnitOutcome::Skipped);
        }

        let text = self
            .storage
            .download_text(file)
            .await
            .context(PipelineStorageSnafu)?;

        let rows = filter_rows(&text, &self.config.filter, &file.name).context(FilterSnafu)?;
        info!("Filtered {} rows from {}", rows.len(), file.name);
        self.stats.rows_filtered += rows.len();
        emit!(RowsFiltered {
            count: rows.len() as u64
        });

        if let Some(staging_dir) = &self.config.source.staging_dir {
            self.write_staging_copy(staging_dir, &file.name, &rows)
                .context(FilterSnafu)?;
        }

        let classified = classify_rows(rows, &*self.lookup, &self.config.classify)
            .await
            .context(DbSnafu)?;
        self.stats.rows_survived += classified.len();

        let campaign_name = format!("{}_{}", folder.name, file.name);
        let campaign_id = self
            .resolver
            .resolve(&campaign_name)
            .await
            .context(ApiSnafu)?;

        let report = self
            .dispatcher
            .dispatch(&classified, campaign_id)
            .await
            .context(DispatchSnafu)?;
        self.stats.contacts_pushed += report.pushed;
        self.stats.contacts_skipped += report.skipped;
        self.stats.contacts_failed += report.failed;

        self.checkpoints
            .mark_file_processed(&folder.id, &file.id)
            .await
            .context(DbSnafu)?;

        Ok(UnitOutcome::Processed)
    }

    /// Keep a local copy of the filtered rows, as the original exports did.
    fn write_staging_copy(
        &self,
        staging_dir: &str,
        file_name: &str,
        rows: &[crate::filter::Row],
    ) -> Result<(), crate::error::FilterError> {
        let csv = rows_to_csv(rows, &self.config.filter.columns)?;
        let path = std::path::Path::new(staging_dir).join(format!("filtered_{file_name}"));

        std::fs::create_dir_all(staging_dir).context(StagingWriteSnafu {
            path: staging_dir.to_string(),
        })?;
        std::fs::write(&path, csv).context(StagingWriteSnafu {
            path: path.display().to_string(),
        })?;

        info!("Saved {}", path.display());
        Ok(())
    }
}

/// Run the pipeline with the given configuration.
pub async fn run_pipeline(config: Config) -> Result<PipelineStats, PipelineError> {
    let shutdown = CancellationToken::new();

    // Set up signal handler for graceful shutdown
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            signal::shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let mut pipeline = Pipeline::new(config, shutdown).await?;
    pipeline.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_stats_default() {
        let stats = PipelineStats::default();
        assert_eq!(stats.folders_processed, 0);
        assert_eq!(stats.contacts_pushed, 0);
    }
}
