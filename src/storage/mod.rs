//! Cloud storage abstraction for the export folder tree.
//!
//! Provides a unified interface for walking per-period export folders and
//! downloading CSV files from S3 or the local filesystem. Authentication is
//! delegated to the backend's credential chain; no interactive auth flow
//! lives in this process.

mod local;
mod s3;

use object_store::ObjectStore;
use object_store::path::Path;
use regex::Regex;
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::debug;

use crate::emit;
use crate::error::{InvalidUrlSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

// Re-export config types
pub use local::LocalConfig;
pub use s3::S3Config;

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// A per-period export folder under the configured root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    /// Full object-store prefix of the folder; stable across runs and used
    /// as the processed-folder marker key.
    pub id: String,
    /// Last path component, e.g. "2024-Q1".
    pub name: String,
}

/// A single export file inside a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Full object-store path of the file; used as the processed-file
    /// marker key.
    pub id: String,
    /// File name, e.g. "filings_january.csv".
    pub name: String,
}

/// Storage provider that abstracts over the supported storage backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

// URL patterns for the supported storage backends
const S3_PATH: &str =
    r"^https://s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-\.]+)\.s3\.(?P<region>[\w\-]+)\.amazonaws\.com(/(?P<key>.+))?$";
const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_URL: &str = r"^file:(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum Backend {
    S3,
    Local,
}

fn matchers() -> &'static HashMap<Backend, Vec<Regex>> {
    static MATCHERS: OnceLock<HashMap<Backend, Vec<Regex>>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        let mut m = HashMap::new();

        m.insert(
            Backend::S3,
            vec![
                Regex::new(S3_PATH).unwrap(),
                Regex::new(S3_VIRTUAL).unwrap(),
                Regex::new(S3_URL).unwrap(),
            ],
        );

        m.insert(
            Backend::Local,
            vec![
                Regex::new(FILE_URI).unwrap(),
                Regex::new(FILE_URL).unwrap(),
                Regex::new(FILE_PATH).unwrap(),
            ],
        );

        m
    })
}

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        for (k, v) in matchers() {
            if let Some(matches) = v.iter().filter_map(|r| r.captures(url)).next() {
                return match k {
                    Backend::S3 => Self::parse_s3(matches),
                    Backend::Local => Self::parse_local(matches),
                };
            }
        }

        InvalidUrlSnafu {
            url: url.to_string(),
        }
        .fail()
    }

    fn parse_s3(matches: regex::Captures) -> Result<Self, StorageError> {
        let bucket = matches
            .name("bucket")
            .expect("bucket should always be available")
            .as_str()
            .to_string();

        let region = std::env::var("AWS_DEFAULT_REGION")
            .ok()
            .or_else(|| matches.name("region").map(|m| m.as_str().to_string()));

        let key = matches.name("key").map(|m| m.as_str().into());

        Ok(BackendConfig::S3(S3Config {
            region,
            bucket,
            key,
        }))
    }

    fn parse_local(matches: regex::Captures) -> Result<Self, StorageError> {
        let path = matches
            .name("path")
            .expect("path regex must contain a path group")
            .as_str();

        let path = if !path.starts_with('/') {
            format!("/{path}")
        } else {
            path.to_string()
        };

        Ok(BackendConfig::Local(LocalConfig { path }))
    }

    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Local(_) => None,
        }
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let config = BackendConfig::parse_url(url)?;

        match config {
            BackendConfig::S3(config) => Self::construct_s3(config, options).await,
            BackendConfig::Local(config) => Self::construct_local(config).await,
        }
    }

    /// List the immediate subfolders of the configured root.
    ///
    /// Folders are the common prefixes one level below the root; each gets a
    /// stable id (its full prefix) and a display name (its last component).
    pub async fn list_folders(&self) -> Result<Vec<FolderRef>, StorageError> {
        let start = Instant::now();
        let result = self
            .object_store
            .list_with_delimiter(self.config.key())
            .await;
        self.record_request(StorageOperation::List, start, result.is_ok());
        let listing = result.context(ObjectStoreSnafu)?;

        let mut folders: Vec<FolderRef> = listing
            .common_prefixes
            .iter()
            .filter_map(|prefix| {
                prefix.filename().map(|name| FolderRef {
                    id: prefix.to_string(),
                    name: name.to_string(),
                })
            })
            .collect();

        // Sort by name for consistent ordering across runs
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Listed {} folders under {}", folders.len(), self.canonical_url);

        Ok(folders)
    }

    /// List export files directly inside a folder, filtered by extension.
    pub async fn list_files(
        &self,
        folder: &FolderRef,
        extension: &str,
    ) -> Result<Vec<FileRef>, StorageError> {
        let prefix = Path::from(folder.id.as_str());
        let start = Instant::now();
        let result = self.object_store.list_with_delimiter(Some(&prefix)).await;
        self.record_request(StorageOperation::List, start, result.is_ok());
        let listing = result.context(ObjectStoreSnafu)?;

        let mut files: Vec<FileRef> = listing
            .objects
            .iter()
            .filter(|meta| meta.location.as_ref().ends_with(extension))
            .filter_map(|meta| {
                meta.location.filename().map(|name| FileRef {
                    id: meta.location.to_string(),
                    name: name.to_string(),
                })
            })
            .collect();

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Listed {} {} files in {}", files.len(), extension, folder.name);

        Ok(files)
    }

    /// Download a file's contents as text.
    pub async fn download_text(&self, file: &FileRef) -> Result<String, StorageError> {
        let path = Path::from(file.id.as_str());
        let start = Instant::now();
        let result = self.object_store.get(&path).await;
        self.record_request(StorageOperation::Get, start, result.is_ok());

        let bytes = result
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// The canonical URL this provider was constructed from.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    fn record_request(&self, operation: StorageOperation, start: Instant, ok: bool) {
        let status = if ok {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        };
        emit!(StorageRequest { operation, status });
        emit!(StorageRequestDuration {
            operation,
            duration: start.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_s3_url_parsing() {
        let config = BackendConfig::parse_url("s3://mybucket/registry-exports").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "mybucket");
                assert_eq!(s3.key, Some(Path::from("registry-exports")));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_local_url_parsing() {
        let config = BackendConfig::parse_url("/local/path/to/exports").unwrap();
        match config {
            BackendConfig::Local(local) => {
                assert_eq!(local.path, "/local/path/to/exports");
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = BackendConfig::parse_url("gopher://weird").unwrap_err();
        assert!(matches!(err, StorageError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_list_folders_and_files() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        std::fs::create_dir_all(base.join("2024-Q1")).unwrap();
        std::fs::create_dir_all(base.join("2024-Q2")).unwrap();
        std::fs::write(base.join("2024-Q1/filings.csv"), b"name\nacme").unwrap();
        std::fs::write(base.join("2024-Q1/notes.txt"), b"ignored").unwrap();
        std::fs::write(base.join("2024-Q2/more.csv"), b"name\nother").unwrap();

        let storage =
            StorageProvider::for_url_with_options(base.to_str().unwrap(), HashMap::new())
                .await
                .unwrap();

        let folders = storage.list_folders().await.unwrap();
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].name, "2024-Q1");
        assert_eq!(folders[1].name, "2024-Q2");

        let files = storage.list_files(&folders[0], ".csv").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "filings.csv");

        let content = storage.download_text(&files[0]).await.unwrap();
        assert_eq!(content, "name\nacme");
    }

    /// Folder ids round-trip as listing prefixes: files listed for a folder
    /// come back with ids that download_text resolves directly.
    #[tokio::test]
    async fn test_folder_file_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        std::fs::create_dir_all(base.join("period")).unwrap();
        std::fs::write(base.join("period/data.csv"), b"a,b\n1,2").unwrap();

        let storage =
            StorageProvider::for_url_with_options(base.to_str().unwrap(), HashMap::new())
                .await
                .unwrap();

        let folders = storage.list_folders().await.unwrap();
        let files = storage.list_files(&folders[0], ".csv").await.unwrap();
        let content = storage.download_text(&files[0]).await.unwrap();
        assert_eq!(content, "a,b\n1,2");
    }
}
