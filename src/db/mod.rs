//! Relational store access.
//!
//! One shared MySQL pool for the whole process; every operation acquires a
//! connection, runs a single parameterized statement, and releases it. No
//! multi-statement transactions are used anywhere.

use async_trait::async_trait;
use snafu::prelude::*;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

use crate::classify::EmailLookup;
use crate::config::DatabaseConfig;
use crate::dispatch::ContactSink;
use crate::emit;
use crate::error::{ConnectSnafu, DbError, QuerySnafu};
use crate::metrics::events::{LookupRequest, LookupStore, RequestStatus};
use crate::storage::FolderRef;

/// A successfully-dispatched outreach target, persisted after a confirmed
/// push. Never updated or deleted by this system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub name: String,
    pub business_email: String,
    pub mailing_address: String,
    pub category_survey_email_address: String,
}

/// Idempotency checkpoints: folders and files already processed by a
/// previous run are never reprocessed.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn folder_processed(&self, folder: &FolderRef) -> Result<bool, DbError>;
    async fn mark_folder_processed(&self, folder: &FolderRef) -> Result<(), DbError>;
    async fn file_processed(&self, folder_id: &str, file_id: &str) -> Result<bool, DbError>;
    async fn mark_file_processed(&self, folder_id: &str, file_id: &str) -> Result<(), DbError>;
}

/// MySQL-backed store for checkpoints, contacts, and existence lookups.
pub struct ContactStore {
    pool: MySqlPool,
}

impl ContactStore {
    /// Open the shared connection pool.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .context(ConnectSnafu)?;
        Ok(Self { pool })
    }

    /// Build a store around an existing pool.
    pub fn with_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn count_matches(&self, sql: &str, params: [&str; 2]) -> Result<bool, DbError> {
        let count: i64 = sqlx::query_scalar(sql)
            .bind(params[0])
            .bind(params[1])
            .fetch_one(&self.pool)
            .await
            .context(QuerySnafu)?;
        Ok(count > 0)
    }
}

#[async_trait]
impl CheckpointStore for ContactStore {
    async fn folder_processed(&self, folder: &FolderRef) -> Result<bool, DbError> {
        self.count_matches(
            "SELECT COUNT(*) FROM main_folders WHERE folder_id = ? AND folder_name = ?",
            [folder.id.as_str(), folder.name.as_str()],
        )
        .await
    }

    async fn mark_folder_processed(&self, folder: &FolderRef) -> Result<(), DbError> {
        sqlx::query("INSERT INTO main_folders (folder_id, folder_name) VALUES (?, ?)")
            .bind(&folder.id)
            .bind(&folder.name)
            .execute(&self.pool)
            .await
            .context(QuerySnafu)?;
        Ok(())
    }

    async fn file_processed(&self, folder_id: &str, file_id: &str) -> Result<bool, DbError> {
        self.count_matches(
            "SELECT COUNT(*) FROM processed_files WHERE folder_id = ? AND file_id = ?",
            [folder_id, file_id],
        )
        .await
    }

    async fn mark_file_processed(&self, folder_id: &str, file_id: &str) -> Result<(), DbError> {
        sqlx::query("INSERT INTO processed_files (folder_id, file_id) VALUES (?, ?)")
            .bind(folder_id)
            .bind(file_id)
            .execute(&self.pool)
            .await
            .context(QuerySnafu)?;
        Ok(())
    }
}

#[async_trait]
impl EmailLookup for ContactStore {
    async fn primary_contact_exists(&self, email: &str) -> Result<bool, DbError> {
        let result = self
            .count_matches(
                "SELECT COUNT(*) FROM primary_contacts WHERE email = ? OR secondary_email = ?",
                [email, email],
            )
            .await;
        emit!(LookupRequest {
            store: LookupStore::Primary,
            status: RequestStatus::from_result(&result),
        });
        result
    }

    async fn registry_contact_exists(&self, email: &str) -> Result<bool, DbError> {
        let result = self
            .count_matches(
                "SELECT COUNT(*) FROM registry_contacts \
                 WHERE business_email = ? OR category_survey_email_address = ?",
                [email, email],
            )
            .await;
        emit!(LookupRequest {
            store: LookupStore::Registry,
            status: RequestStatus::from_result(&result),
        });
        result
    }
}

#[async_trait]
impl ContactSink for ContactStore {
    async fn record_contact(&self, contact: &NewContact) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO contacts \
             (name, business_email, mailing_address, category_survey_email_address) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&contact.name)
        .bind(&contact.business_email)
        .bind(&contact.mailing_address)
        .bind(&contact.category_survey_email_address)
        .execute(&self.pool)
        .await
        .context(QuerySnafu)?;
        Ok(())
    }
}
