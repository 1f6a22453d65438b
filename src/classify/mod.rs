//! Duplicate classification for filtered rows.
//!
//! Decides, per row, whether it is a new outreach target and which address
//! to contact. Existence lookups fan out over a bounded pool; a row's
//! survival decision waits for all of its lookups, but different rows run
//! concurrently and complete out of order.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use crate::config::ClassifyConfig;
use crate::emit;
use crate::error::DbError;
use crate::filter::Row;
use crate::metrics::events::RowClassified;

/// Progress is logged every this many classified rows.
const PROGRESS_INTERVAL: usize = 50;

/// Existence lookups against the two backing contact stores.
///
/// The primary store matches on its primary-or-secondary email columns, the
/// registry store on its business-or-category email columns.
#[async_trait]
pub trait EmailLookup: Send + Sync {
    async fn primary_contact_exists(&self, email: &str) -> Result<bool, DbError>;
    async fn registry_contact_exists(&self, email: &str) -> Result<bool, DbError>;
}

/// A row annotated with the existence flags that drive dispatch.
///
/// Blocklisted addresses are cleared on the carried row and stay cleared for
/// the remainder of processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRow {
    pub row: Row,
    pub email_exists_in_db: bool,
    pub secondary_email_exists_in_db: bool,
}

/// Classify filtered rows, keeping those with at least one novel address.
///
/// Lookups run with bounded concurrency (`config.concurrency` rows in
/// flight). Any lookup failure aborts the whole batch; there is no per-row
/// retry. Output order is not related to input order.
pub async fn classify_rows<L>(
    rows: Vec<Row>,
    lookup: &L,
    config: &ClassifyConfig,
) -> Result<Vec<ClassifiedRow>, DbError>
where
    L: EmailLookup + ?Sized,
{
    let total = rows.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let completed = AtomicUsize::new(0);
    let width = config.concurrency.max(1);

    let mut in_flight = stream::iter(
        rows.into_iter()
            .map(|row| classify_row(row, lookup, &config.blocklist, &completed, total)),
    )
    .buffer_unordered(width);

    let mut survivors = Vec::new();
    while let Some(result) = in_flight.next().await {
        if let Some(classified) = result? {
            survivors.push(classified);
        }
    }

    info!(
        "Classification done: 100% ({} of {} rows survived)",
        survivors.len(),
        total
    );
    Ok(survivors)
}

/// Classify a single row: scrub blocklisted addresses, join the existence
/// lookups for both addresses, then apply the survival rule.
async fn classify_row<L>(
    mut row: Row,
    lookup: &L,
    blocklist: &[String],
    completed: &AtomicUsize,
    total: usize,
) -> Result<Option<ClassifiedRow>, DbError>
where
    L: EmailLookup + ?Sized,
{
    let business = scrub_address(&row.business_email_address, blocklist);
    let category = scrub_address(&row.category_survey_email_address, blocklist);

    let (email_exists_in_db, secondary_email_exists_in_db) = tokio::try_join!(
        address_exists(lookup, &business),
        address_exists(lookup, &category),
    )?;

    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
    if done % PROGRESS_INTERVAL == 0 {
        let percent = (done as f64 / total as f64) * 100.0;
        info!("Classifying... {:.2}%", percent);
    }

    let survived = !(email_exists_in_db && secondary_email_exists_in_db);
    emit!(RowClassified { survived });

    if !survived {
        return Ok(None);
    }

    row.business_email_address = business;
    row.category_survey_email_address = category;

    Ok(Some(ClassifiedRow {
        row,
        email_exists_in_db,
        secondary_email_exists_in_db,
    }))
}

/// An address containing any blocklisted substring is treated as empty.
fn scrub_address(address: &str, blocklist: &[String]) -> String {
    if address.is_empty() || blocklist.iter().any(|entry| address.contains(entry.as_str())) {
        String::new()
    } else {
        address.to_string()
    }
}

/// True if the address is known to either backing store.
///
/// An empty address is vacuously "exists = true" so that a missing field
/// never keeps a row alive on its own.
async fn address_exists<L>(lookup: &L, email: &str) -> Result<bool, DbError>
where
    L: EmailLookup + ?Sized,
{
    if email.is_empty() {
        return Ok(true);
    }

    let (in_primary, in_registry) = tokio::try_join!(
        lookup.primary_contact_exists(email),
        lookup.registry_contact_exists(email),
    )?;
    Ok(in_primary || in_registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory lookup over two known-address sets, counting queries.
    #[derive(Default)]
    struct FakeLookup {
        primary: HashSet<String>,
        registry: HashSet<String>,
        queried: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FakeLookup {
        fn with_primary(addresses: &[&str]) -> Self {
            Self {
                primary: addresses.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl EmailLookup for FakeLookup {
        async fn primary_contact_exists(&self, email: &str) -> Result<bool, DbError> {
            if self.fail {
                return Err(DbError::Connect {
                    source: sqlx::Error::PoolClosed,
                });
            }
            self.queried.lock().unwrap().push(email.to_string());
            Ok(self.primary.contains(email))
        }

        async fn registry_contact_exists(&self, email: &str) -> Result<bool, DbError> {
            if self.fail {
                return Err(DbError::Connect {
                    source: sqlx::Error::PoolClosed,
                });
            }
            self.queried.lock().unwrap().push(email.to_string());
            Ok(self.registry.contains(email))
        }
    }

    fn row(business: &str, category: &str) -> Row {
        Row {
            name: "Acme".to_string(),
            business_email_address: business.to_string(),
            category_survey_email_address: category.to_string(),
            ..Default::default()
        }
    }

    fn config() -> ClassifyConfig {
        ClassifyConfig::default()
    }

    #[tokio::test]
    async fn test_novel_addresses_survive() {
        let lookup = FakeLookup::default();
        let rows = vec![row("new@example.com", "also-new@example.com")];

        let classified = classify_rows(rows, &lookup, &config()).await.unwrap();
        assert_eq!(classified.len(), 1);
        assert!(!classified[0].email_exists_in_db);
        assert!(!classified[0].secondary_email_exists_in_db);
    }

    #[tokio::test]
    async fn test_both_known_addresses_excluded() {
        let mut lookup = FakeLookup::with_primary(&["known@example.com"]);
        lookup.registry.insert("survey@example.com".to_string());
        let rows = vec![row("known@example.com", "survey@example.com")];

        let classified = classify_rows(rows, &lookup, &config()).await.unwrap();
        assert!(classified.is_empty());
    }

    /// Empty addresses are vacuously "exists" and never hit the store.
    #[tokio::test]
    async fn test_empty_address_vacuous_truth() {
        let lookup = FakeLookup::default();
        let rows = vec![row("new@example.com", "")];

        let classified = classify_rows(rows, &lookup, &config()).await.unwrap();
        assert_eq!(classified.len(), 1);
        assert!(!classified[0].email_exists_in_db);
        assert!(classified[0].secondary_email_exists_in_db);

        let queried = lookup.queried.lock().unwrap();
        assert!(queried.iter().all(|email| email == "new@example.com"));
    }

    #[tokio::test]
    async fn test_both_addresses_empty_excluded() {
        let lookup = FakeLookup::default();
        let rows = vec![row("", "")];

        let classified = classify_rows(rows, &lookup, &config()).await.unwrap();
        assert!(classified.is_empty());
        assert!(lookup.queried.lock().unwrap().is_empty());
    }

    /// Blocklisted addresses are treated as empty before lookups and stay
    /// cleared on the surviving row.
    #[tokio::test]
    async fn test_blocklisted_address_cleared() {
        let lookup = FakeLookup::default();
        let rows = vec![row("owner@zenbusiness.com", "real@example.com")];

        let classified = classify_rows(rows, &lookup, &config()).await.unwrap();
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].row.business_email_address, "");
        assert!(classified[0].email_exists_in_db);
        assert_eq!(
            classified[0].row.category_survey_email_address,
            "real@example.com"
        );
    }

    #[tokio::test]
    async fn test_gov_suffix_blocklisted() {
        let lookup = FakeLookup::default();
        let rows = vec![row("clerk@sots.ct.gov", "real@example.com")];

        let classified = classify_rows(rows, &lookup, &config()).await.unwrap();
        assert_eq!(classified[0].row.business_email_address, "");
    }

    #[tokio::test]
    async fn test_lookup_failure_aborts_batch() {
        let lookup = FakeLookup {
            fail: true,
            ..Default::default()
        };
        let rows = vec![
            row("a@example.com", ""),
            row("b@example.com", ""),
            row("c@example.com", ""),
        ];

        let result = classify_rows(rows, &lookup, &config()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_known_primary_novel_secondary_survives() {
        let lookup = FakeLookup::with_primary(&["known@example.com"]);
        let rows = vec![row("known@example.com", "novel@example.com")];

        let classified = classify_rows(rows, &lookup, &config()).await.unwrap();
        assert_eq!(classified.len(), 1);
        assert!(classified[0].email_exists_in_db);
        assert!(!classified[0].secondary_email_exists_in_db);
    }
}
