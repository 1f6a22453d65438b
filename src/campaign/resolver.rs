//! Find-or-create campaign resolution.
//!
//! Memoizes name→id per run so at most one create call happens per distinct
//! campaign name, no matter how many files map to it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::CampaignConfig;
use crate::error::ApiError;

use super::client::CampaignClient;
use super::types::{Campaign, CampaignDefinition};

/// The campaign-service operations the resolver needs.
#[async_trait]
pub trait CampaignDirectory: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Campaign>, ApiError>;
    async fn create(&self, definition: &CampaignDefinition) -> Result<u64, ApiError>;
}

#[async_trait]
impl CampaignDirectory for CampaignClient {
    async fn find_by_name(&self, name: &str) -> Result<Option<Campaign>, ApiError> {
        self.find_campaign_by_name(name).await
    }

    async fn create(&self, definition: &CampaignDefinition) -> Result<u64, ApiError> {
        self.create_campaign(definition).await
    }
}

/// Per-run campaign resolver.
pub struct CampaignResolver {
    directory: Arc<dyn CampaignDirectory>,
    email_account: String,
    template_ids: Vec<u64>,
    resolved: HashMap<String, u64>,
}

impl CampaignResolver {
    pub fn new(directory: Arc<dyn CampaignDirectory>, config: &CampaignConfig) -> Self {
        Self {
            directory,
            email_account: config.email_account.clone(),
            template_ids: config.template_ids.clone(),
            resolved: HashMap::new(),
        }
    }

    /// Resolve a campaign name to its id, creating the campaign if absent.
    ///
    /// A create failure is fatal for the caller's current unit of work; no
    /// retry happens here.
    pub async fn resolve(&mut self, name: &str) -> Result<u64, ApiError> {
        if let Some(id) = self.resolved.get(name) {
            return Ok(*id);
        }

        let id = match self.directory.find_by_name(name).await? {
            Some(campaign) => {
                info!("Campaign already exists: {} (id {})", name, campaign.id);
                campaign.id
            }
            None => {
                info!("Creating new campaign: {}", name);
                let definition =
                    CampaignDefinition::sequenced(name, &self.email_account, &self.template_ids);
                let id = self.directory.create(&definition).await?;
                info!("Campaign {} created with id {}", name, id);
                id
            }
        };

        self.resolved.insert(name.to_string(), id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDirectory {
        existing: HashMap<String, u64>,
        find_calls: AtomicUsize,
        create_calls: AtomicUsize,
    }

    impl FakeDirectory {
        fn new(existing: &[(&str, u64)]) -> Self {
            Self {
                existing: existing
                    .iter()
                    .map(|(name, id)| (name.to_string(), *id))
                    .collect(),
                find_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CampaignDirectory for FakeDirectory {
        async fn find_by_name(&self, name: &str) -> Result<Option<Campaign>, ApiError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.existing.get(name).map(|id| Campaign {
                id: *id,
                name: name.to_string(),
            }))
        }

        async fn create(&self, definition: &CampaignDefinition) -> Result<u64, ApiError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(definition.steps.len(), 2);
            Ok(99)
        }
    }

    fn config() -> CampaignConfig {
        CampaignConfig {
            api_key: "k".to_string(),
            email_account: "outreach@example.com".to_string(),
            base_url: "http://localhost".to_string(),
            template_ids: vec![1, 2],
        }
    }

    #[tokio::test]
    async fn test_existing_campaign_not_recreated() {
        let directory = Arc::new(FakeDirectory::new(&[("2024-Q1_filings.csv", 42)]));
        let mut resolver = CampaignResolver::new(directory.clone(), &config());

        let id = resolver.resolve("2024-Q1_filings.csv").await.unwrap();
        assert_eq!(id, 42);
        assert_eq!(directory.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_campaign_created_once() {
        let directory = Arc::new(FakeDirectory::new(&[]));
        let mut resolver = CampaignResolver::new(directory.clone(), &config());

        let first = resolver.resolve("new-campaign").await.unwrap();
        let second = resolver.resolve("new-campaign").await.unwrap();

        assert_eq!(first, 99);
        assert_eq!(second, 99);
        assert_eq!(directory.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(directory.find_calls.load(Ordering::SeqCst), 1);
    }
}
