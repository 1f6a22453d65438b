//! Campaign service integration.
//!
//! A thin REST client over the campaign service plus the find-or-create
//! resolver the orchestrator uses once per file.

mod client;
mod resolver;
mod types;

pub use client::CampaignClient;
pub use resolver::{CampaignDirectory, CampaignResolver};
pub use types::{
    Campaign, CampaignDefinition, CampaignSettings, CampaignStep, ContactPayload, CustomField,
    StepTemplate,
};
