//! Wire types for the campaign service.
//!
//! Field names follow the service's JSON surface exactly, including its
//! mixed-case legacy fields, so the payloads round-trip byte-for-byte with
//! what the service expects.

use serde::{Deserialize, Serialize};

/// Delay before each sequence step fires.
const STEP_DELAY_MINUTES: &str = "25";

/// CC merge field applied to every step template.
const CC_SECONDARY_EMAIL: &str = "{{Secondary_Email}}";

/// An existing campaign as returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct Campaign {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// A campaign creation request: schedule settings plus the step sequence.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignDefinition {
    pub name: String,
    #[serde(rename = "emailAccount")]
    pub email_account: String,
    pub settings: CampaignSettings,
    pub steps: Vec<CampaignStep>,
}

/// Fixed send-rate caps and reply handling for created campaigns.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignSettings {
    #[serde(rename = "emailsCountPerDay")]
    pub emails_count_per_day: u32,
    #[serde(rename = "daysToFinishProspect")]
    pub days_to_finish_prospect: u32,
    #[serde(rename = "EmailSendingDelaySeconds")]
    pub email_sending_delay_seconds: u32,
    #[serde(rename = "DailyThrottling")]
    pub daily_throttling: u32,
    #[serde(rename = "disableOpensTracking")]
    pub disable_opens_tracking: bool,
    #[serde(rename = "RepliesHandlingType")]
    pub replies_handling_type: String,
    #[serde(rename = "enableLinksTracking")]
    pub enable_links_tracking: bool,
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            emails_count_per_day: 500,
            days_to_finish_prospect: 7,
            email_sending_delay_seconds: 60,
            daily_throttling: 300,
            disable_opens_tracking: false,
            replies_handling_type: "Mark person as finished".to_string(),
            enable_links_tracking: true,
        }
    }
}

/// One step of the outreach sequence.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignStep {
    pub number: String,
    #[serde(rename = "InMinutesCount")]
    pub in_minutes_count: String,
    pub templates: Vec<StepTemplate>,
}

/// Email template reference inside a step.
#[derive(Debug, Clone, Serialize)]
pub struct StepTemplate {
    #[serde(rename = "emailTemplateId")]
    pub email_template_id: u64,
    #[serde(rename = "CcList")]
    pub cc_list: String,
}

impl CampaignDefinition {
    /// Build the standard multi-step sequence: one step per template id,
    /// fixed per-step delay, default send-rate caps.
    pub fn sequenced(name: &str, email_account: &str, template_ids: &[u64]) -> Self {
        let steps = template_ids
            .iter()
            .enumerate()
            .map(|(index, template_id)| CampaignStep {
                number: (index + 1).to_string(),
                in_minutes_count: STEP_DELAY_MINUTES.to_string(),
                templates: vec![StepTemplate {
                    email_template_id: *template_id,
                    cc_list: CC_SECONDARY_EMAIL.to_string(),
                }],
            })
            .collect();

        Self {
            name: name.to_string(),
            email_account: email_account.to_string(),
            settings: CampaignSettings::default(),
            steps,
        }
    }
}

/// A contact payload for push-and-create.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPayload {
    pub campaign_id: u64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub time_zone_id: String,
    pub title: String,
    pub notes: String,
    pub phone: String,
    pub linked_in_profile: String,
    pub custom_fields: Vec<CustomField>,
}

/// A key/value merge field attached to a contact.
#[derive(Debug, Clone, Serialize)]
pub struct CustomField {
    pub key: String,
    pub value: String,
}

impl ContactPayload {
    /// Look up a custom field value by key.
    pub fn custom_field(&self, key: &str) -> Option<&str> {
        self.custom_fields
            .iter()
            .find(|field| field.key == key)
            .map(|field| field.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequenced_definition_shape() {
        let definition =
            CampaignDefinition::sequenced("2024-Q1_filings.csv", "outreach@example.com", &[
                10, 20, 30,
            ]);

        assert_eq!(definition.steps.len(), 3);
        assert_eq!(definition.steps[0].number, "1");
        assert_eq!(definition.steps[2].number, "3");
        assert_eq!(definition.steps[1].in_minutes_count, "25");
        assert_eq!(definition.steps[1].templates[0].email_template_id, 20);
        assert_eq!(definition.settings.emails_count_per_day, 500);
    }

    #[test]
    fn test_definition_wire_field_names() {
        let definition = CampaignDefinition::sequenced("c", "a@b.com", &[1]);
        let json = serde_json::to_value(&definition).unwrap();

        assert_eq!(json["emailAccount"], "a@b.com");
        assert_eq!(json["settings"]["emailsCountPerDay"], 500);
        assert_eq!(json["settings"]["EmailSendingDelaySeconds"], 60);
        assert_eq!(json["settings"]["DailyThrottling"], 300);
        assert_eq!(json["settings"]["RepliesHandlingType"], "Mark person as finished");
        assert_eq!(json["steps"][0]["InMinutesCount"], "25");
        assert_eq!(json["steps"][0]["templates"][0]["emailTemplateId"], 1);
        assert_eq!(json["steps"][0]["templates"][0]["CcList"], "{{Secondary_Email}}");
    }

    #[test]
    fn test_contact_payload_wire_field_names() {
        let payload = ContactPayload {
            campaign_id: 7,
            email: "x@y.com".to_string(),
            first_name: "null".to_string(),
            last_name: String::new(),
            company: "Acme".to_string(),
            city: "Ridgefield".to_string(),
            state: "CT".to_string(),
            country: "US".to_string(),
            time_zone_id: "US Eastern Standard Time".to_string(),
            title: String::new(),
            notes: String::new(),
            phone: String::new(),
            linked_in_profile: String::new(),
            custom_fields: vec![CustomField {
                key: "Sponsor".to_string(),
                value: "Fairfield County Bank".to_string(),
            }],
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["campaignId"], 7);
        assert_eq!(json["timeZoneId"], "US Eastern Standard Time");
        assert_eq!(json["linkedInProfile"], "");
        assert_eq!(json["customFields"][0]["key"], "Sponsor");
    }
}
