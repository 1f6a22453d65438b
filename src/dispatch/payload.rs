//! Per-contact payload construction.
//!
//! Resolves which address goes in the primary slot, normalizes the company
//! display name, and attaches the fixed merge fields.

use regex::Regex;
use std::sync::OnceLock;

use crate::campaign::{ContactPayload, CustomField};
use crate::classify::ClassifiedRow;
use crate::config::DispatchConfig;
use crate::db::NewContact;

use super::queue::PushTask;

/// Legal-entity suffixes stripped from company names, matched
/// case-insensitively as literal patterns.
const LEGAL_SUFFIXES: [&str; 17] = [
    ", LLC",
    " LLC",
    " Limited Liability Company",
    " L.L.C.",
    ", Inc.",
    " Inc",
    ", INC",
    " Inc.",
    ", PLLC",
    " PLLC",
    ", CORP",
    " Ltd.",
    " Liability Co.",
    " INCORPORATED",
    " Corporation",
    " Limited Liability Partnership",
    " P.L.L.C",
];

/// Fixed merge fields attached to every contact.
#[derive(Debug, Clone)]
pub struct PayloadMeta {
    pub lead_source: String,
    pub sponsor: String,
    pub salutation: String,
    pub example_article: String,
}

impl PayloadMeta {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            lead_source: config.lead_source.clone(),
            sponsor: config.sponsor.clone(),
            salutation: config.salutation.clone(),
            example_article: config.example_article.clone(),
        }
    }
}

fn suffix_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        LEGAL_SUFFIXES
            .iter()
            .map(|suffix| {
                Regex::new(&format!("(?i){}", regex::escape(suffix)))
                    .expect("legal suffix patterns are valid literals")
            })
            .collect()
    })
}

/// Strip legal-entity suffixes, title-case the remaining words, and trim
/// trailing punctuation.
pub fn clean_company_name(name: &str) -> String {
    let mut cleaned = name.to_string();
    for pattern in suffix_patterns() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    let title_cased = cleaned
        .split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ");

    title_cased
        .trim_end_matches(|c: char| c == '.' || c == ',' || c.is_whitespace())
        .to_string()
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Resolve the primary/secondary address pair for a classified row.
///
/// Identical addresses collapse to the primary; a secondary known to a
/// store is never sent; a known primary gives its slot to a novel
/// secondary. The both-known case cannot reach here — such rows do not
/// survive classification.
fn resolve_addresses(classified: &ClassifiedRow) -> (String, String) {
    let mut primary = classified.row.business_email_address.clone();
    let mut secondary = classified.row.category_survey_email_address.clone();

    if primary == secondary {
        secondary.clear();
    }

    if classified.secondary_email_exists_in_db {
        secondary.clear();
    }

    if classified.email_exists_in_db && !classified.secondary_email_exists_in_db {
        primary = std::mem::take(&mut secondary);
    }

    (primary, secondary)
}

/// Build the push task for one surviving row.
pub fn build_task(classified: &ClassifiedRow, campaign_id: u64, meta: &PayloadMeta) -> PushTask {
    let (primary, secondary) = resolve_addresses(classified);
    let row = &classified.row;

    let payload = ContactPayload {
        campaign_id,
        email: primary.clone(),
        first_name: "null".to_string(),
        last_name: String::new(),
        company: row.name.clone(),
        city: row.billingcity.clone(),
        state: row.billingstate.clone(),
        country: row.billingcountry.clone(),
        time_zone_id: "US Eastern Standard Time".to_string(),
        title: String::new(),
        notes: String::new(),
        phone: String::new(),
        linked_in_profile: String::new(),
        custom_fields: vec![
            CustomField {
                key: "Secondary Email".to_string(),
                value: secondary.clone(),
            },
            CustomField {
                key: "Dear".to_string(),
                value: meta.salutation.clone(),
            },
            CustomField {
                key: "Example Article".to_string(),
                value: meta.example_article.clone(),
            },
            CustomField {
                key: "Lead source".to_string(),
                value: meta.lead_source.clone(),
            },
            CustomField {
                key: "Mailing address".to_string(),
                value: row.mailing_address.clone(),
            },
            CustomField {
                key: "Shortened Company name".to_string(),
                value: clean_company_name(&row.name),
            },
            CustomField {
                key: "Sponsor".to_string(),
                value: meta.sponsor.clone(),
            },
        ],
    };

    let contact = NewContact {
        name: row.name.clone(),
        business_email: primary,
        mailing_address: row.mailing_address.clone(),
        category_survey_email_address: secondary,
    };

    PushTask { payload, contact }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Row;

    fn classified(business: &str, category: &str, primary_known: bool, secondary_known: bool) -> ClassifiedRow {
        ClassifiedRow {
            row: Row {
                name: "Acme Consulting, LLC.".to_string(),
                billingcity: "Ridgefield".to_string(),
                billingstate: "CT".to_string(),
                billingcountry: "US".to_string(),
                business_email_address: business.to_string(),
                category_survey_email_address: category.to_string(),
                mailing_address: "12 Main St".to_string(),
                ..Default::default()
            },
            email_exists_in_db: primary_known,
            secondary_email_exists_in_db: secondary_known,
        }
    }

    fn meta() -> PayloadMeta {
        PayloadMeta::from_config(&DispatchConfig::default())
    }

    #[test]
    fn test_clean_company_name_strips_suffix() {
        assert_eq!(clean_company_name("Acme Consulting, LLC."), "Acme Consulting");
        assert_eq!(clean_company_name("Widgets Corporation"), "Widgets");
        assert_eq!(clean_company_name("Shoreline Bakery inc"), "Shoreline Bakery");
        assert_eq!(clean_company_name("Nutmeg Tax Services, PLLC"), "Nutmeg Tax Services");
    }

    #[test]
    fn test_clean_company_name_title_cases() {
        assert_eq!(clean_company_name("main street books llc"), "Main Street Books");
    }

    #[test]
    fn test_identical_emails_clear_secondary() {
        let task = build_task(&classified("a@x.com", "a@x.com", false, false), 1, &meta());
        assert_eq!(task.payload.email, "a@x.com");
        assert_eq!(task.payload.custom_field("Secondary Email"), Some(""));
    }

    #[test]
    fn test_known_secondary_cleared() {
        let task = build_task(&classified("a@x.com", "b@x.com", false, true), 1, &meta());
        assert_eq!(task.payload.email, "a@x.com");
        assert_eq!(task.payload.custom_field("Secondary Email"), Some(""));
        assert_eq!(task.contact.category_survey_email_address, "");
    }

    #[test]
    fn test_known_primary_promotes_secondary() {
        let task = build_task(&classified("old@x.com", "new@x.com", true, false), 1, &meta());
        assert_eq!(task.payload.email, "new@x.com");
        assert_eq!(task.payload.custom_field("Secondary Email"), Some(""));
        assert_eq!(task.contact.business_email, "new@x.com");
    }

    #[test]
    fn test_fixed_merge_fields_attached() {
        let task = build_task(&classified("a@x.com", "b@x.com", false, false), 7, &meta());
        assert_eq!(task.payload.campaign_id, 7);
        assert_eq!(task.payload.custom_field("Dear"), Some("Hello"));
        assert_eq!(
            task.payload.custom_field("Sponsor"),
            Some("Fairfield County Bank")
        );
        assert_eq!(
            task.payload.custom_field("Shortened Company name"),
            Some("Acme Consulting")
        );
        assert_eq!(task.payload.custom_field("Mailing address"), Some("12 Main St"));
    }
}
