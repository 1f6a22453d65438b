//! Row filtering for raw registry exports.
//!
//! Restricts rows to the allowed geography and prunes columns down to the
//! retained set. Pure: no I/O beyond parsing the payload; the caller decides
//! whether to persist the result.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::config::FilterConfig;
use crate::error::{CsvFlushSnafu, CsvParseSnafu, CsvWriteSnafu, FilterError};

/// Column whose value decides row survival.
pub const KEY_COLUMN: &str = "billingcity";

/// One business-registry record, pruned to the retained columns.
///
/// Columns outside the retained set never survive filtering; retained
/// columns missing from the source come through as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub business_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub billingstreet: String,
    #[serde(default)]
    pub billingcity: String,
    #[serde(default)]
    pub billingcountry: String,
    #[serde(default)]
    pub billingpostalcode: String,
    #[serde(default)]
    pub billingstate: String,
    #[serde(default)]
    pub business_email_address: String,
    #[serde(default)]
    pub mailing_address: String,
    #[serde(default)]
    pub woman_owned_organization: String,
    #[serde(default)]
    pub category_survey_email_address: String,
}

impl Row {
    /// Look up a column value by name. Unknown columns yield `None`.
    pub fn get(&self, column: &str) -> Option<&str> {
        let value = match column {
            "name" => &self.name,
            "business_type" => &self.business_type,
            "status" => &self.status,
            "billingstreet" => &self.billingstreet,
            "billingcity" => &self.billingcity,
            "billingcountry" => &self.billingcountry,
            "billingpostalcode" => &self.billingpostalcode,
            "billingstate" => &self.billingstate,
            "business_email_address" => &self.business_email_address,
            "mailing_address" => &self.mailing_address,
            "woman_owned_organization" => &self.woman_owned_organization,
            "category_survey_email_address" => &self.category_survey_email_address,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn set(&mut self, column: &str, value: String) {
        match column {
            "name" => self.name = value,
            "business_type" => self.business_type = value,
            "status" => self.status = value,
            "billingstreet" => self.billingstreet = value,
            "billingcity" => self.billingcity = value,
            "billingcountry" => self.billingcountry = value,
            "billingpostalcode" => self.billingpostalcode = value,
            "billingstate" => self.billingstate = value,
            "business_email_address" => self.business_email_address = value,
            "mailing_address" => self.mailing_address = value,
            "woman_owned_organization" => self.woman_owned_organization = value,
            "category_survey_email_address" => self.category_survey_email_address = value,
            _ => {}
        }
    }

    /// Build a row from a raw column map, copying only the retained columns.
    fn project(raw: &HashMap<String, String>, columns: &[String]) -> Self {
        let mut row = Row::default();
        for column in columns {
            if let Some(value) = raw.get(column) {
                row.set(column, value.clone());
            }
        }
        row
    }
}

/// Filter raw CSV text down to retained columns and allowed cities.
///
/// Rows whose key column is missing or outside the allowed set (compared
/// case-insensitively) are dropped. Deterministic; preserves input order.
pub fn filter_rows(
    csv_text: &str,
    config: &FilterConfig,
    source_name: &str,
) -> Result<Vec<Row>, FilterError> {
    let allowed: HashSet<String> = config
        .allowed_cities
        .iter()
        .map(|city| city.to_lowercase())
        .collect();

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers = reader
        .headers()
        .context(CsvParseSnafu { name: source_name })?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context(CsvParseSnafu { name: source_name })?;

        let raw: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();

        let Some(city) = raw.get(KEY_COLUMN) else {
            continue;
        };
        if !allowed.contains(&city.to_lowercase()) {
            continue;
        }

        rows.push(Row::project(&raw, &config.columns));
    }

    Ok(rows)
}

/// Serialize filtered rows back to CSV with the retained columns as header.
///
/// Used for the optional local staging copy and by callers that want the
/// filtered payload in its original shape.
pub fn rows_to_csv(rows: &[Row], columns: &[String]) -> Result<String, FilterError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(columns).context(CsvWriteSnafu)?;
    for row in rows {
        let record: Vec<&str> = columns
            .iter()
            .map(|column| row.get(column).unwrap_or(""))
            .collect();
        writer.write_record(&record).context(CsvWriteSnafu)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context(CsvFlushSnafu)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FilterConfig {
        FilterConfig::default()
    }

    const SAMPLE: &str = "\
name,business_type,status,billingcity,billingstate,business_email_address,category_survey_email_address,mailing_address,internal_score
Acme Consulting LLC,LLC,Active,Ridgefield,CT,info@acme.example,survey@acme.example,12 Main St,99
Far Away Corp,Corp,Active,Hartford,CT,info@faraway.example,,1 Elm St,12
Lowercase City Co,LLC,Active,stamford,CT,hello@lower.example,,2 Oak St,5
";

    #[test]
    fn test_filters_by_city_case_insensitive() {
        let rows = filter_rows(SAMPLE, &config(), "sample.csv").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Acme Consulting LLC");
        assert_eq!(rows[1].billingcity, "stamford");
    }

    #[test]
    fn test_prunes_unretained_columns() {
        let rows = filter_rows(SAMPLE, &config(), "sample.csv").unwrap();
        // internal_score is not a retained column and has no slot on Row
        assert!(rows[0].get("internal_score").is_none());
        assert_eq!(rows[0].get("billingstate"), Some("CT"));
    }

    #[test]
    fn test_rows_missing_key_column_excluded() {
        let csv_text = "name,status\nNo City Co,Active\n";
        let rows = filter_rows(csv_text, &config(), "sample.csv").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_retained_column_missing_is_empty() {
        let csv_text = "name,billingcity\nAcme,Ridgefield\n";
        let rows = filter_rows(csv_text, &config(), "sample.csv").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].business_email_address, "");
    }

    /// Re-applying the filter to its own output yields the same output.
    #[test]
    fn test_filter_idempotence() {
        let cfg = config();
        let first = filter_rows(SAMPLE, &cfg, "sample.csv").unwrap();
        let serialized = rows_to_csv(&first, &cfg.columns).unwrap();
        let second = filter_rows(&serialized, &cfg, "sample.csv").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input() {
        let rows = filter_rows("", &config(), "empty.csv").unwrap();
        assert!(rows.is_empty());
    }
}
