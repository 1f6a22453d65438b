//! HTTP client for the campaign service.
//!
//! All status/body classification happens here, once, so the rest of the
//! pipeline branches on typed `ApiError` variants instead of prose.

use snafu::prelude::*;
use std::time::Instant;

use crate::config::CampaignConfig;
use crate::emit;
use crate::error::{ApiError, DecodeSnafu, TransportSnafu};
use crate::metrics::events::{ApiOperation, ApiRequest, ApiRequestDuration, RequestStatus};

use super::types::{Campaign, CampaignDefinition, ContactPayload};

/// Header carrying the static API key.
const API_KEY_HEADER: &str = "X-Api-Key";

/// The service reports the terminal enrollment conflict with this phrase in
/// the response body; it is matched here and nowhere else.
const ALREADY_IN_SEQUENCE: &str = "already in this sequence";

/// Client for the campaign service's REST surface.
pub struct CampaignClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CampaignClient {
    /// Build a client from campaign configuration.
    pub fn new(config: &CampaignConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .build()
            .context(TransportSnafu)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Exact-name campaign lookup.
    ///
    /// The service's "campaign not found" outcome maps to `Ok(None)`; every
    /// other failure surfaces as an error.
    pub async fn find_campaign_by_name(&self, name: &str) -> Result<Option<Campaign>, ApiError> {
        let url = format!("{}/v1/campaigns", self.base_url);
        let start = Instant::now();
        let response = self
            .http
            .get(&url)
            .query(&[("name", name)])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await;
        self.record_request(ApiOperation::FindCampaign, start, &response);
        let response = response.context(TransportSnafu)?;

        if response.status().is_success() {
            let campaign = response.json::<Campaign>().await.context(DecodeSnafu)?;
            return Ok(Some(campaign));
        }

        let status = response.status();
        let error = Self::classify_response(status, read_body(response).await);
        if error.is_not_found() {
            Ok(None)
        } else {
            Err(error)
        }
    }

    /// Submit a campaign definition; returns the new campaign id.
    pub async fn create_campaign(
        &self,
        definition: &CampaignDefinition,
    ) -> Result<u64, ApiError> {
        let url = format!("{}/v2/campaigns", self.base_url);
        let start = Instant::now();
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(definition)
            .send()
            .await;
        self.record_request(ApiOperation::CreateCampaign, start, &response);
        let response = response.context(TransportSnafu)?;

        if response.status().is_success() {
            let campaign = response.json::<Campaign>().await.context(DecodeSnafu)?;
            return Ok(campaign.id);
        }

        let status = response.status();
        Err(Self::classify_response(status, read_body(response).await))
    }

    /// Create a contact and push it to its campaign in one call.
    pub async fn push_contact(&self, payload: &ContactPayload) -> Result<(), ApiError> {
        let url = format!("{}/v1/actions/addandpushtocampaign", self.base_url);
        let start = Instant::now();
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(payload)
            .send()
            .await;
        self.record_request(ApiOperation::PushContact, start, &response);
        let response = response.context(TransportSnafu)?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        Err(Self::classify_response(status, read_body(response).await))
    }

    /// Map a non-success response to the typed error taxonomy.
    ///
    /// The enrollment conflict is detected first so it never degrades into a
    /// retryable bad-input error.
    pub(crate) fn classify_response(status: reqwest::StatusCode, body: String) -> ApiError {
        if body.contains(ALREADY_IN_SEQUENCE) {
            return ApiError::AlreadyEnrolled { message: body };
        }

        match status.as_u16() {
            400 => ApiError::BadRequest { message: body },
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound { message: body },
            status @ 500..=599 => ApiError::Server {
                status,
                message: body,
            },
            status => ApiError::Unexpected {
                status,
                message: body,
            },
        }
    }

    fn record_request<T>(
        &self,
        operation: ApiOperation,
        start: Instant,
        result: &Result<T, reqwest::Error>,
    ) {
        let status = if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        };
        emit!(ApiRequest { operation, status });
        emit!(ApiRequestDuration {
            operation,
            duration: start.elapsed(),
        });
    }
}

async fn read_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}

#[async_trait::async_trait]
impl crate::dispatch::ContactPusher for CampaignClient {
    async fn push(&self, payload: &ContactPayload) -> Result<(), ApiError> {
        self.push_contact(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_classify_bad_request() {
        let error =
            CampaignClient::classify_response(StatusCode::BAD_REQUEST, "bad email".to_string());
        assert!(matches!(error, ApiError::BadRequest { .. }));
        assert!(error.is_retryable());
    }

    #[test]
    fn test_classify_unauthorized() {
        let error = CampaignClient::classify_response(StatusCode::UNAUTHORIZED, String::new());
        assert!(matches!(error, ApiError::Unauthorized));
    }

    #[test]
    fn test_classify_not_found() {
        let error = CampaignClient::classify_response(
            StatusCode::NOT_FOUND,
            "Campaign not found".to_string(),
        );
        assert!(error.is_not_found());
    }

    #[test]
    fn test_classify_server_error() {
        let error = CampaignClient::classify_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "oops".to_string(),
        );
        assert!(matches!(error, ApiError::Server { status: 500, .. }));
    }

    /// The enrollment conflict is terminal even though it arrives as a 400.
    #[test]
    fn test_classify_already_enrolled() {
        let body = r#"{"message":"Contact is already in this sequence"}"#.to_string();
        let error = CampaignClient::classify_response(StatusCode::BAD_REQUEST, body);
        assert!(matches!(error, ApiError::AlreadyEnrolled { .. }));
        assert!(!error.is_retryable());
    }
}
