/// Client and wire types for the Simpler Grants.gov opportunity search API.
///
/// This is the primary, credentialed upstream. Response items are kept as raw JSON
/// values in `OpportunitySearchResponse::data` so a single malformed entry can be
/// rejected without failing the whole page; callers decode each one with
/// [`Opportunity::from_value`].
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::UpstreamError;
use crate::http::{build_client, parse_json_response};
use crate::wire::opt_string_or_number;

pub const DEFAULT_BASE_URL: &str = "https://api.simpler.grants.gov/v1";
pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const API_KEY_ENV: &str = "GRANTS_GOV_API_KEY";

#[derive(Clone, Debug)]
pub struct SimplerGrantsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_error_body_bytes: usize,
}

impl SimplerGrantsConfig {
    pub fn new(base_url: &str, api_key: Option<String>, max_error_body_bytes: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            max_error_body_bytes,
        }
    }
}

#[derive(Clone)]
pub struct SimplerGrantsClient {
    config: SimplerGrantsConfig,
    http: reqwest::Client,
}

impl SimplerGrantsClient {
    pub fn new(config: SimplerGrantsConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            config,
            http: build_client()?,
        })
    }

    pub fn config(&self) -> &SimplerGrantsConfig {
        &self.config
    }

    pub fn has_credential(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// `POST {base}/opportunities/search`. Fails with `MissingCredential` before any I/O
    /// when no API key is configured.
    pub async fn search_opportunities(
        &self,
        request: &OpportunitySearchRequest,
    ) -> Result<OpportunitySearchResponse, UpstreamError> {
        let resp = self.send(request).await?;
        let parsed: OpportunitySearchResponse =
            parse_json_response(resp, self.config.max_error_body_bytes).await?;
        debug!(
            items = parsed.data.len(),
            total_records = parsed.total_records(),
            "simpler grants search answered"
        );
        Ok(parsed)
    }

    /// Same call as [`search_opportunities`](Self::search_opportunities) but returns the
    /// status and raw JSON body whatever the status is. Used for diagnostics.
    pub async fn search_raw(
        &self,
        request: &OpportunitySearchRequest,
    ) -> Result<(StatusCode, serde_json::Value), UpstreamError> {
        let resp = self.send(request).await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        let body = serde_json::from_slice(&bytes)?;
        Ok((status, body))
    }

    async fn send(
        &self,
        request: &OpportunitySearchRequest,
    ) -> Result<reqwest::Response, UpstreamError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential(API_KEY_ENV))?;
        let url = format!("{}/opportunities/search", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await?;
        Ok(resp)
    }
}

// ---- request ----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunitySearchRequest {
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<OpportunityFilters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub page_size: u32,
    pub page_offset: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort_order: Vec<SortOrder>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortOrder {
    pub order_by: String,
    pub sort_direction: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpportunityFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opportunity_status: Option<OneOf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agency: Option<OneOf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneOf {
    pub one_of: Vec<String>,
}

impl OneOf {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            one_of: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl OpportunitySearchRequest {
    /// Unsorted, unfiltered page. Used by the facet and diagnostics routes.
    pub fn page(page_size: u32, page_offset: u32) -> Self {
        Self {
            pagination: Pagination {
                page_size,
                page_offset,
                sort_order: Vec::new(),
            },
            filters: None,
            query: None,
        }
    }
}

// ---- response ----

#[derive(Debug, Clone, Deserialize)]
pub struct OpportunitySearchResponse {
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(default)]
    pub pagination_info: Option<PaginationInfo>,
}

impl OpportunitySearchResponse {
    pub fn total_records(&self) -> u64 {
        self.pagination_info
            .as_ref()
            .and_then(|p| p.total_records)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationInfo {
    pub total_records: Option<u64>,
    pub total_pages: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Opportunity {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub opportunity_id: Option<String>,
    pub opportunity_number: Option<String>,
    pub opportunity_title: Option<String>,
    pub agency_name: Option<String>,
    pub agency_code: Option<String>,
    pub top_level_agency_name: Option<String>,
    pub opportunity_status: Option<String>,
    pub category: Option<String>,
    pub summary: Option<OpportunitySummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpportunitySummary {
    pub award_ceiling: Option<f64>,
    pub award_floor: Option<f64>,
    pub estimated_total_program_funding: Option<f64>,
    pub close_date: Option<String>,
    pub close_date_description: Option<String>,
    pub post_date: Option<String>,
    pub summary_description: Option<String>,
    pub funding_instruments: Option<Vec<String>>,
    pub funding_categories: Option<Vec<String>>,
}

impl Opportunity {
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
