/// Client and wire types for the USAspending `spending_by_award` search.
///
/// No credential is needed. Award rows use the display-name field keys the API was
/// asked for in `fields`, so the request and `Award` must stay in sync.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::UpstreamError;
use crate::http::{build_client, parse_json_response};
use crate::wire::opt_string_or_number;

pub const DEFAULT_BASE_URL: &str = "https://api.usaspending.gov/api/v2";

/// Award type codes for block, formula, project and cooperative-agreement grants.
pub const GRANT_AWARD_TYPE_CODES: [&str; 4] = ["02", "03", "04", "05"];

pub const AWARD_FIELDS: [&str; 8] = [
    "Award ID",
    "Recipient Name",
    "Award Amount",
    "Description",
    "Start Date",
    "End Date",
    "Awarding Agency",
    "generated_internal_id",
];

#[derive(Clone, Debug)]
pub struct UsaSpendingConfig {
    pub base_url: String,
    pub max_error_body_bytes: usize,
}

impl UsaSpendingConfig {
    pub fn new(base_url: &str, max_error_body_bytes: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            max_error_body_bytes,
        }
    }
}

#[derive(Clone)]
pub struct UsaSpendingClient {
    config: UsaSpendingConfig,
    http: reqwest::Client,
}

impl UsaSpendingClient {
    pub fn new(config: UsaSpendingConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            config,
            http: build_client()?,
        })
    }

    pub fn config(&self) -> &UsaSpendingConfig {
        &self.config
    }

    pub async fn spending_by_award(
        &self,
        request: &SpendingByAwardRequest,
    ) -> Result<SpendingByAwardResponse, UpstreamError> {
        let url = format!("{}/search/spending_by_award/", self.config.base_url);
        let resp = self.http.post(&url).json(request).send().await?;
        let parsed: SpendingByAwardResponse =
            parse_json_response(resp, self.config.max_error_body_bytes).await?;
        debug!(items = parsed.results.len(), "usaspending search answered");
        Ok(parsed)
    }
}

// ---- request ----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingByAwardRequest {
    pub filters: AwardFilters,
    pub fields: Vec<String>,
    pub page: u32,
    pub limit: u32,
    pub sort: String,
    pub order: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardFilters {
    pub award_type_codes: Vec<String>,
    pub time_period: Vec<TimePeriod>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePeriod {
    pub start_date: String,
    pub end_date: String,
}

impl TimePeriod {
    /// January 1st of `from_year` through December 31st of `to_year`.
    pub fn years(from_year: i32, to_year: i32) -> Self {
        Self {
            start_date: format!("{from_year}-01-01"),
            end_date: format!("{to_year}-12-31"),
        }
    }
}

impl SpendingByAwardRequest {
    /// Grant-type awards in `time_period`, largest first.
    pub fn grant_awards(
        keywords: Vec<String>,
        time_period: TimePeriod,
        page: u32,
        limit: u32,
    ) -> Self {
        Self {
            filters: AwardFilters {
                award_type_codes: GRANT_AWARD_TYPE_CODES.iter().map(|c| c.to_string()).collect(),
                time_period: vec![time_period],
                keywords,
            },
            fields: AWARD_FIELDS.iter().map(|f| f.to_string()).collect(),
            page,
            limit,
            sort: "Award Amount".to_string(),
            order: "desc".to_string(),
        }
    }
}

// ---- response ----

#[derive(Debug, Clone, Deserialize)]
pub struct SpendingByAwardResponse {
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    #[serde(default)]
    pub page_metadata: Option<PageMetadata>,
}

impl SpendingByAwardResponse {
    pub fn total(&self) -> u64 {
        self.page_metadata.as_ref().and_then(|m| m.total).unwrap_or(0)
    }

    pub fn has_next(&self) -> bool {
        self.page_metadata
            .as_ref()
            .and_then(|m| m.has_next)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageMetadata {
    pub page: Option<u64>,
    pub total: Option<u64>,
    #[serde(rename = "hasNext")]
    pub has_next: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Award {
    #[serde(rename = "Award ID", default, deserialize_with = "opt_string_or_number")]
    pub award_id: Option<String>,
    #[serde(rename = "Recipient Name")]
    pub recipient_name: Option<String>,
    #[serde(rename = "Award Amount")]
    pub award_amount: Option<f64>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "Start Date")]
    pub start_date: Option<String>,
    #[serde(rename = "End Date")]
    pub end_date: Option<String>,
    #[serde(rename = "Awarding Agency")]
    pub awarding_agency: Option<String>,
    pub generated_internal_id: Option<String>,
}

impl Award {
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
