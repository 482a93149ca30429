/// Primary/fallback search policy.
///
/// A search tries Simpler Grants.gov first. Any failure there (missing credential,
/// transport error, non-2xx, undecodable body) is logged and the same logical search
/// is re-issued once against USAspending. Results from the two sources are never
/// mixed in one response.
use std::collections::BTreeSet;

use chrono::{Datelike, Utc};
use tracing::{debug, error, info, warn};

use grants_common::error::UpstreamError;
use grants_common::simpler_grants::{
    OneOf, Opportunity, OpportunityFilters, OpportunitySearchRequest, Pagination,
    SimplerGrantsClient, SortOrder,
};
use grants_common::usaspending::{SpendingByAwardRequest, TimePeriod, UsaSpendingClient};

use crate::diagnostics::ProbeReport;
use crate::error::AppError;
use crate::model::{Facets, SearchFilters, SearchResponse};
use crate::normalize::Normalizer;

pub const PRIMARY_SOURCE: &str = "simpler.grants.gov";
pub const FALLBACK_SOURCE: &str = "usaspending";

const OPEN_STATUSES: [&str; 2] = ["posted", "forecasted"];
const FACET_PAGE_SIZE: u32 = 100;
/// Years before the current one included in the fallback award window.
const FALLBACK_YEARS_BACK: i32 = 2;

pub struct SearchGateway {
    primary: SimplerGrantsClient,
    fallback: UsaSpendingClient,
    normalizer: Normalizer,
}

impl SearchGateway {
    pub fn new(
        primary: SimplerGrantsClient,
        fallback: UsaSpendingClient,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            primary,
            fallback,
            normalizer,
        }
    }

    pub fn primary_configured(&self) -> bool {
        self.primary.has_credential()
    }

    pub async fn search(
        &self,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResponse, AppError> {
        self.search_in_year(filters, page, page_size, Utc::now().year())
            .await
    }

    /// [`search`](Self::search) with the fallback time window anchored on `current_year`.
    pub async fn search_in_year(
        &self,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
        current_year: i32,
    ) -> Result<SearchResponse, AppError> {
        if !filters.categories.is_empty() {
            debug!(
                categories = ?filters.categories,
                "category filters are not forwarded upstream"
            );
        }

        let primary_err = match self.search_primary(filters, page, page_size).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };
        match &primary_err {
            UpstreamError::MissingCredential(var) => {
                error!(var, "primary grants API credential not configured, using fallback")
            }
            other => warn!(
                status = ?other.status(),
                error = %other,
                "primary grants API failed, using fallback"
            ),
        }

        match self
            .search_fallback(filters, page, page_size, current_year)
            .await
        {
            Ok(response) => Ok(response),
            Err(fallback_err) => {
                error!(
                    status = ?fallback_err.status(),
                    error = %fallback_err,
                    "fallback grants API failed"
                );
                Err(AppError::AllSourcesFailed {
                    primary: primary_err.to_string(),
                    fallback: fallback_err.to_string(),
                })
            }
        }
    }

    async fn search_primary(
        &self,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResponse, UpstreamError> {
        let request = primary_query(filters, page, page_size);
        let response = self.primary.search_opportunities(&request).await?;
        let total_count = response.total_records();

        let mut grants = self.normalizer.grants_from_opportunities(response.data);
        grants.truncate(page_size as usize);
        info!(
            source = PRIMARY_SOURCE,
            grants = grants.len(),
            total_count,
            page,
            "search answered"
        );

        Ok(SearchResponse {
            grants,
            total_count,
            has_next: u64::from(page) * u64::from(page_size) < total_count,
            source: PRIMARY_SOURCE.to_string(),
        })
    }

    async fn search_fallback(
        &self,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
        current_year: i32,
    ) -> Result<SearchResponse, UpstreamError> {
        let request = fallback_query(filters, page, page_size, current_year);
        let response = self.fallback.spending_by_award(&request).await?;
        let total_count = response.total();
        let has_next = response.has_next();

        let mut grants = self.normalizer.grants_from_awards(response.results);
        grants.truncate(page_size as usize);
        info!(
            source = FALLBACK_SOURCE,
            grants = grants.len(),
            total_count,
            page,
            "search answered"
        );

        Ok(SearchResponse {
            grants,
            total_count,
            has_next,
            source: FALLBACK_SOURCE.to_string(),
        })
    }

    /// Funding-category codes and agency names seen in the first page of primary
    /// results. Needs the primary credential; there is no fallback.
    pub async fn facets(&self) -> Result<Facets, AppError> {
        self.require_primary()?;
        let response = self
            .primary
            .search_opportunities(&OpportunitySearchRequest::page(FACET_PAGE_SIZE, 1))
            .await?;

        let mut codes = BTreeSet::new();
        let mut agencies = BTreeSet::new();
        for (index, item) in response.data.into_iter().enumerate() {
            let opp = match Opportunity::from_value(item) {
                Ok(opp) => opp,
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed opportunity in facets");
                    continue;
                }
            };
            if let Some(found) = opp.summary.and_then(|s| s.funding_categories) {
                codes.extend(found);
            }
            agencies.extend(
                [opp.agency_name, opp.top_level_agency_name]
                    .into_iter()
                    .flatten()
                    .filter(|a| !a.is_empty()),
            );
        }

        let mut display_categories: Vec<_> = codes
            .iter()
            .map(|code| self.normalizer.category_for_funding_code(code))
            .collect();
        display_categories.sort_by_key(|c| c.as_str());
        display_categories.dedup();

        Ok(Facets {
            funding_categories: codes.into_iter().collect(),
            agencies: agencies.into_iter().collect(),
            display_categories,
        })
    }

    /// One-item primary search reported as a raw shape summary, whatever the status.
    pub async fn probe(&self) -> Result<ProbeReport, AppError> {
        self.require_primary()?;
        let (status, body) = self
            .primary
            .search_raw(&OpportunitySearchRequest::page(1, 1))
            .await?;
        Ok(ProbeReport::from_raw(status.as_u16(), &body))
    }

    fn require_primary(&self) -> Result<(), AppError> {
        if self.primary.has_credential() {
            return Ok(());
        }
        Err(AppError::PrimaryUnavailable(
            "no API key configured".to_string(),
        ))
    }
}

/// Most recently posted open or forecasted opportunities, optionally narrowed by
/// keyword and agency.
pub fn primary_query(
    filters: &SearchFilters,
    page: u32,
    page_size: u32,
) -> OpportunitySearchRequest {
    let agency = (!filters.agencies.is_empty()).then(|| OneOf::new(filters.agencies.iter().cloned()));
    OpportunitySearchRequest {
        pagination: Pagination {
            page_size,
            page_offset: page,
            sort_order: vec![SortOrder {
                order_by: "post_date".to_string(),
                sort_direction: "descending".to_string(),
            }],
        },
        filters: Some(OpportunityFilters {
            opportunity_status: Some(OneOf::new(OPEN_STATUSES)),
            agency,
        }),
        query: filters.trimmed_keyword().map(str::to_string),
    }
}

/// Grant awards from the last few years, keyword words matched individually.
pub fn fallback_query(
    filters: &SearchFilters,
    page: u32,
    limit: u32,
    current_year: i32,
) -> SpendingByAwardRequest {
    let keywords = filters
        .keyword
        .as_deref()
        .map(|k| k.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    SpendingByAwardRequest::grant_awards(
        keywords,
        TimePeriod::years(current_year - FALLBACK_YEARS_BACK, current_year),
        page,
        limit,
    )
}
