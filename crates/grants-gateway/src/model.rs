use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 12;

/// Closed set of display categories shown by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Healthcare,
    Education,
    Environment,
    Research,
    Defense,
    Agriculture,
    #[serde(rename = "Small Business")]
    SmallBusiness,
    #[serde(rename = "Social Services")]
    SocialServices,
    Infrastructure,
    #[serde(rename = "Arts & Culture")]
    ArtsCulture,
    Other,
}

impl Category {
    #[cfg(test)]
    pub const ALL: [Category; 11] = [
        Category::Healthcare,
        Category::Education,
        Category::Environment,
        Category::Research,
        Category::Defense,
        Category::Agriculture,
        Category::SmallBusiness,
        Category::SocialServices,
        Category::Infrastructure,
        Category::ArtsCulture,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Healthcare => "Healthcare",
            Category::Education => "Education",
            Category::Environment => "Environment",
            Category::Research => "Research",
            Category::Defense => "Defense",
            Category::Agriculture => "Agriculture",
            Category::SmallBusiness => "Small Business",
            Category::SocialServices => "Social Services",
            Category::Infrastructure => "Infrastructure",
            Category::ArtsCulture => "Arts & Culture",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
}

/// A grant opportunity or award in the shape the front end consumes, whichever
/// upstream produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    pub id: String,
    pub title: String,
    pub organization: String,
    pub description: String,
    pub amount: AmountRange,
    /// ISO date, free-text close description, or "Open".
    pub deadline: String,
    pub category: Category,
    pub eligibility: Vec<String>,
    pub requirements: Vec<String>,
    pub application_url: String,
    pub featured: bool,
    pub match_percentage: u8,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opportunity_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub keyword: Option<String>,
    pub categories: Vec<String>,
    pub agencies: Vec<String>,
}

impl SearchFilters {
    /// The keyword with surrounding whitespace removed, or `None` when nothing is left.
    pub fn trimmed_keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Inbound body of `POST /api/grants`. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub agencies: Option<Vec<String>>,
}

impl SearchRequest {
    /// Apply defaults and bounds, returning `(filters, page, limit)`.
    pub fn validate(self, max_page_size: u32) -> Result<(SearchFilters, u32, u32), AppError> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        if page == 0 {
            return Err(AppError::InvalidRequest("page must be at least 1".to_string()));
        }
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > max_page_size {
            return Err(AppError::InvalidRequest(format!(
                "limit must be between 1 and {max_page_size}"
            )));
        }

        let filters = SearchFilters {
            keyword: self.keyword,
            categories: self.categories.unwrap_or_default(),
            agencies: self
                .agencies
                .unwrap_or_default()
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        };
        Ok((filters, page, limit))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub grants: Vec<Grant>,
    pub total_count: u64,
    pub has_next: bool,
    pub source: String,
}

/// Filter values observed in one page of primary results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Facets {
    pub funding_categories: Vec<String>,
    pub agencies: Vec<String>,
    pub display_categories: Vec<Category>,
}
