/// Mapping from the two upstream record shapes into [`Grant`].
///
/// Both mappers are total: any decodable item yields a `Grant` with safe defaults.
/// Items that do not decode at all (non-objects, wrong field types) are skipped
/// with a warning by the batch helpers rather than failing the page.
use serde_json::Value;
use tracing::warn;

use grants_common::simpler_grants::Opportunity;
use grants_common::usaspending::Award;

use crate::categories::CategoryRules;
use crate::model::{AmountRange, Category, Grant};

pub const GRANTS_GOV_RECORD_SOURCE: &str = "grants.gov";
pub const USASPENDING_RECORD_SOURCE: &str = "usaspending";

const MATCH_BASE: u32 = 70;
const MATCH_CAP: u32 = 99;
const HIGH_CEILING: f64 = 500_000.0;
const PRIMARY_FEATURED_OVER: f64 = 1_000_000.0;
const FALLBACK_FEATURED_OVER: f64 = 5_000_000.0;
const FALLBACK_MIN_RATIO: f64 = 0.8;
const TITLE_MAX_CHARS: usize = 150;

const GRANTS_GOV_ELIGIBILITY: &[&str] = &["See opportunity details on Grants.gov"];
const GRANTS_GOV_REQUIREMENTS: &[&str] = &[
    "Federal registration (SAM.gov)",
    "Grants.gov registration",
    "Application submission via Grants.gov",
];
const USASPENDING_ELIGIBILITY: &[&str] = &["Various eligible entities"];
const USASPENDING_REQUIREMENTS: &[&str] = &["Federal compliance requirements"];

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    pub agency_rules: CategoryRules,
    pub funding_code_rules: CategoryRules,
    /// Opportunity number is appended.
    pub grants_gov_apply_url: String,
    /// Award id is appended.
    pub usaspending_award_url: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            agency_rules: CategoryRules::agency_defaults(),
            funding_code_rules: CategoryRules::funding_code_defaults(),
            grants_gov_apply_url: "https://www.grants.gov/search-grants?oppNum=".to_string(),
            usaspending_award_url: "https://www.usaspending.gov/award/".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn category_for_agency(&self, agency: &str) -> Category {
        self.config.agency_rules.resolve(agency)
    }

    pub fn category_for_funding_code(&self, code: &str) -> Category {
        self.config.funding_code_rules.resolve(code)
    }

    pub fn grants_from_opportunities(&self, items: Vec<Value>) -> Vec<Grant> {
        decode_each(items, "opportunity", Opportunity::from_value)
            .map(|(index, opp)| self.grant_from_opportunity(&opp, index))
            .collect()
    }

    pub fn grants_from_awards(&self, items: Vec<Value>) -> Vec<Grant> {
        decode_each(items, "award", Award::from_value)
            .map(|(index, award)| self.grant_from_award(&award, index))
            .collect()
    }

    /// `index` is the item's position in the upstream page; it stands in for a missing id.
    pub fn grant_from_opportunity(&self, opp: &Opportunity, index: usize) -> Grant {
        let summary = opp.summary.clone().unwrap_or_default();
        let agency = non_empty(opp.agency_name.as_deref())
            .or_else(|| non_empty(opp.top_level_agency_name.as_deref()));

        let max = non_zero(summary.award_ceiling)
            .or_else(|| non_zero(summary.estimated_total_program_funding))
            .unwrap_or(0.0)
            .max(0.0);
        let mut min = non_zero(summary.award_floor).unwrap_or(0.0).max(0.0);
        if max > 0.0 && min > max {
            min = max;
        }

        let opportunity_id = non_empty(opp.opportunity_id.as_deref());
        let variance_source = opportunity_id
            .map(str::to_string)
            .unwrap_or_else(|| index.to_string());
        let status = non_empty(opp.opportunity_status.as_deref());
        let mut score = MATCH_BASE + decimal_tail(&variance_source) % 10;
        if max > HIGH_CEILING {
            score += 10;
        }
        if status == Some("posted") {
            score += 10;
        }

        let deadline = non_empty(summary.close_date.as_deref())
            .or_else(|| non_empty(summary.close_date_description.as_deref()))
            .unwrap_or("Open")
            .to_string();
        let number = opp.opportunity_number.clone().unwrap_or_default();

        Grant {
            id: opportunity_id
                .map(str::to_string)
                .unwrap_or_else(|| format!("simpler-grants-{index}")),
            title: non_empty(opp.opportunity_title.as_deref())
                .unwrap_or("Untitled Opportunity")
                .to_string(),
            organization: agency.unwrap_or("Federal Agency").to_string(),
            description: non_empty(summary.summary_description.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    format!("Federal grant opportunity. Opportunity Number: {number}")
                }),
            amount: AmountRange { min, max },
            deadline,
            category: self.category_for_agency(agency.unwrap_or_default()),
            eligibility: to_strings(GRANTS_GOV_ELIGIBILITY),
            requirements: to_strings(GRANTS_GOV_REQUIREMENTS),
            application_url: format!("{}{number}", self.config.grants_gov_apply_url),
            featured: max > PRIMARY_FEATURED_OVER,
            match_percentage: score.min(MATCH_CAP) as u8,
            source: GRANTS_GOV_RECORD_SOURCE.to_string(),
            status: status.map(str::to_string),
            posted_date: non_empty(summary.post_date.as_deref()).map(str::to_string),
            opportunity_number: non_empty(opp.opportunity_number.as_deref()).map(str::to_string),
        }
    }

    /// The score is 70 plus at most 24, so it is never clamped.
    pub fn grant_from_award(&self, award: &Award, index: usize) -> Grant {
        let amount = award.award_amount.filter(|a| a.is_finite()).unwrap_or(0.0);
        let max = amount.max(0.0);
        let min = (amount * FALLBACK_MIN_RATIO).max(0.0);

        let internal_id = non_empty(award.generated_internal_id.as_deref());
        let id = internal_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("usa-spending-{index}"));
        let score = MATCH_BASE + hex_tail(internal_id.unwrap_or("0")) % 25;

        let description = non_empty(award.description.as_deref());
        let agency = non_empty(award.awarding_agency.as_deref());

        Grant {
            title: description
                .map(|d| d.chars().take(TITLE_MAX_CHARS).collect())
                .unwrap_or_else(|| "Federal Award".to_string()),
            organization: agency.unwrap_or("Federal Agency").to_string(),
            description: description.unwrap_or("Federal grant award").to_string(),
            amount: AmountRange { min, max },
            deadline: award.end_date.clone().unwrap_or_default(),
            category: self.category_for_agency(agency.unwrap_or_default()),
            eligibility: to_strings(USASPENDING_ELIGIBILITY),
            requirements: to_strings(USASPENDING_REQUIREMENTS),
            application_url: format!("{}{id}", self.config.usaspending_award_url),
            featured: amount > FALLBACK_FEATURED_OVER,
            match_percentage: score as u8,
            source: USASPENDING_RECORD_SOURCE.to_string(),
            status: None,
            posted_date: None,
            opportunity_number: None,
            id,
        }
    }
}

fn decode_each<T>(
    items: Vec<Value>,
    kind: &'static str,
    decode: fn(Value) -> Result<T, serde_json::Error>,
) -> impl Iterator<Item = (usize, T)> {
    items
        .into_iter()
        .enumerate()
        .filter_map(move |(index, item)| match decode(item) {
            Ok(decoded) => Some((index, decoded)),
            Err(e) => {
                warn!(index, kind, error = %e, "skipping malformed upstream item");
                None
            }
        })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn non_zero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && v.is_finite())
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Last two characters of `id`.
fn tail(id: &str) -> &str {
    let start = id
        .char_indices()
        .rev()
        .nth(1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &id[start..]
}

/// Leading decimal digits of the last two characters, 0 when there are none.
fn decimal_tail(id: &str) -> u32 {
    leading_digits(tail(id), 10)
}

/// Leading hex digits of the last two characters, 0 when there are none.
fn hex_tail(id: &str) -> u32 {
    leading_digits(tail(id), 16)
}

fn leading_digits(s: &str, radix: u32) -> u32 {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    u32::from_str_radix(&s[..end], radix).unwrap_or(0)
}
