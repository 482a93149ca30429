use std::fmt::Display;
use std::str::FromStr;

use grants_common::simpler_grants::{self, SimplerGrantsConfig};
use grants_common::usaspending::{self, UsaSpendingConfig};

use crate::error::AppError;

const DEFAULT_BIND: &str = "0.0.0.0:3001";
const DEFAULT_MAX_ERROR_BODY_BYTES: usize = 8 * 1024;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Gateway configuration loaded from environment variables.
///
/// Nothing is required: without `GRANTS_GOV_API_KEY` every search is answered by the
/// USAspending fallback.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address the HTTP server binds, e.g. "0.0.0.0:3001".
    pub bind_addr: String,
    pub primary: SimplerGrantsConfig,
    pub fallback: UsaSpendingConfig,
    /// Upper bound accepted for the inbound `limit` field.
    pub max_page_size: u32,
    /// Inbound requests per second; `None` disables the limiter.
    pub rate_limit_rps: Option<u32>,
}

impl GatewayConfig {
    /// Optional:
    /// - `GRANTS_GOV_API_KEY`: Simpler Grants.gov credential
    /// - `SIMPLER_GRANTS_BASE_URL`
    /// - `USASPENDING_BASE_URL`
    /// - `GRANTS_GATEWAY_BIND` (default "0.0.0.0:3001")
    /// - `UPSTREAM_MAX_ERROR_BODY_BYTES` (default 8192)
    /// - `MAX_PAGE_SIZE` (default 100)
    /// - `RATE_LIMIT_RPS` (0 or unset disables)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_error_body_bytes = parse_or(
            &lookup,
            "UPSTREAM_MAX_ERROR_BODY_BYTES",
            DEFAULT_MAX_ERROR_BODY_BYTES,
        )?;

        let primary_base =
            lookup("SIMPLER_GRANTS_BASE_URL").unwrap_or_else(|| simpler_grants::DEFAULT_BASE_URL.to_string());
        let fallback_base =
            lookup("USASPENDING_BASE_URL").unwrap_or_else(|| usaspending::DEFAULT_BASE_URL.to_string());
        for (key, url) in [
            ("SIMPLER_GRANTS_BASE_URL", &primary_base),
            ("USASPENDING_BASE_URL", &fallback_base),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AppError::Config(format!(
                    "{key} must be an http(s) URL, got {url:?}"
                )));
            }
        }

        let max_page_size = parse_or(&lookup, "MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)?;
        if max_page_size == 0 {
            return Err(AppError::Config("MAX_PAGE_SIZE must be positive".to_string()));
        }

        let rate_limit_rps = match lookup("RATE_LIMIT_RPS") {
            Some(raw) => Some(parse_value::<u32>("RATE_LIMIT_RPS", &raw)?).filter(|&n| n > 0),
            None => None,
        };

        Ok(Self {
            bind_addr: lookup("GRANTS_GATEWAY_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            primary: SimplerGrantsConfig::new(
                &primary_base,
                lookup(simpler_grants::API_KEY_ENV),
                max_error_body_bytes,
            ),
            fallback: UsaSpendingConfig::new(&fallback_base, max_error_body_bytes),
            max_page_size,
            rate_limit_rps,
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid {key} value {raw:?}: {e}")))
}
