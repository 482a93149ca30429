use std::time::Duration;

use axum::http::header::RETRY_AFTER;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use grants_common::error::UpstreamError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded (RATE_LIMIT_RPS={rps}): try again in ~{}ms", retry_after.as_millis())]
    RateLimited { rps: u32, retry_after: Duration },

    #[error("primary grants API unavailable: {0}")]
    PrimaryUnavailable(String),

    #[error("all grant sources failed: primary: {primary}; fallback: {fallback}")]
    AllSourcesFailed { primary: String, fallback: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::PrimaryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::AllSourcesFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        match self {
            AppError::RateLimited { retry_after, .. } => {
                (status, [(RETRY_AFTER, retry_after_secs(retry_after).to_string())], body)
                    .into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}

/// Whole seconds for the `Retry-After` header, rounded up and never zero.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
