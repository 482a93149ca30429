/// Error type shared by both upstream clients.
///
/// The clients never decide what a failure means for a search. The gateway crate
/// inspects `UpstreamError` to choose between the fallback source and a hard error.
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} body={body}")]
    Status { status: StatusCode, body: String },

    #[error("credential not configured: {0}")]
    MissingCredential(&'static str),
}

impl UpstreamError {
    /// HTTP status reported by the upstream, when it answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Request(e) => e.status(),
            UpstreamError::InvalidJson(_) | UpstreamError::MissingCredential(_) => None,
        }
    }
}
