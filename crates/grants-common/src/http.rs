use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::UpstreamError;

pub const USER_AGENT: &str = "grants-gateway";

pub fn build_client() -> Result<reqwest::Client, UpstreamError> {
    let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    Ok(http)
}

/// Decode a successful JSON body, or turn a non-2xx response into `UpstreamError::Status`
/// carrying at most `max_error_body_bytes` of the body.
pub async fn parse_json_response<T: DeserializeOwned>(
    resp: reqwest::Response,
    max_error_body_bytes: usize,
) -> Result<T, UpstreamError> {
    if resp.status().is_success() {
        let bytes = resp.bytes().await?;
        return Ok(serde_json::from_slice(&bytes)?);
    }
    Err(to_upstream_error(resp, max_error_body_bytes).await)
}

pub async fn to_upstream_error(resp: reqwest::Response, max_error_body_bytes: usize) -> UpstreamError {
    let status = resp.status();
    let body = read_limited_text(resp, max_error_body_bytes).await;
    UpstreamError::Status { status, body }
}

/// Error bodies end up in logs and in the `{ error }` returned to clients, so an
/// upstream HTML error page is cut to `max_bytes`.
pub async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn error_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(64)))
            .mount(&server)
            .await;

        let resp = reqwest::get(server.uri()).await.unwrap();
        let err = parse_json_response::<serde_json::Value>(resp, 10)
            .await
            .unwrap_err();
        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(body.len(), 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn undecodable_success_body_is_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let resp = reqwest::get(server.uri()).await.unwrap();
        let err = parse_json_response::<serde_json::Value>(resp, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidJson(_)));
        assert_eq!(err.status(), None);
    }
}
