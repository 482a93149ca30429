use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::diagnostics::ProbeReport;
use crate::error::AppError;
use crate::gateway::SearchGateway;
use crate::model::{Facets, SearchRequest, SearchResponse};
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<SearchGateway>,
    pub limiter: Option<RateLimiter>,
    pub max_page_size: u32,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    // Every route that can reach the primary API shares one budget.
    let limited = Router::new()
        .route("/api/grants", post(search_grants))
        .route("/api/categories", get(list_categories))
        .route("/api/debug", get(debug_probe))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(limited)
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(limiter) = &state.limiter {
        limiter.check().await?;
    }
    Ok(next.run(request).await)
}

async fn search_grants(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let (filters, page, limit) = request.validate(state.max_page_size)?;
    info!(
        keyword = filters.trimmed_keyword().unwrap_or_default(),
        page,
        limit,
        agencies = filters.agencies.len(),
        "grant search"
    );
    let response = state.gateway.search(&filters, page, limit).await?;
    Ok(Json(response))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Facets>, AppError> {
    Ok(Json(state.gateway.facets().await?))
}

async fn debug_probe(State(state): State<AppState>) -> Result<Json<ProbeReport>, AppError> {
    Ok(Json(state.gateway.probe().await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    primary_configured: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        primary_configured: state.gateway.primary_configured(),
    })
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grants_common::simpler_grants::{SimplerGrantsClient, SimplerGrantsConfig};
    use grants_common::usaspending::{UsaSpendingClient, UsaSpendingConfig};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::normalize::{Normalizer, NormalizerConfig};

    async fn spawn_app(upstream: &MockServer, api_key: Option<&str>, rps: Option<u32>) -> String {
        let primary = SimplerGrantsClient::new(SimplerGrantsConfig::new(
            &format!("{}/v1", upstream.uri()),
            api_key.map(str::to_string),
            1024,
        ))
        .unwrap();
        let fallback = UsaSpendingClient::new(UsaSpendingConfig::new(
            &format!("{}/api/v2", upstream.uri()),
            1024,
        ))
        .unwrap();
        let state = AppState {
            gateway: Arc::new(SearchGateway::new(
                primary,
                fallback,
                Normalizer::new(NormalizerConfig::default()),
            )),
            limiter: RateLimiter::from_rps(rps),
            max_page_size: 50,
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn post_search(base: &str, body: Value) -> (u16, Value) {
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/grants"))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn search_returns_envelope_from_fallback() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/opportunities/search"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/search/spending_by_award/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "generated_internal_id": "ASST_1", "Award Amount": 10.0 }],
                "page_metadata": { "hasNext": false }
            })))
            .expect(1)
            .mount(&upstream)
            .await;

        let base = spawn_app(&upstream, Some("key"), None).await;
        let (status, body) = post_search(&base, json!({ "keyword": "health" })).await;
        assert_eq!(status, 200);
        assert_eq!(body["source"], "usaspending");
        assert_eq!(body["hasNext"], false);
        assert_eq!(body["totalCount"], 0);
        assert_eq!(body["grants"][0]["id"], "ASST_1");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn total_failure_is_error_envelope() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&upstream)
            .await;

        let base = spawn_app(&upstream, Some("key"), None).await;
        let (status, body) = post_search(&base, json!({})).await;
        assert_eq!(status, 500);
        assert!(body["error"].as_str().unwrap().contains("all grant sources failed"));
        assert!(body.get("grants").is_none());
    }

    #[tokio::test]
    async fn invalid_requests_are_bad_request() {
        let upstream = MockServer::start().await;
        let base = spawn_app(&upstream, Some("key"), None).await;

        let (status, body) = post_search(&base, json!({ "limit": 500 })).await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("limit"));

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/grants"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn rate_limit_rejects_burst() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/opportunities/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&upstream)
            .await;

        let base = spawn_app(&upstream, Some("key"), Some(1)).await;
        let (first, _) = post_search(&base, json!({})).await;
        let (second, body) = post_search(&base, json!({})).await;
        assert_eq!(first, 200);
        assert_eq!(second, 429);
        assert!(body["error"].as_str().unwrap().contains("rate limit"));
    }

    #[tokio::test]
    async fn debug_route_shares_the_search_budget() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/opportunities/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .expect(1)
            .mount(&upstream)
            .await;

        let base = spawn_app(&upstream, Some("key"), Some(1)).await;
        let (first, _) = post_search(&base, json!({})).await;
        assert_eq!(first, 200);

        let client = reqwest::Client::new();
        let resp = client.get(format!("{base}/api/debug")).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 429);
        assert_eq!(resp.headers()["retry-after"], "1");

        let health = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn health_and_unconfigured_facets() {
        let upstream = MockServer::start().await;
        let base = spawn_app(&upstream, None, None).await;
        let client = reqwest::Client::new();

        let health: Value = client
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health, json!({ "status": "ok", "primaryConfigured": false }));

        let resp = client.get(format!("{base}/api/categories")).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 503);
        let resp = client.get(format!("{base}/api/debug")).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 503);
    }
}
