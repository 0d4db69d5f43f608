//! HTTP routes
//!
//! QuickBooks endpoints, nested under the configured prefix:
//! - POST {prefix}/query          run a query, return matched entities
//! - POST {prefix}/create         create a customer, item or invoice
//! - GET  {prefix}/token/status   expiry snapshot, never refreshes
//! - POST {prefix}/token/refresh  push a token round trip via the token-check query
//!
//! Operational endpoints at the root: GET /health and GET /metrics.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use qbo_gateway::ApiGateway;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::info;

use crate::error::{Action, Error, Result};
use crate::metrics::{ServiceMetrics, track_requests};

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ApiGateway>,
    pub metrics: ServiceMetrics,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections` and a
/// permissive CORS layer.
pub fn build_router(state: AppState, api_prefix: &str, max_connections: usize) -> Router {
    let quickbooks = Router::new()
        .route("/query", post(query_handler))
        .route("/create", post(create_handler))
        .route("/token/status", get(token_status_handler))
        .route("/token/refresh", post(token_refresh_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.metrics.clone(),
            track_requests,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest(api_prefix, quickbooks)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

#[derive(Deserialize)]
struct CreateRequest {
    #[serde(rename = "entityType")]
    entity_type: String,
    #[serde(rename = "entityData", default)]
    entity_data: Option<Map<String, Value>>,
}

/// Parse a JSON body ourselves so malformed input still gets the `{"error"}` shape.
fn parse_body<T: serde::de::DeserializeOwned>(action: Action, body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::invalid_request(action, e.to_string()))
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// POST {prefix}/query
async fn query_handler(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let request: QueryRequest = parse_body(Action::Query, &body)?;
    let rows = state
        .gateway
        .query(&request.query)
        .await
        .map_err(|e| Error::gateway(Action::Query, e))?;
    Ok(axum::Json(rows))
}

/// POST {prefix}/create
async fn create_handler(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let request: CreateRequest = parse_body(Action::Create, &body)?;
    let payload = request.entity_data.unwrap_or_default();
    let created = state
        .gateway
        .create(&request.entity_type, &payload)
        .await
        .map_err(|e| Error::gateway(Action::Create, e))?;
    info!(entity_type = %request.entity_type, "entity created");
    Ok(axum::Json(created))
}

/// GET {prefix}/token/status
///
/// `minutesUntilExpiry` is omitted while the expiry is unknown.
async fn token_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.gateway.token_manager().status().await;

    let mut body = json!({
        "isExpired": status.is_expired(),
        "expiryTime": timestamp(status.expires_at),
        "currentTime": status.checked_at.to_rfc3339(),
        "status": "Active",
    });
    if let Some(minutes) = status.minutes_until_expiry() {
        body["minutesUntilExpiry"] = json!(minutes);
    }
    axum::Json(body)
}

/// POST {prefix}/token/refresh
async fn token_refresh_handler(State(state): State<AppState>) -> Result<impl IntoResponse> {
    state
        .gateway
        .force_refresh()
        .await
        .map_err(|e| Error::gateway(Action::Refresh, e))?;

    let expires_at = state.gateway.token_manager().expires_at().await;
    Ok(axum::Json(json!({
        "message": "Token refresh completed successfully",
        "newExpiryTime": timestamp(expires_at),
        "currentTime": Utc::now().to_rfc3339(),
    })))
}

/// Health endpoint: status, uptime, request counters, and the realm served.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.metrics.started_at.elapsed().as_secs();
    let requests = state.metrics.requests_total.load(Ordering::Relaxed);
    let errors = state.metrics.errors_total.load(Ordering::Relaxed);

    (
        StatusCode::OK,
        axum::Json(json!({
            "status": "healthy",
            "uptime_seconds": uptime,
            "requests_served": requests,
            "errors_total": errors,
            "realm_id": state.gateway.token_manager().realm_id(),
        })),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}
