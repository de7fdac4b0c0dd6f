//! HTTP Handlers
//!
//! Thin adapters from HTTP to the core services.

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use linguard_core::application::CacheOrigin;
use linguard_core::domain::TranslationRequest;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::rate_limiter::ClientRateLimiter;
use crate::server::AppState;
use crate::types::{
    HealthResponse, InfoResponse, LanguagesResponse, MetricsResponse, StatsResponse,
    SupervisorView, TranslateBody, TranslateResponse, VersionResponse,
};

/// POST /translate
pub async fn translate(
    State(state): State<AppState>,
    body: Result<Json<TranslateBody>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let request = TranslationRequest::new(body.text, body.source_lang, body.target_lang);

    let (result, origin) = state.translation.translate(&request).await?;
    Ok(Json(TranslateResponse::new(
        result,
        origin == CacheOrigin::Hit,
    )))
}

/// GET /languages
pub async fn languages(
    State(state): State<AppState>,
) -> Result<Json<LanguagesResponse>, ApiError> {
    let languages = state.translation.languages().await?;
    Ok(Json(LanguagesResponse { languages }))
}

/// GET /health - 200 only when Healthy
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.health.snapshot();
    let code = if snapshot.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(HealthResponse::from(snapshot)))
}

/// GET /health/metrics
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(state.health.metrics().into())
}

/// GET /health/info
pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(state.health.system_info().into())
}

/// GET /health/version
pub async fn version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(state.health.system_info().into())
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_secs: state.started.elapsed().as_secs(),
        version: linguard_core::VERSION.to_string(),
        engine_state: state.supervisor.status().state,
        cache: state.translation.cache_stats().into(),
    })
}

/// POST /engine/start - manual (re)start, e.g. after Failed
pub async fn start_engine(
    State(state): State<AppState>,
) -> Result<Json<SupervisorView>, ApiError> {
    info!("Engine start requested over HTTP");
    let status = state.supervisor.start(&state.shutdown).await?;
    Ok(Json(status.into()))
}

/// Per-client rate limit; clients without a known address share one bucket
pub async fn rate_limit(
    State(limiter): State<Arc<ClientRateLimiter>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let client = connect_info
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limiter.check(client) {
        return ApiError::rate_limited().into_response();
    }
    next.run(request).await
}
