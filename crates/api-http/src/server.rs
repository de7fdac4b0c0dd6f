//! HTTP Server
//!
//! Router assembly, binding and graceful shutdown.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use linguard_core::application::{
    CancelToken, HealthAggregator, ProcessSupervisor, TranslationService,
};
use serde::Deserialize;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{error_envelope, ErrorContext};
use crate::handler;
use crate::rate_limiter::ClientRateLimiter;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

/// HTTP server configuration (`[server]` section)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests a single client may burst on /translate
    pub rate_limit_burst: u32,
    /// Tokens refilled per second per client
    pub rate_limit_per_sec: u32,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            rate_limit_burst: 60,
            rate_limit_per_sec: 1,
        }
    }
}

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub translation: Arc<TranslationService>,
    pub supervisor: ProcessSupervisor,
    pub health: Arc<HealthAggregator>,
    /// Host shutdown; aborts a manual engine start in progress
    pub shutdown: CancelToken,
    pub started: Instant,
}

/// Build the public router
pub fn router(state: AppState, errors: ErrorContext, limiter: Arc<ClientRateLimiter>) -> Router {
    let limited = Router::new()
        .route("/translate", post(handler::translate))
        .route_layer(middleware::from_fn_with_state(
            limiter,
            handler::rate_limit,
        ));

    Router::new()
        .route("/languages", get(handler::languages))
        .route("/health", get(handler::health))
        .route("/health/metrics", get(handler::metrics))
        .route("/health/info", get(handler::info))
        .route("/health/version", get(handler::version))
        .route("/stats", get(handler::stats))
        .route("/engine/start", post(handler::start_engine))
        .merge(limited)
        .layer(middleware::from_fn_with_state(errors, error_envelope))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bound HTTP server
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
}

impl ApiServer {
    /// Bind the listener; requests are not served until [`ApiServer::serve`]
    pub async fn bind(
        config: &ApiServerConfig,
        state: AppState,
        errors: ErrorContext,
    ) -> io::Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await?;
        let limiter = Arc::new(ClientRateLimiter::new(
            config.rate_limit_burst,
            config.rate_limit_per_sec,
        ));
        info!(
            addr = %addr,
            burst = config.rate_limit_burst,
            per_sec = config.rate_limit_per_sec,
            "HTTP API listening"
        );
        Ok(Self {
            listener,
            router: router(state, errors, limiter),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests
    pub async fn serve(self, shutdown: CancelToken) -> io::Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
        info!("HTTP API stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode};
    use linguard_core::application::{
        ProbeLedger, ReadinessPoller, ResponseCache, TranslationGateway,
    };
    use linguard_core::domain::{EngineConfig, SubprocessSpec};
    use linguard_core::port::engine_transport::mocks::FakeTransport;
    use linguard_core::port::health_endpoint::mocks::ScriptedHealthEndpoint;
    use linguard_core::port::id_provider::mocks::SequentialIds;
    use linguard_core::port::process_launcher::mocks::FakeProcessLauncher;
    use linguard_core::port::process_probe::mocks::FakeProcessProbe;
    use linguard_core::port::system_probe::mocks::MockSystemProbe;
    use linguard_core::port::SystemTimeProvider;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    struct TestApp {
        state: AppState,
        transport: Arc<FakeTransport>,
    }

    fn app() -> TestApp {
        let config = EngineConfig {
            subprocess: Some(SubprocessSpec::new("/opt/engine/run")),
            ..Default::default()
        };
        let clock = Arc::new(SystemTimeProvider);
        let ledger = ProbeLedger::new();
        let poller = ReadinessPoller::new(
            Arc::new(ScriptedHealthEndpoint::new(true)),
            config.readiness_interval(),
            config.probe_timeout(),
            ledger.clone(),
            clock.clone(),
        );
        let supervisor = ProcessSupervisor::new(
            config.clone(),
            Arc::new(FakeProcessProbe::new()),
            Arc::new(FakeProcessLauncher::new()),
            poller,
            clock.clone(),
        );
        let transport = Arc::new(FakeTransport::echo_upper());
        let translation = TranslationService::new(
            Arc::new(TranslationGateway::new(transport.clone(), &config)),
            ResponseCache::new(Duration::from_secs(3600), Some(100)),
            supervisor.status_reader(),
            Duration::from_secs(86400),
        );
        let health = HealthAggregator::new(
            supervisor.status_reader(),
            ledger,
            Arc::new(MockSystemProbe::new(3.0)),
            clock,
            config.freshness_window(),
            config.base_url.clone(),
        );
        TestApp {
            state: AppState {
                translation: Arc::new(translation),
                supervisor,
                health: Arc::new(health),
                shutdown: CancelToken::never(),
                started: Instant::now(),
            },
            transport,
        }
    }

    fn build(state: AppState, burst: u32) -> Router {
        let errors = ErrorContext {
            ids: Arc::new(SequentialIds::default()),
            clock: Arc::new(SystemTimeProvider),
        };
        router(state, errors, Arc::new(ClientRateLimiter::new(burst, 1)))
    }

    async fn ready_app() -> TestApp {
        let app = app();
        app.state
            .supervisor
            .start(&CancelToken::never())
            .await
            .unwrap();
        app
    }

    fn translate_request(body: Value) -> Request<Body> {
        Request::post("/translate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_translate_and_cached_flag() {
        let app = ready_app().await;
        let router = build(app.state.clone(), 10);
        let body = json!({"text": "hello", "sourceLang": "en", "targetLang": "ko"});

        let (status, first) = send(&router, translate_request(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["translatedText"], "HELLO");
        assert_eq!(first["detectedLang"], "en");
        assert_eq!(first["cached"], false);
        assert!(first["latencyMs"].is_u64());

        let (_, second) = send(&router, translate_request(body)).await;
        assert_eq!(second["cached"], true);
        assert_eq!(app.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_validation_error_body() {
        let app = ready_app().await;
        let router = build(app.state.clone(), 10);

        let (status, body) = send(
            &router,
            translate_request(json!({"text": "  ", "sourceLang": "en", "targetLang": "ko"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid request: Text cannot be empty");
        assert_eq!(body["details"], "INVALID_REQUEST");
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["path"], "/translate");
        assert_eq!(body["method"], "POST");
        assert_eq!(body["traceId"], "trace-1");
        assert!(body["timestamp"].is_string());
        assert_eq!(app.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = ready_app().await;
        let router = build(app.state.clone(), 10);
        let request = Request::post("/translate")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
    }

    #[tokio::test]
    async fn test_engine_not_ready_is_unavailable() {
        let app = app();
        let router = build(app.state.clone(), 10);

        let (status, body) = send(
            &router,
            translate_request(json!({"text": "hello", "sourceLang": "en", "targetLang": "ko"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["details"], "ENGINE_UNAVAILABLE");
        assert_eq!(app.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_per_client() {
        let app = ready_app().await;
        let router = build(app.state.clone(), 2)
            .layer(MockConnectInfo(SocketAddr::from(([10, 0, 0, 1], 4000))));
        let body = json!({"text": "hello", "sourceLang": "en", "targetLang": "ko"});

        for _ in 0..2 {
            let (status, _) = send(&router, translate_request(body.clone())).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, error) = send(&router, translate_request(body)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(error["statusCode"], 429);
        assert_eq!(error["path"], "/translate");

        // other endpoints are not limited
        let (status, _) = send(&router, Request::get("/stats").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_status_codes() {
        let app = app();
        let router = build(app.state.clone(), 10);
        let get = || Request::get("/health").body(Body::empty()).unwrap();

        let (status, body) = send(&router, get()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "Unhealthy");
        assert_eq!(body["supervisor"]["state"], "NOT_STARTED");

        app.state
            .supervisor
            .start(&CancelToken::never())
            .await
            .unwrap();
        let (status, body) = send(&router, get()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Healthy");
        assert_eq!(body["checks"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["checks"][0]["name"], "engine");
        assert!(body["totalDurationMs"].is_f64());
        assert_eq!(body["supervisor"]["restartAttempts"], 0);
    }

    #[tokio::test]
    async fn test_metrics_and_info() {
        let app = app();
        let router = build(app.state.clone(), 10);

        let (status, metrics) = send(
            &router,
            Request::get("/health/metrics").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(metrics["cpuUsagePercent"], 3.0);

        let (status, info) = send(
            &router,
            Request::get("/health/info").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(info["processId"].is_u64());

        let (status, version) = send(
            &router,
            Request::get("/health/version").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(version["version"], info["version"]);
        assert!(version["cpuCount"].is_u64());
    }

    #[tokio::test]
    async fn test_manual_start_and_stats() {
        let app = app();
        let router = build(app.state.clone(), 10);

        let (status, view) = send(
            &router,
            Request::post("/engine/start").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["state"], "READY");
        assert_eq!(view["ownership"]["kind"], "subprocess");

        let (_, stats) = send(&router, Request::get("/stats").body(Body::empty()).unwrap()).await;
        assert_eq!(stats["engineState"], "READY");
        assert_eq!(stats["version"], linguard_core::VERSION);
        assert_eq!(stats["cache"]["entries"], 0);
        app.state.supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_cors_is_permissive() {
        let app = app();
        let router = build(app.state.clone(), 10);
        let request = Request::get("/stats")
            .header("origin", "https://example.org")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
    }
}
