//! Shared fixtures: an in-test engine HTTP surface and full adapter wiring.
#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::Instant;

use linguard_core::application::{
    HealthAggregator, ProbeLedger, ProcessSupervisor, ReadinessPoller, ResponseCache,
    TranslationGateway, TranslationService,
};
use linguard_core::domain::{
    EngineConfig, RestartPolicy, SubprocessSpec, SupervisorState, SupervisorStatus,
};
use linguard_core::port::{ProcessProbe, SystemTimeProvider};
use linguard_infra_http::{HttpHealthEndpoint, ReqwestTransport};
use linguard_infra_system::{SubprocessLauncher, SystemProbeImpl};

struct EngineState {
    ready: AtomicBool,
    translations: AtomicUsize,
    delay: Duration,
}

/// Engine HTTP surface served in-process on an ephemeral port
pub struct FakeEngine {
    pub base_url: String,
    state: Arc<EngineState>,
}

impl FakeEngine {
    pub async fn start(ready: bool) -> Self {
        Self::with_delay(ready, Duration::ZERO).await
    }

    pub async fn with_delay(ready: bool, delay: Duration) -> Self {
        let state = Arc::new(EngineState {
            ready: AtomicBool::new(ready),
            translations: AtomicUsize::new(0),
            delay,
        });
        let router = Router::new()
            .route("/health", get(health))
            .route("/translate", post(translate))
            .route("/languages", get(languages))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.ready.store(ready, Ordering::SeqCst);
    }

    pub fn translations(&self) -> usize {
        self.state.translations.load(Ordering::SeqCst)
    }
}

async fn health(State(state): State<Arc<EngineState>>) -> (StatusCode, &'static str) {
    if state.ready.load(Ordering::SeqCst) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "loading model")
    }
}

async fn translate(
    State(state): State<Arc<EngineState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.translations.fetch_add(1, Ordering::SeqCst);
    if !state.ready.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"success": false, "error": "Model not loaded"})),
        );
    }
    tokio::time::sleep(state.delay).await;
    let text = body["text"].as_str().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "translated_text": text.to_uppercase(),
            "source_lang": body["source_lang"],
            "target_lang": body["target_lang"],
            "original_text": text,
        })),
    )
}

async fn languages() -> Json<Value> {
    Json(json!({"en": "English", "ja": "Japanese", "ko": "Korean"}))
}

/// Subprocess "engine": a shell script that records its pid in `pid_file`
pub fn engine_config(base_url: &str, script: &str, pid_file: Option<&PathBuf>) -> EngineConfig {
    let script = match pid_file {
        Some(path) => format!("echo $$ > {}; {}", path.display(), script),
        None => script.to_string(),
    };
    EngineConfig {
        base_url: base_url.to_string(),
        subprocess: Some(SubprocessSpec::new("/bin/sh").arg("-c").arg(script)),
        startup_timeout_secs: 5,
        readiness_interval_ms: 100,
        probe_timeout_ms: 500,
        monitor_interval_secs: 1,
        unhealthy_threshold: 5,
        freshness_window_secs: 5,
        stop_timeout_secs: 2,
        restart: RestartPolicy {
            enabled: true,
            max_attempts: 3,
            backoff_secs: 1,
            max_backoff_secs: 2,
            reset_after_secs: 300,
        },
        ..Default::default()
    }
}

/// Unique temp path for a pid file
pub fn pid_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("linguard-{}-{}.pid", std::process::id(), name))
}

pub fn read_pid(path: &PathBuf) -> u32 {
    std::fs::read_to_string(path)
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

pub fn kill_hard(pid: u32) {
    let status = std::process::Command::new("kill")
        .args(["-9", &pid.to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

/// Everything the daemon wires, minus the HTTP server
pub struct Stack {
    pub supervisor: ProcessSupervisor,
    pub translation: Arc<TranslationService>,
    pub health: Arc<HealthAggregator>,
}

pub fn wire(config: EngineConfig, probe: Arc<dyn ProcessProbe>) -> Stack {
    let clock = Arc::new(SystemTimeProvider);
    let ledger = ProbeLedger::new();
    let endpoint =
        HttpHealthEndpoint::new(config.endpoint(&config.health_path), config.probe_timeout())
            .unwrap();
    let poller = ReadinessPoller::new(
        Arc::new(endpoint),
        config.readiness_interval(),
        config.probe_timeout(),
        ledger.clone(),
        clock.clone(),
    );
    let supervisor = ProcessSupervisor::new(
        config.clone(),
        probe,
        Arc::new(SubprocessLauncher::new()),
        poller,
        clock.clone(),
    );

    let transport = ReqwestTransport::new(config.base_url.clone(), config.request_timeout()).unwrap();
    let translation = TranslationService::new(
        Arc::new(TranslationGateway::new(Arc::new(transport), &config)),
        ResponseCache::new(Duration::from_secs(3600), Some(1000)),
        supervisor.status_reader(),
        Duration::from_secs(86400),
    );
    let health = HealthAggregator::new(
        supervisor.status_reader(),
        ledger,
        Arc::new(SystemProbeImpl::new()),
        clock,
        config.freshness_window(),
        config.base_url.clone(),
    );

    Stack {
        supervisor,
        translation: Arc::new(translation),
        health: Arc::new(health),
    }
}

/// Poll until `accept` holds for the supervisor status
pub async fn wait_for<F>(supervisor: &ProcessSupervisor, within: Duration, accept: F) -> SupervisorStatus
where
    F: Fn(&SupervisorStatus) -> bool,
{
    let deadline = Instant::now() + within;
    loop {
        let status = supervisor.status();
        if accept(&status) {
            return status;
        }
        if Instant::now() >= deadline {
            panic!("condition not reached within {:?}, last status {:?}", within, status);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

pub async fn wait_for_state(
    supervisor: &ProcessSupervisor,
    state: SupervisorState,
    within: Duration,
) -> SupervisorStatus {
    wait_for(supervisor, within, |status| status.state == state).await
}
