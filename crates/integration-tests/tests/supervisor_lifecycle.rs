//! Engine supervision against real child processes
//!
//! The "engine" is a shell script; its HTTP surface is served in-test so
//! readiness can be switched on and off.
#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use common::{
    engine_config, kill_hard, pid_file, process_alive, read_pid, wait_for, wait_for_state, wire,
    FakeEngine,
};
use linguard_core::application::{cancel_channel, CancelToken};
use linguard_core::domain::{HealthStatus, OwnershipKind, SubprocessSpec, SupervisorState};
use linguard_core::error::AppError;
use linguard_core::port::process_probe::mocks::FakeProcessProbe;
use linguard_infra_system::NoopServiceControl;

const LONG_RUNNING: &str = "exec sleep 30";

/// Scenario A: no managed service, subprocess becomes ready
#[tokio::test]
async fn test_subprocess_start_and_stop() {
    let engine = FakeEngine::start(true).await;
    let stack = wire(
        engine_config(&engine.base_url, LONG_RUNNING, None),
        Arc::new(NoopServiceControl),
    );

    let status = stack.supervisor.start(&CancelToken::never()).await.unwrap();
    assert_eq!(status.state, SupervisorState::Ready);
    let pid = status.pid.expect("subprocess pid");
    assert_eq!(status.ownership, Some(OwnershipKind::Subprocess { pid }));
    assert!(process_alive(pid));

    let status = stack.supervisor.stop().await;
    assert_eq!(status.state, SupervisorState::Stopped);
    assert!(!process_alive(pid));

    // idempotent
    assert_eq!(stack.supervisor.stop().await.state, SupervisorState::Stopped);
}

/// Scenario B: engine never answers, start is bounded and the child is reaped
#[tokio::test]
async fn test_startup_timeout_terminates_child() {
    let engine = FakeEngine::start(false).await;
    let pid_path = pid_file("timeout");
    let mut config = engine_config(&engine.base_url, LONG_RUNNING, Some(&pid_path));
    config.startup_timeout_secs = 1;
    let stack = wire(config, Arc::new(NoopServiceControl));

    let started = Instant::now();
    let err = stack
        .supervisor
        .start(&CancelToken::never())
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err, AppError::StartupTimeout { timeout_secs: 1 });
    assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);
    assert_eq!(stack.supervisor.status().state, SupervisorState::Failed);

    let pid = read_pid(&pid_path);
    let _ = std::fs::remove_file(&pid_path);
    assert!(!process_alive(pid));
}

#[tokio::test]
async fn test_missing_executable_fails_fast() {
    let engine = FakeEngine::start(true).await;
    let mut config = engine_config(&engine.base_url, LONG_RUNNING, None);
    config.subprocess = Some(SubprocessSpec::new("/nonexistent/linguard-engine"));
    let stack = wire(config, Arc::new(NoopServiceControl));

    let err = stack
        .supervisor
        .start(&CancelToken::never())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ProcessLaunch(_)), "{err:?}");
    let status = stack.supervisor.status();
    assert_eq!(status.state, SupervisorState::Failed);
    assert!(status.pid.is_none());
}

#[tokio::test]
async fn test_child_exit_during_startup_is_reported() {
    let engine = FakeEngine::start(false).await;
    let stack = wire(
        engine_config(&engine.base_url, "exit 1", None),
        Arc::new(NoopServiceControl),
    );

    let started = Instant::now();
    let err = stack
        .supervisor
        .start(&CancelToken::never())
        .await
        .unwrap_err();
    match err {
        AppError::EngineExited(detail) => assert!(detail.contains("exit code 1"), "{detail}"),
        other => panic!("unexpected error: {other:?}"),
    }
    // well before the 5s startup timeout
    assert!(started.elapsed() < Duration::from_secs(3));
}

/// Scenario C: crash while Ready is restarted within the backoff
#[tokio::test]
async fn test_crash_is_restarted() {
    let engine = FakeEngine::start(true).await;
    let stack = wire(
        engine_config(&engine.base_url, LONG_RUNNING, None),
        Arc::new(NoopServiceControl),
    );
    let first = stack
        .supervisor
        .start(&CancelToken::never())
        .await
        .unwrap()
        .pid
        .unwrap();
    assert_eq!(stack.health.snapshot().status, HealthStatus::Healthy);

    kill_hard(first);

    // /health must report the restart window, not a healthy engine
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = stack.health.snapshot();
        if matches!(
            snapshot.supervisor.state,
            SupervisorState::Degraded | SupervisorState::Restarting
        ) {
            assert_eq!(snapshot.status, HealthStatus::Degraded);
            assert_eq!(snapshot.checks[1].status, HealthStatus::Degraded);
            break;
        }
        assert!(Instant::now() < deadline, "restart window never observed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let status = wait_for(&stack.supervisor, Duration::from_secs(10), |status| {
        status.state == SupervisorState::Ready && status.pid.is_some_and(|pid| pid != first)
    })
    .await;
    assert!(status.restart_attempts >= 1);
    let snapshot = stack.health.snapshot();
    assert_eq!(snapshot.status, HealthStatus::Healthy);
    assert_eq!(snapshot.supervisor.pid, status.pid);
    assert_eq!(
        status.last_exit.and_then(|exit| exit.signal),
        Some(9)
    );

    let second = status.pid.unwrap();
    stack.supervisor.stop().await;
    assert!(!process_alive(second));
}

#[tokio::test]
async fn test_failed_probe_degrades_then_recovers() {
    let engine = FakeEngine::start(true).await;
    let stack = wire(
        engine_config(&engine.base_url, LONG_RUNNING, None),
        Arc::new(NoopServiceControl),
    );
    let pid = stack
        .supervisor
        .start(&CancelToken::never())
        .await
        .unwrap()
        .pid;

    engine.set_ready(false);
    wait_for_state(&stack.supervisor, SupervisorState::Degraded, Duration::from_secs(5)).await;
    engine.set_ready(true);
    let status =
        wait_for_state(&stack.supervisor, SupervisorState::Ready, Duration::from_secs(5)).await;

    // recovered in place, no restart
    assert_eq!(status.pid, pid);
    stack.supervisor.stop().await;
}

/// Scenario D: managed service already running, nothing is spawned or stopped
#[tokio::test]
async fn test_running_managed_service_is_attached() {
    let engine = FakeEngine::start(true).await;
    let mut config = engine_config(&engine.base_url, LONG_RUNNING, None);
    config.managed_service = Some("linguard-engine".to_string());
    let probe = Arc::new(FakeProcessProbe::with_running("linguard-engine"));
    let stack = wire(config, probe.clone());

    let status = stack.supervisor.start(&CancelToken::never()).await.unwrap();
    assert_eq!(status.state, SupervisorState::Ready);
    assert_eq!(
        status.ownership,
        Some(OwnershipKind::Attached {
            service: "linguard-engine".to_string()
        })
    );
    assert!(status.pid.is_none());

    stack.supervisor.stop().await;
    assert!(probe.start_calls().is_empty());
    assert!(probe.stop_calls().is_empty());
}

#[tokio::test]
async fn test_host_cancellation_cleans_up_child() {
    let engine = FakeEngine::start(false).await;
    let pid_path = pid_file("cancel");
    let stack = wire(
        engine_config(&engine.base_url, LONG_RUNNING, Some(&pid_path)),
        Arc::new(NoopServiceControl),
    );
    let (host, token) = cancel_channel();

    let supervisor = stack.supervisor.clone();
    let start = tokio::spawn(async move { supervisor.start(&token).await });
    tokio::time::sleep(Duration::from_millis(500)).await;
    host.cancel();

    let err = start.await.unwrap().unwrap_err();
    assert!(matches!(err, AppError::Cancelled(_)), "{err:?}");
    assert_eq!(stack.supervisor.status().state, SupervisorState::Stopped);

    let pid = read_pid(&pid_path);
    let _ = std::fs::remove_file(&pid_path);
    assert!(!process_alive(pid));
}

#[tokio::test]
async fn test_restart_after_failure() {
    let engine = FakeEngine::start(false).await;
    let mut config = engine_config(&engine.base_url, LONG_RUNNING, None);
    config.startup_timeout_secs = 1;
    let stack = wire(config, Arc::new(NoopServiceControl));

    assert!(stack.supervisor.start(&CancelToken::never()).await.is_err());
    assert_eq!(stack.supervisor.status().state, SupervisorState::Failed);

    engine.set_ready(true);
    let status = stack.supervisor.start(&CancelToken::never()).await.unwrap();
    assert_eq!(status.state, SupervisorState::Ready);
    stack.supervisor.stop().await;
}
