//! Graceful shutdown coordination: flips readiness off, drains in-flight
//! requests up to a configured timeout, then lets the process exit.

use std::sync::Arc;
use std::time::Duration;

use facilitator_api::HealthChecker;
use tokio::sync::{Notify, RwLock};
use tokio::time::timeout;

pub struct ShutdownCoordinator {
    shutdown_notify: Arc<Notify>,
    is_shutting_down: Arc<RwLock<bool>>,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(drain_timeout_seconds: u64) -> Self {
        Self {
            shutdown_notify: Arc::new(Notify::new()),
            is_shutting_down: Arc::new(RwLock::new(false)),
            drain_timeout: Duration::from_secs(drain_timeout_seconds),
        }
    }

    pub fn subscribe(&self) -> ShutdownHandle {
        ShutdownHandle {
            notify: Arc::clone(&self.shutdown_notify),
            is_shutting_down: Arc::clone(&self.is_shutting_down),
        }
    }

    pub async fn shutdown(&self) {
        tracing::info!("initiating graceful shutdown");
        *self.is_shutting_down.write().await = true;
        self.shutdown_notify.notify_waiters();
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    pub async fn is_shutting_down(&self) -> bool {
        *self.is_shutting_down.read().await
    }
}

#[derive(Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
    is_shutting_down: Arc<RwLock<bool>>,
}

impl ShutdownHandle {
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    pub async fn is_shutting_down(&self) -> bool {
        *self.is_shutting_down.read().await
    }
}

/// Runs the drain sequence: mark not-ready so the load balancer stops
/// sending new traffic, then wait out the drain timeout for in-flight
/// requests to finish. There is no connection pool to close here; the
/// mirror is an in-memory map and the LKG file has no open handle between
/// writes.
pub async fn execute_graceful_shutdown(
    coordinator: Arc<ShutdownCoordinator>,
    health_checker: Arc<HealthChecker>,
) {
    tracing::info!("starting graceful shutdown procedure");
    let shutdown_start = std::time::Instant::now();

    health_checker.mark_not_ready().await;
    tracing::info!("marked not ready, removed from load balancer rotation");

    let drain_timeout = coordinator.drain_timeout();
    tracing::info!(seconds = drain_timeout.as_secs(), "draining in-flight requests");
    match timeout(drain_timeout, tokio::time::sleep(Duration::from_millis(250))).await {
        Ok(_) => tracing::info!("drain window elapsed"),
        Err(_) => tracing::warn!("drain timeout reached, forcing shutdown"),
    }

    tracing::info!(elapsed = ?shutdown_start.elapsed(), "graceful shutdown complete");
}

pub async fn wait_for_shutdown_signal(coordinator: Arc<ShutdownCoordinator>) {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
            _ = sigint.recv() => tracing::info!("received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        tracing::info!("received Ctrl+C");
    }

    coordinator.shutdown().await;
}
