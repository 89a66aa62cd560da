//! Liveness, readiness, and startup probes. Readiness reflects exactly one
//! fact: has the Mirror Store been populated at least once. It flips back to
//! not-ready while the server drains in-flight requests during shutdown.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub timestamp: String,
    #[serde(rename = "uptimeSeconds")]
    pub uptime_seconds: u64,
    pub message: String,
}

pub struct HealthChecker {
    start_time: Instant,
    ready: Arc<RwLock<bool>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn mark_ready(&self) {
        *self.ready.write().await = true;
        tracing::info!("facilitator marked ready");
    }

    pub async fn mark_not_ready(&self) {
        *self.ready.write().await = false;
        tracing::info!("facilitator marked not ready");
    }

    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }

    fn status(&self, healthy: bool, message: &str) -> HealthStatus {
        HealthStatus {
            status: if healthy {
                HealthState::Healthy
            } else {
                HealthState::Unhealthy
            },
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            message: message.to_string(),
        }
    }

    /// The process is alive; this never reflects dependency health.
    pub async fn liveness(&self) -> HealthStatus {
        self.status(true, "process is running")
    }

    pub async fn readiness(&self) -> (StatusCode, HealthStatus) {
        if self.is_ready().await {
            (StatusCode::OK, self.status(true, "mirror is populated"))
        } else {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                self.status(false, "mirror has not been populated yet"),
            )
        }
    }

    /// Startup is considered complete once the mirror has been populated.
    pub async fn startup(&self) -> (StatusCode, HealthStatus) {
        self.readiness().await
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn liveness_handler(State(checker): State<Arc<HealthChecker>>) -> Response {
    (StatusCode::OK, Json(checker.liveness().await)).into_response()
}

pub async fn readiness_handler(State(checker): State<Arc<HealthChecker>>) -> Response {
    let (status, body) = checker.readiness().await;
    (status, Json(body)).into_response()
}

pub async fn startup_handler(State(checker): State<Arc<HealthChecker>>) -> Response {
    let (status, body) = checker.startup().await;
    (status, Json(body)).into_response()
}
