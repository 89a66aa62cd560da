mod boot;
mod config;
mod shutdown;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use facilitator_api::{router, AppState, HealthChecker};
use facilitator_mirror::{AuditSweep, NegativeCache};
use prometheus::{Encoder, TextEncoder};

use crate::config::FacilitatorConfig;
use crate::shutdown::ShutdownCoordinator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("starting service facilitator");

    let config = FacilitatorConfig::from_env()?;
    if let Err(errors) = config.validate() {
        for error in &errors {
            tracing::error!(%error, "invalid configuration");
        }
        anyhow::bail!("configuration validation failed: {}", errors.join("; "));
    }
    config.print_summary();

    let db_handles = if config.db_configured() {
        let uri = config.db_uri.clone().expect("checked by validate()");
        let db_name = config.db_name.clone().expect("checked by validate()");
        let configs_collection = config.collection_configs.clone().expect("checked by validate()");
        let policies_collection = config.collection_policies.clone().expect("checked by validate()");
        let lkg_collection = config.collection_lkg.clone().expect("checked by validate()");

        tracing::info!("connecting to configuration database");
        Some(
            facilitator_storage::connect(
                &uri,
                &db_name,
                &configs_collection,
                &policies_collection,
                &lkg_collection,
            )
            .await?,
        )
    } else {
        tracing::info!("database pointers not configured, running on lkg alone");
        None
    };

    let audit_configs = match &db_handles {
        Some(handles) => Some(handles.configs.clone()),
        None => None,
    };

    let outcome = boot::hydrate(&config, db_handles).await?;

    let store = facilitator_mirror::MirrorStore::new(
        outcome.snapshot,
        outcome.loader,
        outcome.lkg,
        Duration::from_millis(config.mirror_ttl_ms),
    );

    let negative_cache = if config.negative_cache_configured() {
        let ttl = Duration::from_millis(config.negative_ttl_ms.expect("checked by negative_cache_configured"));
        let max_entries = config.max_entries.expect("checked by negative_cache_configured");
        tracing::info!(?ttl, max_entries, "negative cache enabled");
        Some(Arc::new(NegativeCache::new(ttl, max_entries)))
    } else {
        None
    };

    let health_checker = Arc::new(HealthChecker::new());
    health_checker.mark_ready().await;

    if let (Some(configs), Some(interval_ms)) = (audit_configs, config.audit_sweep_interval_ms) {
        let sweep = Arc::new(AuditSweep::new(configs, store.clone()));
        tracing::info!(interval_ms, "audit sweep enabled");
        sweep.spawn(Duration::from_millis(interval_ms));
    }

    let app_state = AppState {
        store,
        negative_cache,
    };

    let shutdown_coordinator = Arc::new(ShutdownCoordinator::new(config.shutdown_timeout_seconds));
    let shutdown_handle = shutdown_coordinator.subscribe();

    let api_router = router(&config.base_path, app_state, health_checker.clone());
    let metrics_router = Router::new().route("/metrics", get(metrics_handler));

    let metrics_addr = SocketAddr::new(config.listen_addr.parse()?, config.metrics_port);
    tracing::info!(%metrics_addr, "metrics server listening");
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr).await?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, metrics_router).await {
            tracing::error!(%err, "metrics server exited");
        }
    });

    let addr = SocketAddr::new(config.listen_addr.parse()?, config.http_port);
    tracing::info!(%addr, base_path = %config.base_path, "http server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::spawn(shutdown::wait_for_shutdown_signal(shutdown_coordinator.clone()));

    axum::serve(listener, api_router)
        .with_graceful_shutdown(async move {
            shutdown_handle.wait().await;
        })
        .await?;

    shutdown::execute_graceful_shutdown(shutdown_coordinator, health_checker).await;

    Ok(())
}

async fn metrics_handler() -> impl axum::response::IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(%err, "failed to encode metrics");
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "metrics encoding failed" })),
        )
            .into_response();
    }
    (
        axum::http::StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}
