//! Route handlers: resolve (single), mirror (all), and push (replace).

use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use facilitator_core::key::{parse_svc_key, svc_key};
use facilitator_core::schema::MirrorMap;
use facilitator_mirror::{MirrorStore, NegativeCache};

use crate::envelope::Envelope;
use crate::problem::ApiError;
use crate::request_id::RequestId;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MirrorStore>,
    pub negative_cache: Option<Arc<NegativeCache>>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolvePath {
    pub slug: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct MirrorResponse {
    pub mirror: MirrorMap,
}

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    pub mirror: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub ok: bool,
    pub accepted: bool,
    pub services: usize,
    pub source: &'static str,
    #[serde(rename = "fetchedAt")]
    pub fetched_at: String,
    #[serde(rename = "lkgSaved")]
    pub lkg_saved: bool,
}

pub async fn resolve_by_query(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<ResolveQuery>,
) -> Response {
    let key = match query.key {
        Some(key) if !key.is_empty() => key,
        _ => return ApiError::missing_key().with_request_id(request_id.as_str()).into_response(),
    };

    resolve(&state, &request_id, &key).await
}

pub async fn resolve_by_path(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(params): Path<ResolvePath>,
) -> Response {
    let version = match params.version.strip_prefix('v').unwrap_or(&params.version).parse::<u32>() {
        Ok(version) => version,
        Err(_) => {
            return ApiError::new(
                "invalid_record",
                "Invalid Record",
                format!("path segment 'v{}' is not a valid version", params.version),
                axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            )
            .with_request_id(request_id.as_str())
            .into_response();
        }
    };

    let key = match svc_key(&params.slug, version) {
        Ok(key) => key,
        Err(err) => return ApiError::from(err).with_request_id(request_id.as_str()).into_response(),
    };

    resolve(&state, &request_id, &key).await
}

async fn resolve(state: &AppState, request_id: &RequestId, key: &str) -> Response {
    if parse_svc_key(key).is_err() {
        return ApiError::new(
            "invalid_record",
            "Invalid Record",
            format!("'{key}' is not a canonical svcKey"),
            axum::http::StatusCode::UNPROCESSABLE_ENTITY,
        )
        .with_request_id(request_id.as_str())
        .into_response();
    }

    if let Some(cache) = &state.negative_cache {
        if cache.is_known_missing(key).await {
            return ApiError::not_found(key).with_request_id(request_id.as_str()).into_response();
        }
    }

    let snapshot = state.store.get_with_ttl().await;

    match snapshot.map.get(key) {
        None => {
            if let Some(cache) = &state.negative_cache {
                cache.mark_missing(key).await;
            }
            ApiError::not_found(key).with_request_id(request_id.as_str()).into_response()
        }
        Some(entry) if !entry.service_config.enabled => {
            ApiError::service_disabled(key).with_request_id(request_id.as_str()).into_response()
        }
        Some(entry) => Envelope::ok(request_id.as_str(), entry.clone()).into_response(),
    }
}

pub async fn get_mirror(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Response {
    let snapshot = state.store.get_with_ttl().await;
    if snapshot.is_empty() {
        return ApiError::mirror_unavailable().with_request_id(request_id.as_str()).into_response();
    }

    Envelope::ok(
        request_id.as_str(),
        MirrorResponse {
            mirror: snapshot.map.clone(),
        },
    )
    .into_response()
}

pub async fn push_mirror(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<PushRequest>,
) -> Response {
    let map = match facilitator_validation::parse_mirror(&body.mirror) {
        Ok(map) => map,
        Err(failure) => {
            warn!(reason = %failure.reason, key = ?failure.key, "rejected pushed mirror");
            return ApiError::mirror_validation_failed(&failure)
                .with_request_id(request_id.as_str())
                .into_response();
        }
    };

    let services = map.len();
    let (snapshot, lkg_saved) = state.store.replace_with_push(map, request_id.as_str()).await;

    if let Some(cache) = &state.negative_cache {
        cache.invalidate_all();
    }

    info!(services, lkg_saved, "accepted pushed mirror");

    Json(PushResponse {
        ok: true,
        accepted: true,
        services,
        source: "db",
        fetched_at: snapshot.fetched_at.to_rfc3339(),
        lkg_saved,
    })
    .into_response()
}

pub async fn not_found_fallback(Extension(request_id): Extension<RequestId>) -> Response {
    ApiError::not_a_base_path().with_request_id(request_id.as_str()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use facilitator_core::schema::{MirrorEntry, Policies, ServiceConfig, Snapshot};
    use facilitator_core::types::Source;
    use facilitator_storage::{LkgStore, LoadOutcome, Loader, StorageError};
    use std::time::Duration;

    struct EmptyLoader;

    #[async_trait]
    impl Loader for EmptyLoader {
        async fn load(&self) -> Result<LoadOutcome, StorageError> {
            Ok(LoadOutcome {
                map: MirrorMap::new(),
                raw_count: 0,
                active_count: 0,
                errors: Vec::new(),
            })
        }
    }

    fn sample_entry(enabled: bool) -> (String, MirrorEntry) {
        (
            "auth@1".to_string(),
            MirrorEntry {
                service_config: ServiceConfig {
                    id: "id-1".into(),
                    slug: "auth".into(),
                    version: 1,
                    enabled,
                    internal_only: false,
                    base_url: "https://auth.internal".into(),
                    outbound_api_prefix: "/auth".into(),
                    expose_health: true,
                    updated_at: Utc::now(),
                    updated_by: "operator".into(),
                    notes: None,
                },
                policies: Policies::default(),
            },
        )
    }

    async fn state_with(map: MirrorMap) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let lkg = Arc::new(LkgStore::new(dir.path().join("lkg.json"), None));
        let store = MirrorStore::new(
            Snapshot {
                map,
                source: Source::Lkg,
                fetched_at: Utc::now(),
            },
            Arc::new(EmptyLoader),
            lkg,
            Duration::from_secs(60),
        );
        (
            AppState {
                store,
                negative_cache: None,
            },
            dir,
        )
    }

    #[tokio::test]
    async fn resolve_returns_not_found_for_missing_key() {
        let (state, _dir) = state_with(MirrorMap::new()).await;
        let request_id = RequestId("req-1".into());
        let response = resolve(&state, &request_id, "ghost@1").await;
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn resolve_returns_403_for_disabled_service() {
        let (key, entry) = sample_entry(false);
        let mut map = MirrorMap::new();
        map.insert(key.clone(), entry);
        let (state, _dir) = state_with(map).await;

        let request_id = RequestId("req-1".into());
        let response = resolve(&state, &request_id, &key).await;
        assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn resolve_returns_200_for_enabled_service() {
        let (key, entry) = sample_entry(true);
        let mut map = MirrorMap::new();
        map.insert(key.clone(), entry);
        let (state, _dir) = state_with(map).await;

        let request_id = RequestId("req-1".into());
        let response = resolve(&state, &request_id, &key).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn resolve_rejects_malformed_key() {
        let (state, _dir) = state_with(MirrorMap::new()).await;
        let request_id = RequestId("req-1".into());
        let response = resolve(&state, &request_id, "NOT-A-KEY").await;
        assert_eq!(response.status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn push_with_disabled_parent_is_rejected_as_400_without_mutating_state() {
        let (state, _dir) = state_with(MirrorMap::new()).await;
        let request_id = RequestId("req-1".into());

        let body = serde_json::json!({
            "auth@1": {
                "serviceConfig": {
                    "id": "id-1",
                    "slug": "auth",
                    "version": 1,
                    "enabled": false,
                    "internalOnly": false,
                    "baseUrl": "https://auth.internal",
                    "outboundApiPrefix": "/auth",
                    "exposeHealth": true,
                    "updatedAt": "2026-01-01T00:00:00Z",
                    "updatedBy": "operator",
                },
                "policies": { "edge": [], "s2s": [] },
            }
        });

        let response = push_mirror(
            State(state.clone()),
            Extension(request_id),
            Json(PushRequest { mirror: body }),
        )
        .await;

        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(state.store.count().await, 0);
    }

    #[tokio::test]
    async fn push_with_well_formed_mirror_is_accepted_and_observed_immediately() {
        let (state, _dir) = state_with(MirrorMap::new()).await;
        let request_id = RequestId("req-1".into());

        let body = serde_json::json!({
            "auth@1": {
                "serviceConfig": {
                    "id": "id-1",
                    "slug": "auth",
                    "version": 1,
                    "enabled": true,
                    "internalOnly": false,
                    "baseUrl": "https://auth.internal",
                    "outboundApiPrefix": "/auth",
                    "exposeHealth": true,
                    "updatedAt": "2026-01-01T00:00:00Z",
                    "updatedBy": "operator",
                },
                "policies": { "edge": [], "s2s": [] },
            }
        });

        let response = push_mirror(
            State(state.clone()),
            Extension(request_id),
            Json(PushRequest { mirror: body }),
        )
        .await;

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        assert_eq!(state.store.count().await, 1);
    }
}
