//! Mirror Store: the single piece of shared mutable state in the
//! facilitator. Holds the authoritative in-memory snapshot, coordinates
//! single-flight TTL refresh against the database/LKG cascade, and accepts
//! pushed replacements.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use facilitator_core::schema::{MirrorMap, Snapshot};
use facilitator_core::types::Source;
use facilitator_storage::{LkgStore, Loader};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{info, warn};

struct Inner {
    snapshot: Arc<Snapshot>,
    expires_at: Instant,
    generation: u64,
}

type RefreshFuture = Shared<BoxFuture<'static, Arc<Snapshot>>>;

/// TTL-guarded in-memory cache of the combined mirror snapshot.
///
/// Readers take a brief read lock to clone the current `Arc<Snapshot>` -
/// cheap, and never observe a partially-built snapshot because replacement
/// is always a single pointer swap under the write lock. Refreshing past
/// the TTL is single-flight: the first stale reader spawns the load onto
/// its own task (so a cancelled caller cannot cancel the shared load) and
/// every concurrent reader awaits the same `Shared` future.
///
/// Always held behind an `Arc`; the refresh path needs to outlive any
/// individual caller's future, so the entry points below take `self: &Arc<Self>`.
pub struct MirrorStore {
    inner: RwLock<Inner>,
    inflight: Mutex<Option<RefreshFuture>>,
    loader: Arc<dyn Loader>,
    lkg: Arc<LkgStore>,
    ttl: Duration,
}

impl MirrorStore {
    /// Construct a store with an already-hydrated initial snapshot (the
    /// Boot Hydrator's output). The store never starts snapshot-less; an
    /// empty snapshot is still a well-formed one.
    pub fn new(initial: Snapshot, loader: Arc<dyn Loader>, lkg: Arc<LkgStore>, ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner {
                snapshot: Arc::new(initial),
                expires_at: Instant::now(),
                generation: 0,
            }),
            inflight: Mutex::new(None),
            loader,
            lkg,
            ttl,
        })
    }

    /// Returns the current snapshot, refreshing it through the DB/LKG
    /// cascade if it has expired. See the module docs for the single-flight
    /// contract.
    pub async fn get_with_ttl(self: &Arc<Self>) -> Arc<Snapshot> {
        if let Some(fresh) = self.fresh_snapshot().await {
            return fresh;
        }

        let refresh = {
            let mut inflight = self.inflight.lock().await;

            if let Some(fresh) = self.fresh_snapshot().await {
                return fresh;
            }

            if let Some(existing) = inflight.as_ref() {
                existing.clone()
            } else {
                let fut = self.spawn_refresh();
                *inflight = Some(fut.clone());
                fut
            }
        };

        let result = refresh.await;

        let mut inflight = self.inflight.lock().await;
        *inflight = None;
        result
    }

    /// Adopt `map` as the authoritative snapshot immediately, reported as
    /// `source="db"` on the wire per the facilitator's convention for
    /// authoritative pushes. Persists to LKG (disk primary, DB best-effort)
    /// before returning. The caller is responsible for validating `map`
    /// first; a rejected push must never reach this method.
    pub async fn replace_with_push(self: &Arc<Self>, map: MirrorMap, request_id: &str) -> (Arc<Snapshot>, bool) {
        let snapshot = Arc::new(Snapshot {
            map: map.clone(),
            source: Source::Push,
            fetched_at: Utc::now(),
        });

        let lkg_saved = match self.lkg.save(map, request_id).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "lkg persistence failed for pushed snapshot, acceptance still succeeds");
                false
            }
        };

        let mut inner = self.inner.write().await;
        inner.snapshot = snapshot.clone();
        inner.expires_at = Instant::now() + self.ttl;
        inner.generation = inner.generation.wrapping_add(1);
        drop(inner);

        (snapshot, lkg_saved)
    }

    /// Size of the current snapshot's map (diagnostic).
    pub async fn count(self: &Arc<Self>) -> usize {
        self.inner.read().await.snapshot.len()
    }

    async fn fresh_snapshot(&self) -> Option<Arc<Snapshot>> {
        let guard = self.inner.read().await;
        if Instant::now() < guard.expires_at {
            Some(guard.snapshot.clone())
        } else {
            None
        }
    }

    fn spawn_refresh(self: &Arc<Self>) -> RefreshFuture {
        let store = self.clone();

        let task: BoxFuture<'static, Arc<Snapshot>> = async move {
            let captured_generation = store.inner.read().await.generation;
            let snapshot = store.refresh_cascade().await;

            let mut inner = store.inner.write().await;
            if inner.generation == captured_generation {
                inner.snapshot = Arc::new(snapshot);
                inner.expires_at = Instant::now() + store.ttl;
                inner.generation = inner.generation.wrapping_add(1);
                inner.snapshot.clone()
            } else {
                // A push landed while this refresh was in flight; the push
                // already installed a strictly newer snapshot, which this
                // refresh must not clobber.
                inner.snapshot.clone()
            }
        }
        .boxed();

        tokio::spawn(task)
            .map(|join_result| join_result.expect("mirror refresh task panicked"))
            .boxed()
            .shared()
    }

    /// Steps 2-5 of `getWithTtl`: DB load, then filesystem LKG, then
    /// database LKG, then an empty well-formed snapshot as the last resort.
    async fn refresh_cascade(&self) -> Snapshot {
        match self.loader.load().await {
            Ok(outcome) if !outcome.map.is_empty() => {
                let snapshot = Snapshot {
                    map: outcome.map,
                    source: Source::Db,
                    fetched_at: Utc::now(),
                };
                if let Err(err) = self.lkg.save(snapshot.map.clone(), "mirror-refresh").await {
                    warn!(error = %err, "lkg persistence failed after db refresh");
                }
                return snapshot;
            }
            Ok(_) => info!("db refresh returned zero eligible parents, falling back to lkg"),
            Err(err) => warn!(error = %err, "db refresh failed, falling back to lkg"),
        }

        if let Some(envelope) = self.lkg.try_load().await {
            if !envelope.mirror.is_empty() {
                return Snapshot {
                    map: envelope.mirror,
                    source: Source::Lkg,
                    fetched_at: envelope.saved_at,
                };
            }
        }

        if let Some(envelope) = self.lkg.try_load_from_db().await {
            if !envelope.mirror.is_empty() {
                return Snapshot {
                    map: envelope.mirror,
                    source: Source::Lkg,
                    fetched_at: envelope.saved_at,
                };
            }
        }

        warn!("mirror refresh exhausted db, filesystem lkg, and database lkg; serving an empty snapshot");
        Snapshot {
            map: MirrorMap::new(),
            source: Source::Lkg,
            fetched_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use facilitator_core::schema::{MirrorEntry, Policies, ServiceConfig};
    use facilitator_storage::{LoadOutcome, StorageError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingLoader {
        calls: AtomicUsize,
        map: MirrorMap,
    }

    #[async_trait]
    impl Loader for CountingLoader {
        async fn load(&self) -> Result<LoadOutcome, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LoadOutcome {
                map: self.map.clone(),
                raw_count: self.map.len(),
                active_count: self.map.len(),
                errors: Vec::new(),
            })
        }
    }

    fn sample_entry() -> (String, MirrorEntry) {
        (
            "auth@1".to_string(),
            MirrorEntry {
                service_config: ServiceConfig {
                    id: "id-1".into(),
                    slug: "auth".into(),
                    version: 1,
                    enabled: true,
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

    fn store_with_loader(loader: Arc<dyn Loader>, ttl: Duration) -> (Arc<MirrorStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let lkg = Arc::new(LkgStore::new(dir.path().join("lkg.json"), None));
        let store = MirrorStore::new(Snapshot::empty(Source::Lkg, Utc::now()), loader, lkg, ttl);
        (store, dir)
    }

    #[tokio::test]
    async fn get_with_ttl_returns_fresh_snapshot_without_refreshing() {
        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
            map: MirrorMap::new(),
        });
        let (store, _dir) = store_with_loader(loader.clone(), Duration::from_secs(60));

        let snap = store.get_with_ttl().await;
        assert!(snap.is_empty());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ttl_refresh_is_single_flight_under_concurrency() {
        let mut map = MirrorMap::new();
        let (key, entry) = sample_entry();
        map.insert(key, entry);

        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
            map,
        });
        let (store, _dir) = store_with_loader(loader.clone(), Duration::from_millis(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.get_with_ttl().await }));
        }

        let mut fetched_ats = std::collections::HashSet::new();
        for handle in handles {
            let snap = handle.await.unwrap();
            fetched_ats.insert(snap.fetched_at);
        }

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetched_ats.len(), 1);
    }

    #[tokio::test]
    async fn replace_with_push_is_observed_immediately() {
        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
            map: MirrorMap::new(),
        });
        let (store, _dir) = store_with_loader(loader, Duration::from_secs(60));

        store.get_with_ttl().await;

        let mut map = MirrorMap::new();
        let (key, entry) = sample_entry();
        map.insert(key.clone(), entry);

        let (snapshot, lkg_saved) = store.replace_with_push(map, "req-push").await;
        assert!(lkg_saved);
        assert_eq!(snapshot.map.len(), 1);

        let observed = store.get_with_ttl().await;
        assert_eq!(observed.map.len(), 1);
        assert!(observed.map.contains_key(&key));
    }

    #[tokio::test]
    async fn count_reflects_current_snapshot_size() {
        let mut map = MirrorMap::new();
        let (key, entry) = sample_entry();
        map.insert(key, entry);

        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
            map,
        });
        let (store, _dir) = store_with_loader(loader, Duration::from_secs(60));

        store.get_with_ttl().await;
        assert_eq!(store.count().await, 1);
    }
}
