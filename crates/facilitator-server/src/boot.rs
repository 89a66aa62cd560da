//! Boot Hydrator: the startup state machine that gets the process from a
//! cold start to a servable mirror.
//!
//! `init -> env_validated -> try_db -> [ok | try_fs_lkg | try_db_lkg] ->
//! ready | not_ready(fatal)`. Every transition emits a structured breadcrumb;
//! the only way this module raises is [`facilitator_core::Error::BootFatal`],
//! when neither the database nor either LKG copy yields a non-empty mirror.

use std::sync::Arc;

use chrono::Utc;
use facilitator_core::schema::Snapshot;
use facilitator_core::types::Source;
use facilitator_core::Error;
use facilitator_storage::{DbLoader, LkgStore, Loader, NullLoader};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::FacilitatorConfig;

/// What the hydrator hands back to `main`: an installable initial snapshot,
/// the loader the Mirror Store should keep using for TTL refresh, and the
/// LKG store it should persist through.
pub struct BootOutcome {
    pub snapshot: Snapshot,
    pub loader: Arc<dyn Loader>,
    pub lkg: Arc<LkgStore>,
}

/// Run the full boot sequence, building the loader and LKG store from
/// configuration. `db_handles` is `None` when the configuration database
/// pointers were absent (DB path disabled by configuration).
pub async fn hydrate(
    config: &FacilitatorConfig,
    db_handles: Option<facilitator_storage::DbHandles>,
) -> Result<BootOutcome, Error> {
    config.validate().map_err(|errors| {
        error!(state = "env_validated", errors = ?errors, "configuration envelope invalid");
        Error::BootFatal(format!("invalid configuration: {}", errors.join("; ")))
    })?;
    info!(state = "env_validated", "configuration envelope valid");

    let lkg_db_collection = db_handles.as_ref().map(|h| h.lkg.clone());
    let lkg = Arc::new(LkgStore::new(config.lkg_path.clone(), lkg_db_collection));

    let loader: Arc<dyn Loader> = match &db_handles {
        Some(handles) => {
            let db_loader = DbLoader::new(handles.configs.clone(), handles.policies.clone());
            if let Err(err) = db_loader.ensure_indexes().await {
                warn!(error = %err, "failed to ensure database indexes, continuing anyway");
            }
            Arc::new(db_loader)
        }
        None => {
            info!("database pointers not configured, db load path disabled");
            Arc::new(NullLoader)
        }
    };

    let snapshot = hydrate_with(loader.clone(), lkg.clone()).await?;
    Ok(BootOutcome { snapshot, loader, lkg })
}

/// The testable core of the state machine: `try_db -> [ok | try_fs_lkg |
/// try_db_lkg] -> ready | not_ready(fatal)`, parameterized over an already
/// constructed loader and LKG store so tests can inject a stub loader
/// without standing up a real database.
async fn hydrate_with(loader: Arc<dyn Loader>, lkg: Arc<LkgStore>) -> Result<Snapshot, Error> {
    let request_id = Uuid::new_v4().to_string();

    lkg.ensure_exists(&request_id).await.map_err(|err| {
        error!(error = %err, "failed to create lkg file");
        Error::BootFatal(format!("could not ensure lkg file exists: {err}"))
    })?;

    info!(state = "try_db", "attempting database load");
    match loader.load().await {
        Ok(outcome) if !outcome.map.is_empty() => {
            info!(
                state = "ready",
                active_count = outcome.active_count,
                raw_count = outcome.raw_count,
                "database load succeeded"
            );
            if let Err(err) = lkg.save(outcome.map.clone(), &request_id).await {
                warn!(error = %err, "failed to persist lkg after successful db load");
            }
            return Ok(Snapshot {
                map: outcome.map,
                source: Source::Db,
                fetched_at: Utc::now(),
            });
        }
        Ok(_) => info!(state = "try_fs_lkg", "database returned zero eligible parents"),
        Err(err) => warn!(state = "try_fs_lkg", error = %err, "database load failed"),
    }

    if let Some(envelope) = lkg.try_load().await {
        if !envelope.mirror.is_empty() {
            info!(state = "ready", services = envelope.mirror.len(), "filesystem lkg hydration succeeded");
            return Ok(Snapshot {
                map: envelope.mirror,
                source: Source::Lkg,
                fetched_at: envelope.saved_at,
            });
        }
    }
    info!(state = "try_db_lkg", "filesystem lkg empty or absent");

    if let Some(envelope) = lkg.try_load_from_db().await {
        if !envelope.mirror.is_empty() {
            info!(state = "ready", services = envelope.mirror.len(), "database lkg hydration succeeded");
            return Ok(Snapshot {
                map: envelope.mirror,
                source: Source::Lkg,
                fetched_at: envelope.saved_at,
            });
        }
    }

    error!(state = "not_ready", "neither the database nor either lkg copy yielded a usable mirror");
    Err(Error::BootFatal("no_db_no_lkg".to_string()))
}
