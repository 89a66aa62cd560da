//! LKG Store: atomic on-disk persistence of the combined snapshot, with a
//! best-effort mirrored document in the configuration database.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use facilitator_core::schema::{LkgEnvelope, MirrorMap, LKG_DB_DOCUMENT_ID, LKG_SCHEMA_V2};
use mongodb::bson::{doc, Document};
use mongodb::options::UpdateOptions;
use mongodb::Collection;
use uuid::Uuid;

use crate::error::StorageError;

/// Owns the single filesystem path for the LKG snapshot file and, when
/// configured, a handle to the database's LKG collection for secondary
/// persistence.
///
/// The filesystem copy is primary: `save` always attempts the file write
/// first and only mirrors to the database best-effort afterwards, and a
/// database failure never fails `save` (see the failure semantics in the
/// design notes this module is built from).
pub struct LkgStore {
    path: PathBuf,
    db_collection: Option<Collection<Document>>,
}

impl LkgStore {
    pub fn new(path: impl Into<PathBuf>, db_collection: Option<Collection<Document>>) -> Self {
        Self {
            path: path.into(),
            db_collection,
        }
    }

    /// Create the file with an empty-mirror envelope if it does not already
    /// exist. Fails only if the parent directory cannot be created.
    pub async fn ensure_exists(&self, request_id: &str) -> Result<(), StorageError> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }

        let envelope = LkgEnvelope::new(MirrorMap::new(), request_id.to_string(), Utc::now());
        self.write_envelope_to_disk(&envelope).await
    }

    /// Write `{ schema, savedAt, requestId, mirror }` atomically: a unique
    /// temp file in the same directory, `fsync`'d, then renamed over the
    /// target, followed by a best-effort directory `fsync`. The database
    /// mirror write happens afterward and is allowed to fail silently.
    pub async fn save(&self, map: MirrorMap, request_id: &str) -> Result<(), StorageError> {
        let envelope = LkgEnvelope::new(map, request_id.to_string(), Utc::now());
        self.write_envelope_to_disk(&envelope).await?;

        if let Some(collection) = &self.db_collection {
            if let Err(err) = mirror_to_db(collection, &envelope).await {
                tracing::warn!(error = %err, "lkg database mirror write failed, disk copy remains authoritative");
            }
        }

        Ok(())
    }

    /// Read and parse the file. Returns `Ok(None)` on any missing, corrupt,
    /// or schema-mismatched file; never returns an error to the caller, by
    /// contract of the store (read failures are swallowed and logged).
    pub async fn try_load(&self) -> Option<LkgEnvelope> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => parse_envelope(&bytes),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(error = %err, path = %self.path.display(), "lkg file read failed");
                }
                None
            }
        }
    }

    /// Read the mirrored database LKG document, if a database collection
    /// was configured. Same swallow-and-log contract as `try_load`.
    pub async fn try_load_from_db(&self) -> Option<LkgEnvelope> {
        let collection = self.db_collection.as_ref()?;
        match collection
            .find_one(doc! { "_id": LKG_DB_DOCUMENT_ID }, None)
            .await
        {
            Ok(Some(document)) => document_to_envelope(document),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "lkg database read failed");
                None
            }
        }
    }

    async fn write_envelope_to_disk(&self, envelope: &LkgEnvelope) -> Result<(), StorageError> {
        let path = self.path.clone();
        let body = serde_json::to_vec_pretty(envelope)?;

        tokio::task::spawn_blocking(move || write_atomically(&path, &body))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e.to_string())))?
    }
}

/// Scoped write: create parent dirs, open a uniquely-named temp file in the
/// same directory with mode `0600`, write, `fsync`, `rename` over the
/// target, then best-effort `fsync` the directory. Every exit path -
/// including early errors - cleans up the temp file so nothing leaks.
fn write_atomically(path: &Path, body: &[u8]) -> Result<(), StorageError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let tmp_name = format!(".{}.{}.tmp", path.file_name().and_then(|n| n.to_str()).unwrap_or("lkg"), Uuid::new_v4());
    let tmp_path = dir.join(tmp_name);

    let result = (|| -> Result<(), StorageError> {
        let mut file = open_with_mode_0600(&tmp_path)?;
        file.write_all(body)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, path)?;
        fsync_dir_best_effort(dir);
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    result
}

#[cfg(unix)]
fn open_with_mode_0600(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_with_mode_0600(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(unix)]
fn fsync_dir_best_effort(dir: &Path) {
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
}

#[cfg(not(unix))]
fn fsync_dir_best_effort(_dir: &Path) {}

fn parse_envelope(bytes: &[u8]) -> Option<LkgEnvelope> {
    let envelope: LkgEnvelope = serde_json::from_slice(bytes).ok()?;
    if envelope.is_current_schema() {
        Some(envelope)
    } else {
        None
    }
}

async fn mirror_to_db(collection: &Collection<Document>, envelope: &LkgEnvelope) -> Result<(), StorageError> {
    let payload = bson::to_bson(envelope)?;
    let update = doc! {
        "$set": {
            "schema": LKG_SCHEMA_V2,
            "updatedAt": bson::DateTime::from_chrono(Utc::now()),
            "payload": payload,
        }
    };
    collection
        .update_one(
            doc! { "_id": LKG_DB_DOCUMENT_ID },
            update,
            UpdateOptions::builder().upsert(true).build(),
        )
        .await?;
    Ok(())
}

fn document_to_envelope(document: Document) -> Option<LkgEnvelope> {
    let schema = document.get_str("schema").ok()?;
    if schema != LKG_SCHEMA_V2 {
        return None;
    }
    let payload = document.get("payload")?.clone();
    bson::from_bson(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use facilitator_core::schema::{MirrorEntry, Policies, ServiceConfig};
    use tempfile::tempdir;

    fn sample_map() -> MirrorMap {
        let mut map = MirrorMap::new();
        map.insert(
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
        );
        map
    }

    #[tokio::test]
    async fn ensure_exists_creates_an_empty_envelope_when_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("lkg.json");
        let store = LkgStore::new(&path, None);

        store.ensure_exists("req-1").await.unwrap();

        let loaded = store.try_load().await.unwrap();
        assert!(loaded.mirror.is_empty());
        assert_eq!(loaded.schema, LKG_SCHEMA_V2);
    }

    #[tokio::test]
    async fn ensure_exists_is_a_no_op_when_file_already_present() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lkg.json");
        let store = LkgStore::new(&path, None);

        store.save(sample_map(), "req-1").await.unwrap();
        store.ensure_exists("req-2").await.unwrap();

        let loaded = store.try_load().await.unwrap();
        assert_eq!(loaded.mirror.len(), 1);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_the_map() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lkg.json");
        let store = LkgStore::new(&path, None);

        store.save(sample_map(), "req-1").await.unwrap();
        let loaded = store.try_load().await.unwrap();

        assert_eq!(loaded.mirror, sample_map());
    }

    #[tokio::test]
    async fn save_leaves_no_temp_files_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lkg.json");
        let store = LkgStore::new(&path, None);

        store.save(sample_map(), "req-1").await.unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn try_load_returns_none_for_missing_file() {
        let dir = tempdir().unwrap();
        let store = LkgStore::new(dir.path().join("absent.json"), None);
        assert!(store.try_load().await.is_none());
    }

    #[tokio::test]
    async fn try_load_returns_none_for_corrupt_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lkg.json");
        std::fs::write(&path, b"not json").unwrap();
        let store = LkgStore::new(&path, None);
        assert!(store.try_load().await.is_none());
    }

    #[tokio::test]
    async fn try_load_returns_none_for_stale_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lkg.json");
        std::fs::write(&path, br#"{"schema":"mirror@v1","savedAt":"2026-01-01T00:00:00Z","requestId":"r","mirror":{}}"#).unwrap();
        let store = LkgStore::new(&path, None);
        assert!(store.try_load().await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_file_has_mode_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("lkg.json");
        let store = LkgStore::new(&path, None);
        store.save(sample_map(), "req-1").await.unwrap();

        let perms = fs::metadata(&path).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}
