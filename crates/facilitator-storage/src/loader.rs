//! DB Loader: a single aggregation over the parent/policy collections,
//! strictly validated and grouped into a [`MirrorMap`].

use facilitator_core::error::ValidationReason;
use facilitator_core::key::svc_key;
use facilitator_core::schema::{MirrorEntry, MirrorMap, Policies};
use facilitator_validation::{parse_parent, parse_policy};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::AggregateOptions;
use mongodb::Collection;

use crate::error::StorageError;

/// Abstraction over "something that can produce a fresh [`LoadOutcome`]",
/// so the Mirror Store can depend on this trait rather than the concrete
/// Mongo-backed loader, the same way the rest of this workspace puts
/// `async_trait` boundaries at component seams.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self) -> Result<LoadOutcome, StorageError>;
}

/// Result of one `DbLoader::load()` call.
pub struct LoadOutcome {
    pub map: MirrorMap,
    pub raw_count: usize,
    pub active_count: usize,
    /// Non-fatal normalization warnings encountered on documents that were
    /// still usable; the hard-failure path does not populate this and
    /// instead returns `Err` directly (fail-fast, see below).
    pub errors: Vec<String>,
}

/// Reads visible, enabled parents and their enabled policies from the
/// configuration database via a single left-join aggregation, and produces
/// a validated [`MirrorMap`].
///
/// Strict by design: if any visible parent's fields are malformed the whole
/// load fails rather than silently dropping the bad record, so upstream
/// data quality problems get fixed at the source instead of masked here.
pub struct DbLoader {
    configs: Collection<Document>,
    policies: Collection<Document>,
}

impl DbLoader {
    pub fn new(configs: Collection<Document>, policies: Collection<Document>) -> Self {
        Self { configs, policies }
    }

    /// Idempotently create the indexes this loader's hot paths expect.
    /// Safe to call on every boot; `mongodb`'s `create_index` is a no-op
    /// when an equivalent index already exists.
    pub async fn ensure_indexes(&self) -> Result<(), StorageError> {
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        self.configs
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "slug": 1, "version": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;

        self.policies
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "svcconfigId": 1, "type": 1, "method": 1, "path": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;

        self.policies
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "svcconfigId": 1, "enabled": 1, "type": 1 })
                    .build(),
            )
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl Loader for DbLoader {
    /// Run the aggregation and produce a validated mirror map.
    ///
    /// On malformed visible-parent data, fails the entire load and returns
    /// an error naming up to five example keys so the operator can find the
    /// bad records quickly.
    async fn load(&self) -> Result<LoadOutcome, StorageError> {
        let pipeline = vec![
            doc! { "$match": { "internalOnly": false, "enabled": true } },
            doc! {
                "$lookup": {
                    "from": self.policies.name(),
                    "let": { "parent_id": "$_id" },
                    "pipeline": [
                        { "$match": {
                            "$expr": { "$eq": ["$svcconfigId", "$$parent_id"] },
                            "enabled": true,
                        } },
                    ],
                    "as": "policies",
                },
            },
        ];

        let mut cursor = self
            .configs
            .aggregate(pipeline, AggregateOptions::builder().build())
            .await?;

        let mut map = MirrorMap::new();
        let mut raw_count = 0usize;
        let mut bad_keys: Vec<String> = Vec::new();

        while let Some(document) = cursor.try_next().await? {
            raw_count += 1;
            match parse_joined_document(&document) {
                Ok((key, entry)) => {
                    map.insert(key, entry);
                }
                Err(_) => {
                    bad_keys.push(document_label(&document));
                    if bad_keys.len() >= 5 {
                        break;
                    }
                }
            }
        }

        if !bad_keys.is_empty() {
            return Err(StorageError::Loader(format!(
                "loader failed strict validation for {} document(s), examples: {}",
                bad_keys.len(),
                bad_keys.join(", ")
            )));
        }

        let active_count = map.len();
        Ok(LoadOutcome {
            map,
            raw_count,
            active_count,
            errors: Vec::new(),
        })
    }
}

/// Stand-in loader used when the configuration database pointers (`DB_URI`
/// et al.) are absent: the DB path is disabled, so every refresh reports
/// zero eligible parents and the Mirror Store's cascade falls straight
/// through to the filesystem/database LKG.
pub struct NullLoader;

#[async_trait::async_trait]
impl Loader for NullLoader {
    async fn load(&self) -> Result<LoadOutcome, StorageError> {
        Ok(LoadOutcome {
            map: MirrorMap::new(),
            raw_count: 0,
            active_count: 0,
            errors: Vec::new(),
        })
    }
}

fn document_label(document: &Document) -> String {
    let slug = document.get_str("slug").unwrap_or("?");
    let version = document
        .get("version")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string());
    format!("{slug}@{version}")
}

fn parse_joined_document(document: &Document) -> Result<(String, MirrorEntry), StorageError> {
    let parent_value: serde_json::Value = bson::from_bson(Bson::Document(document.clone()))?;
    let service_config = parse_parent(&parent_value).map_err(StorageError::Validation)?;

    let key = svc_key(&service_config.slug, service_config.version)
        .map_err(|_| facilitator_core::error::ValidationFailure::new(ValidationReason::KeyMismatch, "invalid slug/version"))
        .map_err(StorageError::Validation)?;

    let policies_bson = document.get_array("policies").cloned().unwrap_or_default();
    let mut edge = Vec::new();
    let mut s2s = Vec::new();

    for raw in &policies_bson {
        let raw_value: serde_json::Value = bson::from_bson(raw.clone())?;
        let policy = parse_policy(&raw_value).map_err(StorageError::Validation)?;
        if policy.svcconfig_id != service_config.id {
            return Err(StorageError::Validation(
                facilitator_core::error::ValidationFailure::new(
                    ValidationReason::ChildWrongParent,
                    "policy references a different parent than the join produced",
                ),
            ));
        }
        if policy.is_edge() {
            edge.push(policy);
        } else {
            s2s.push(policy);
        }
    }

    Ok((
        key,
        MirrorEntry {
            service_config,
            policies: Policies { edge, s2s },
        },
    ))
}
