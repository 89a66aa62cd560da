//! Audit Sweep: periodically compares the configuration database's full
//! parent collection against the in-memory mirror and logs discrepancies.
//! Never throws; a failure to reach the database is a warning, not a crash.

use std::sync::Arc;
use std::time::Duration;

use facilitator_validation::parse_parent;
use mongodb::bson::Document;
use mongodb::Collection;
use tracing::{info, warn};

use crate::mirror_store::MirrorStore;

#[derive(Debug, Default)]
struct Buckets {
    included: Vec<String>,
    disabled: Vec<String>,
    internal_only: Vec<String>,
    invalid: Vec<String>,
}

/// Runs one sweep: walks the full parent collection, buckets each document,
/// and compares the `included` bucket against the mirror's current keys.
pub struct AuditSweep {
    configs: Collection<Document>,
    store: Arc<MirrorStore>,
}

impl AuditSweep {
    pub fn new(configs: Collection<Document>, store: Arc<MirrorStore>) -> Self {
        Self { configs, store }
    }

    /// Spawn a background task that sweeps on `interval`, logging summaries
    /// until the returned handle is aborted (typically at shutdown).
    pub fn spawn(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        })
    }

    /// Run a single sweep on demand. Never returns an error: all failure
    /// modes degrade to a warning log line.
    pub async fn sweep_once(&self) {
        let buckets = match self.bucket_database().await {
            Ok(buckets) => buckets,
            Err(err) => {
                warn!(error = %err, "audit sweep could not read the configuration database");
                return;
            }
        };

        let snapshot = self.store.get_with_ttl().await;
        let mirror_keys: std::collections::HashSet<&String> = snapshot.map.keys().collect();
        let included_keys: std::collections::HashSet<&String> = buckets.included.iter().collect();

        let missing_from_mirror: Vec<&&String> = included_keys.difference(&mirror_keys).collect();
        let extra_in_mirror: Vec<&&String> = mirror_keys.difference(&included_keys).collect();

        info!(
            included = buckets.included.len(),
            disabled = buckets.disabled.len(),
            internal_only = buckets.internal_only.len(),
            invalid = buckets.invalid.len(),
            mirror_size = mirror_keys.len(),
            "audit sweep completed"
        );

        if !missing_from_mirror.is_empty() || !extra_in_mirror.is_empty() {
            warn!(
                missing_examples = ?missing_from_mirror.iter().take(10).collect::<Vec<_>>(),
                extra_examples = ?extra_in_mirror.iter().take(10).collect::<Vec<_>>(),
                disabled_examples = ?buckets.disabled.iter().take(10).collect::<Vec<_>>(),
                internal_only_examples = ?buckets.internal_only.iter().take(10).collect::<Vec<_>>(),
                invalid_examples = ?buckets.invalid.iter().take(10).collect::<Vec<_>>(),
                "audit sweep detected drift between the database and the mirror"
            );
        }
    }

    async fn bucket_database(&self) -> Result<Buckets, mongodb::error::Error> {
        use futures::stream::TryStreamExt;

        let mut cursor = self.configs.find(Document::new(), None).await?;
        let mut buckets = Buckets::default();

        while let Some(document) = cursor.try_next().await? {
            match classify_document(&document) {
                Classification::Included(key) => buckets.included.push(key),
                Classification::Disabled(label) => buckets.disabled.push(label),
                Classification::InternalOnly(label) => buckets.internal_only.push(label),
                Classification::Invalid(label) => buckets.invalid.push(label),
            }
        }

        Ok(buckets)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Classification {
    /// Visible and enabled; carries the canonical `svcKey`, not just the slug.
    Included(String),
    Disabled(String),
    InternalOnly(String),
    Invalid(String),
}

/// Bucket one raw parent document, the pure decision the async `bucket_database`
/// loop above defers to so it can be unit-tested without a live database.
///
/// `internalOnly` wins over `disabled` when both are true: a document that is
/// both internal-only and disabled is reported in the `internal_only` bucket,
/// never `disabled`, since internal visibility is the more specific reason
/// the facilitator would never have included it.
fn classify_document(document: &Document) -> Classification {
    let label = document
        .get_str("slug")
        .map(|s| s.to_string())
        .unwrap_or_else(|_| "?".to_string());

    let enabled = document.get_bool("enabled").unwrap_or(false);
    let internal_only = document.get_bool("internalOnly").unwrap_or(true);

    let parent_value: Result<serde_json::Value, _> =
        bson::from_bson(mongodb::bson::Bson::Document(document.clone()));

    let parsed = match parent_value.ok().and_then(|v| parse_parent(&v).ok()) {
        Some(parsed) => parsed,
        None => return Classification::Invalid(label),
    };

    if internal_only {
        return Classification::InternalOnly(label);
    }
    if !enabled {
        return Classification::Disabled(label);
    }

    let key = facilitator_core::key::svc_key(&parsed.slug, parsed.version).unwrap_or(label);
    Classification::Included(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_default_to_empty() {
        let buckets = Buckets::default();
        assert!(buckets.included.is_empty());
        assert!(buckets.disabled.is_empty());
        assert!(buckets.internal_only.is_empty());
        assert!(buckets.invalid.is_empty());
    }

    fn well_formed_parent(slug: &str, enabled: bool, internal_only: bool) -> Document {
        mongodb::bson::doc! {
            "id": "id-1",
            "slug": slug,
            "version": 1,
            "enabled": enabled,
            "internalOnly": internal_only,
            "baseUrl": "https://auth.internal",
            "outboundApiPrefix": "/auth",
            "exposeHealth": true,
            "updatedAt": "2026-01-01T00:00:00Z",
            "updatedBy": "operator",
        }
    }

    #[test]
    fn visible_enabled_parent_is_included_with_its_svc_key() {
        let doc = well_formed_parent("auth", true, false);
        assert_eq!(classify_document(&doc), Classification::Included("auth@1".to_string()));
    }

    #[test]
    fn disabled_but_externally_visible_parent_is_bucketed_disabled() {
        let doc = well_formed_parent("auth", false, false);
        assert_eq!(classify_document(&doc), Classification::Disabled("auth".to_string()));
    }

    #[test]
    fn internal_only_enabled_parent_is_bucketed_internal_only() {
        let doc = well_formed_parent("auth", true, true);
        assert_eq!(classify_document(&doc), Classification::InternalOnly("auth".to_string()));
    }

    #[test]
    fn internal_only_wins_over_disabled_when_both_are_true() {
        let doc = well_formed_parent("auth", false, true);
        assert_eq!(classify_document(&doc), Classification::InternalOnly("auth".to_string()));
    }

    #[test]
    fn malformed_parent_is_bucketed_invalid() {
        let mut doc = well_formed_parent("auth", true, false);
        doc.insert("enabled", "yes");
        assert_eq!(classify_document(&doc), Classification::Invalid("auth".to_string()));
    }

    #[test]
    fn document_missing_slug_falls_back_to_placeholder_label() {
        let doc = mongodb::bson::doc! {
            "enabled": "not-a-bool",
        };
        assert_eq!(classify_document(&doc), Classification::Invalid("?".to_string()));
    }
}
