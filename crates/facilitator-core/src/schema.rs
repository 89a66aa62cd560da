//! The combined snapshot data model: parents (`ServiceConfig`), children
//! (`RoutePolicy`), and the keyed map the rest of the workspace passes
//! around as the authoritative directory.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{HttpMethod, PolicyType, Source};

/// A service version and its network location. The parent half of a
/// [`MirrorEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub id: String,
    pub slug: String,
    pub version: u32,
    pub enabled: bool,
    #[serde(rename = "internalOnly")]
    pub internal_only: bool,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "outboundApiPrefix")]
    pub outbound_api_prefix: String,
    #[serde(rename = "exposeHealth")]
    pub expose_health: bool,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "updatedBy")]
    pub updated_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A routing/authorization rule owned by a parent [`ServiceConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePolicy {
    pub id: String,
    #[serde(rename = "svcconfigId")]
    pub svcconfig_id: String,
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    pub slug: String,
    pub method: HttpMethod,
    pub path: String,
    pub enabled: bool,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "minAccessLevel", default, skip_serializing_if = "Option::is_none")]
    pub min_access_level: Option<i64>,
    /// Edge-only. `None` on S2S policies.
    #[serde(rename = "bearerRequired", default, skip_serializing_if = "Option::is_none")]
    pub bearer_required: Option<bool>,
    /// S2S-only. `None` on Edge policies.
    #[serde(rename = "allowedCallers", default, skip_serializing_if = "Option::is_none")]
    pub allowed_callers: Option<Vec<String>>,
    /// S2S-only. `None` on Edge policies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

impl RoutePolicy {
    pub fn is_edge(&self) -> bool {
        matches!(self.policy_type, PolicyType::Edge)
    }

    pub fn is_s2s(&self) -> bool {
        matches!(self.policy_type, PolicyType::S2S)
    }
}

/// The policies owned by one parent, split by discriminant so downstream
/// code never has to re-check `policy_type` after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policies {
    #[serde(default)]
    pub edge: Vec<RoutePolicy>,
    #[serde(default)]
    pub s2s: Vec<RoutePolicy>,
}

/// One resolvable directory record: a service version plus its policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorEntry {
    #[serde(rename = "serviceConfig")]
    pub service_config: ServiceConfig,
    pub policies: Policies,
}

/// Keyed map from canonical `svcKey` to [`MirrorEntry`]. Backed by a
/// `BTreeMap` so iteration order is deterministic (useful for the audit
/// sweep's example lists and for golden-output tests), even though the
/// contract only requires key uniqueness, not ordering.
pub type MirrorMap = BTreeMap<String, MirrorEntry>;

/// A mirror plus its provenance and fetch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub map: MirrorMap,
    pub source: Source,
    #[serde(rename = "fetchedAt")]
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn empty(source: Source, fetched_at: DateTime<Utc>) -> Self {
        Self {
            map: MirrorMap::new(),
            source,
            fetched_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

/// The on-disk / on-DB LKG envelope, schema-tagged per the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LkgEnvelope {
    pub schema: String,
    #[serde(rename = "savedAt")]
    pub saved_at: DateTime<Utc>,
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub mirror: MirrorMap,
}

/// The only schema tag this implementation writes or accepts on read.
pub const LKG_SCHEMA_V2: &str = "mirror@v2";

/// Fixed document id for the LKG mirror in the configuration database.
pub const LKG_DB_DOCUMENT_ID: &str = "mirror@v2";

impl LkgEnvelope {
    pub fn new(mirror: MirrorMap, request_id: impl Into<String>, saved_at: DateTime<Utc>) -> Self {
        Self {
            schema: LKG_SCHEMA_V2.to_string(),
            saved_at,
            request_id: request_id.into(),
            mirror,
        }
    }

    pub fn is_current_schema(&self) -> bool {
        self.schema == LKG_SCHEMA_V2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ServiceConfig {
        ServiceConfig {
            id: "id-1".into(),
            slug: "auth".into(),
            version: 1,
            enabled: true,
            internal_only: false,
            base_url: "https://auth.internal:8443".into(),
            outbound_api_prefix: "/auth".into(),
            expose_health: true,
            updated_at: Utc::now(),
            updated_by: "operator".into(),
            notes: None,
        }
    }

    #[test]
    fn service_config_round_trips_through_json() {
        let cfg = sample_config();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServiceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
        assert!(json.contains("\"internalOnly\""));
        assert!(json.contains("\"baseUrl\""));
    }

    #[test]
    fn snapshot_reports_push_source_as_db_on_the_wire() {
        let snap = Snapshot::empty(Source::Push, Utc::now());
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"source\":\"db\""));
    }

    #[test]
    fn lkg_envelope_tags_current_schema() {
        let env = LkgEnvelope::new(MirrorMap::new(), "req-1", Utc::now());
        assert!(env.is_current_schema());

        let mut stale = env.clone();
        stale.schema = "mirror@v1".into();
        assert!(!stale.is_current_schema());
    }
}
