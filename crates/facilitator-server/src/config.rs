//! Configuration loading: the one place in this workspace that reads the
//! process environment. Every deeper component is handed already-resolved
//! values instead of reaching for environment variables itself.

use std::path::PathBuf;

use serde::Deserialize;

/// Facilitator settings sourced from the process environment, plus the
/// ambient server/observability settings (listen address/port, shutdown
/// drain timeout, log format) every component downstream needs resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct FacilitatorConfig {
    /// Absolute or process-root-relative path to the LKG snapshot file.
    pub lkg_path: PathBuf,

    /// Configuration database connection string. Absent disables the DB
    /// load path entirely; boot then relies on LKG alone.
    #[serde(default)]
    pub db_uri: Option<String>,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub collection_configs: Option<String>,
    #[serde(default)]
    pub collection_policies: Option<String>,
    #[serde(default)]
    pub collection_lkg: Option<String>,

    /// In-memory freshness window for the Mirror Store.
    pub mirror_ttl_ms: u64,

    /// Negative-cache TTL for a keyed "not found" answer. Absent disables
    /// the negative cache; the canonical path (full-mirror refresh, per-key
    /// lookup from that map) still works without it.
    #[serde(default)]
    pub negative_ttl_ms: Option<u64>,

    /// LRU bound for the negative cache. Required alongside `negative_ttl_ms`
    /// if that is set; ignored otherwise.
    #[serde(default)]
    pub max_entries: Option<u64>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,

    #[serde(default = "default_shutdown_timeout_seconds")]
    pub shutdown_timeout_seconds: u64,

    /// Audit Sweep interval. Absent disables the periodic background sweep;
    /// the sweep can still be run on demand.
    #[serde(default)]
    pub audit_sweep_interval_ms: Option<u64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_base_path() -> String {
    "/api/facilitator/v1".to_string()
}

fn default_shutdown_timeout_seconds() -> u64 {
    30
}

impl FacilitatorConfig {
    /// Load from environment variables, case-insensitive, using flat names
    /// (`LKG_PATH`, `DB_URI`, `MIRROR_TTL_MS`, ...).
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("log_level", default_log_level())?
            .set_default("listen_addr", default_listen_addr())?
            .set_default("http_port", default_http_port() as i64)?
            .set_default("metrics_port", default_metrics_port() as i64)?
            .set_default("base_path", default_base_path())?
            .set_default("shutdown_timeout_seconds", default_shutdown_timeout_seconds() as i64)?
            .add_source(config::Environment::default().try_parsing(true));

        builder.build()?.try_deserialize()
    }

    /// Validate the configuration envelope before boot proceeds past
    /// `env_validated`: `LKG_PATH` and `MIRROR_TTL_MS` are always required;
    /// the DB pointers are either all present or all absent, since a
    /// partial set cannot open a usable connection.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.lkg_path.as_os_str().is_empty() {
            errors.push("LKG_PATH is required".to_string());
        }
        if self.mirror_ttl_ms == 0 {
            errors.push("MIRROR_TTL_MS must be a positive integer".to_string());
        }

        let db_fields = [
            ("DB_URI", self.db_uri.is_some()),
            ("DB_NAME", self.db_name.is_some()),
            ("COLLECTION_CONFIGS", self.collection_configs.is_some()),
            ("COLLECTION_POLICIES", self.collection_policies.is_some()),
            ("COLLECTION_LKG", self.collection_lkg.is_some()),
        ];
        let present = db_fields.iter().filter(|(_, set)| *set).count();
        if present != 0 && present != db_fields.len() {
            let missing: Vec<&str> = db_fields
                .iter()
                .filter(|(_, set)| !*set)
                .map(|(name, _)| *name)
                .collect();
            errors.push(format!(
                "database pointers are partially configured; missing {}",
                missing.join(", ")
            ));
        }

        if self.negative_ttl_ms.is_some() && self.max_entries.is_none() {
            errors.push("MAX_ENTRIES is required when NEGATIVE_TTL_MS is set".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn db_configured(&self) -> bool {
        self.db_uri.is_some()
    }

    pub fn negative_cache_configured(&self) -> bool {
        self.negative_ttl_ms.is_some() && self.max_entries.is_some()
    }

    /// Redacted, human-readable summary logged once at boot.
    pub fn print_summary(&self) {
        tracing::info!("===========================================");
        tracing::info!("Service Facilitator configuration");
        tracing::info!("===========================================");
        tracing::info!(path = %self.lkg_path.display(), "LKG file");
        tracing::info!(
            configured = self.db_configured(),
            db_name = ?self.db_name,
            "configuration database"
        );
        tracing::info!(mirror_ttl_ms = self.mirror_ttl_ms, "mirror TTL");
        tracing::info!(
            negative_cache = self.negative_cache_configured(),
            negative_ttl_ms = ?self.negative_ttl_ms,
            max_entries = ?self.max_entries,
            "negative cache"
        );
        tracing::info!(
            listen = format!("{}:{}", self.listen_addr, self.http_port),
            metrics_port = self.metrics_port,
            base_path = %self.base_path,
            "HTTP surface"
        );
        tracing::info!(
            audit_sweep_interval_ms = ?self.audit_sweep_interval_ms,
            "audit sweep"
        );
        tracing::info!("===========================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> FacilitatorConfig {
        FacilitatorConfig {
            lkg_path: PathBuf::from("/tmp/lkg.json"),
            db_uri: None,
            db_name: None,
            collection_configs: None,
            collection_policies: None,
            collection_lkg: None,
            mirror_ttl_ms: 30_000,
            negative_ttl_ms: None,
            max_entries: None,
            log_level: default_log_level(),
            listen_addr: default_listen_addr(),
            http_port: default_http_port(),
            metrics_port: default_metrics_port(),
            base_path: default_base_path(),
            shutdown_timeout_seconds: default_shutdown_timeout_seconds(),
            audit_sweep_interval_ms: None,
        }
    }

    #[test]
    fn minimal_config_validates() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_zero_ttl() {
        let mut config = base_config();
        config.mirror_ttl_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_partial_db_configuration() {
        let mut config = base_config();
        config.db_uri = Some("mongodb://localhost".to_string());
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("DB_NAME")));
    }

    #[test]
    fn accepts_fully_configured_db() {
        let mut config = base_config();
        config.db_uri = Some("mongodb://localhost".to_string());
        config.db_name = Some("facilitator".to_string());
        config.collection_configs = Some("serviceConfigs".to_string());
        config.collection_policies = Some("routePolicies".to_string());
        config.collection_lkg = Some("lkgMirror".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_negative_ttl_without_max_entries() {
        let mut config = base_config();
        config.negative_ttl_ms = Some(5_000);
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("MAX_ENTRIES")));
    }
}
