//! `parseParent`: normalize and validate a raw `ServiceConfig` document.

use facilitator_core::error::{ValidationFailure, ValidationReason};
use facilitator_core::schema::ServiceConfig;
use serde_json::Value;

use crate::fields;

/// Regex for the slug shape is owned by `facilitator_core::key`; this
/// function only needs to reject uppercase/underscore slugs before handing
/// off to `svc_key` for the final canonical-key check by the caller.
fn validate_slug(slug: &str) -> Result<(), ValidationFailure> {
    let ok = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ValidationFailure::new(
            ValidationReason::BadSlug,
            format!("'{slug}' must match [a-z0-9-]+"),
        ))
    }
}

/// Parse and validate one raw parent document into a [`ServiceConfig`].
///
/// Enforces every field the data model names in strict mode: `enabled` and
/// `internalOnly` must be JSON booleans (no truthy/falsey coercion),
/// `baseUrl` must parse as an absolute URL, `outboundApiPrefix` must match
/// the path regex, and `updatedAt` is normalized from either an ISO-8601
/// string or epoch millis.
pub fn parse_parent(raw: &Value) -> Result<ServiceConfig, ValidationFailure> {
    let obj = fields::as_object(raw, None)?;

    let id = fields::normalize_id(obj, "id")?;
    let slug = fields::get_str(obj, "slug")?;
    validate_slug(&slug)?;
    let version = fields::get_u32(obj, "version")?;
    let enabled = fields::get_bool(obj, "enabled")?;
    let internal_only = fields::get_bool(obj, "internalOnly")?;
    let base_url = fields::get_str(obj, "baseUrl")?;
    fields::validate_base_url(&base_url)?;
    let outbound_api_prefix = fields::get_str(obj, "outboundApiPrefix")?;
    fields::validate_outbound_prefix(&outbound_api_prefix)?;
    let expose_health = fields::get_bool(obj, "exposeHealth")?;
    let updated_at = fields::normalize_timestamp(obj, "updatedAt")?;
    let updated_by = fields::get_str(obj, "updatedBy")?;
    let notes = fields::get_opt_str(obj, "notes")?;

    let config = ServiceConfig {
        id,
        slug,
        version,
        enabled,
        internal_only,
        base_url,
        outbound_api_prefix,
        expose_health,
        updated_at,
        updated_by,
        notes,
    };

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_raw() -> Value {
        json!({
            "id": "id-1",
            "slug": "auth",
            "version": 1,
            "enabled": true,
            "internalOnly": false,
            "baseUrl": "https://auth.internal:8443",
            "outboundApiPrefix": "/auth",
            "exposeHealth": true,
            "updatedAt": "2026-01-01T00:00:00Z",
            "updatedBy": "operator",
        })
    }

    #[test]
    fn parses_a_well_formed_parent() {
        let cfg = parse_parent(&valid_raw()).unwrap();
        assert_eq!(cfg.slug, "auth");
        assert_eq!(cfg.version, 1);
        assert!(cfg.enabled);
        assert!(!cfg.internal_only);
    }

    #[test]
    fn rejects_truthy_enabled_instead_of_strict_boolean() {
        let mut raw = valid_raw();
        raw["enabled"] = json!(1);
        let err = parse_parent(&raw).unwrap_err();
        assert_eq!(err.reason, ValidationReason::BadBoolean);
    }

    #[test]
    fn rejects_string_enabled() {
        let mut raw = valid_raw();
        raw["enabled"] = json!("true");
        assert!(parse_parent(&raw).is_err());
    }

    #[test]
    fn rejects_relative_base_url() {
        let mut raw = valid_raw();
        raw["baseUrl"] = json!("auth.internal:8443");
        let err = parse_parent(&raw).unwrap_err();
        assert_eq!(err.reason, ValidationReason::BadUrl);
    }

    #[test]
    fn rejects_prefix_with_trailing_slash() {
        let mut raw = valid_raw();
        raw["outboundApiPrefix"] = json!("/auth/");
        let err = parse_parent(&raw).unwrap_err();
        assert_eq!(err.reason, ValidationReason::BadPrefix);
    }

    #[test]
    fn rejects_uppercase_slug() {
        let mut raw = valid_raw();
        raw["slug"] = json!("Auth");
        let err = parse_parent(&raw).unwrap_err();
        assert_eq!(err.reason, ValidationReason::BadSlug);
    }

    #[test]
    fn normalizes_numeric_id() {
        let mut raw = valid_raw();
        raw["id"] = json!(42);
        let cfg = parse_parent(&raw).unwrap();
        assert_eq!(cfg.id, "42");
    }

    #[test]
    fn normalizes_extended_json_oid() {
        let mut raw = valid_raw();
        raw["id"] = json!({ "$oid": "507f1f77bcf86cd799439011" });
        let cfg = parse_parent(&raw).unwrap();
        assert_eq!(cfg.id, "507f1f77bcf86cd799439011");
    }

    #[test]
    fn normalizes_epoch_millis_timestamp() {
        let mut raw = valid_raw();
        raw["updatedAt"] = json!(1_735_689_600_000i64);
        assert!(parse_parent(&raw).is_ok());
    }
}
