//! `parseEdgePolicy` / `parseS2SPolicy`: normalize and validate a raw
//! `RoutePolicy` document, enforcing the Edge/S2S discriminant.

use facilitator_core::error::{ValidationFailure, ValidationReason};
use facilitator_core::schema::RoutePolicy;
use facilitator_core::types::{HttpMethod, PolicyType};
use serde_json::Value;

use crate::fields;

fn parse_common(
    obj: &serde_json::Map<String, Value>,
    expected: PolicyType,
) -> Result<RoutePolicy, ValidationFailure> {
    let raw_type = fields::get_str(obj, "type")?;
    let actual = match raw_type.as_str() {
        "Edge" => PolicyType::Edge,
        "S2S" => PolicyType::S2S,
        other => {
            return Err(ValidationFailure::new(
                ValidationReason::ChildWrongType,
                format!("unknown policy type '{other}'"),
            ))
        }
    };
    if actual != expected {
        return Err(ValidationFailure::new(
            ValidationReason::ChildWrongType,
            format!("expected {expected} policy, got {actual}"),
        ));
    }

    let id = fields::normalize_id(obj, "id")?;
    let svcconfig_id = fields::normalize_id(obj, "svcconfigId")?;
    let slug = fields::get_str(obj, "slug")?;
    let raw_method = fields::get_str(obj, "method")?;
    let method = HttpMethod::parse(&raw_method).ok_or_else(|| {
        ValidationFailure::new(ValidationReason::BadMethod, format!("unknown HTTP method '{raw_method}'"))
    })?;
    let path = fields::get_str(obj, "path")?;
    let enabled = fields::get_bool(obj, "enabled")?;
    let updated_at = fields::normalize_timestamp(obj, "updatedAt")?;
    let min_access_level = fields::get_opt_i64(obj, "minAccessLevel")?;

    Ok(RoutePolicy {
        id,
        svcconfig_id,
        policy_type: actual,
        slug,
        method,
        path,
        enabled,
        updated_at,
        min_access_level,
        bearer_required: None,
        allowed_callers: None,
        scopes: None,
    })
}

/// Parse a raw document that must be an Edge policy (`bearerRequired`
/// required, S2S-only fields absent).
pub fn parse_edge_policy(raw: &Value) -> Result<RoutePolicy, ValidationFailure> {
    let obj = fields::as_object(raw, None)?;
    let mut policy = parse_common(obj, PolicyType::Edge)?;
    policy.bearer_required = Some(fields::get_bool(obj, "bearerRequired")?);
    Ok(policy)
}

/// Parse a raw document that must be an S2S policy (`allowedCallers` and
/// `scopes` optional string arrays, Edge-only fields absent).
pub fn parse_s2s_policy(raw: &Value) -> Result<RoutePolicy, ValidationFailure> {
    let obj = fields::as_object(raw, None)?;
    let mut policy = parse_common(obj, PolicyType::S2S)?;
    policy.allowed_callers = fields::get_opt_strings(obj, "allowedCallers")?;
    policy.scopes = fields::get_opt_strings(obj, "scopes")?;
    Ok(policy)
}

/// Dispatch on the document's own `type` field, used when parsing a mixed
/// array that must then be partitioned and checked for homogeneity by the
/// caller (see [`crate::mirror::parse_mirror`]).
pub fn parse_policy(raw: &Value) -> Result<RoutePolicy, ValidationFailure> {
    let obj = fields::as_object(raw, None)?;
    match obj.get("type").and_then(Value::as_str) {
        Some("Edge") => parse_edge_policy(raw),
        Some("S2S") => parse_s2s_policy(raw),
        Some(other) => Err(ValidationFailure::new(
            ValidationReason::ChildWrongType,
            format!("unknown policy type '{other}'"),
        )),
        None => Err(ValidationFailure::new(
            ValidationReason::ChildWrongType,
            "policy document is missing 'type'",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_edge() -> Value {
        json!({
            "id": "p-1",
            "svcconfigId": "id-1",
            "type": "Edge",
            "slug": "auth-login",
            "method": "POST",
            "path": "/login",
            "enabled": true,
            "updatedAt": "2026-01-01T00:00:00Z",
            "bearerRequired": true,
        })
    }

    fn valid_s2s() -> Value {
        json!({
            "id": "p-2",
            "svcconfigId": "id-1",
            "type": "S2S",
            "slug": "auth-introspect",
            "method": "POST",
            "path": "/introspect",
            "enabled": true,
            "updatedAt": "2026-01-01T00:00:00Z",
            "allowedCallers": ["gateway"],
            "scopes": ["auth:read"],
        })
    }

    #[test]
    fn parses_edge_policy() {
        let p = parse_edge_policy(&valid_edge()).unwrap();
        assert!(p.is_edge());
        assert_eq!(p.bearer_required, Some(true));
    }

    #[test]
    fn parses_s2s_policy() {
        let p = parse_s2s_policy(&valid_s2s()).unwrap();
        assert!(p.is_s2s());
        assert_eq!(p.allowed_callers, Some(vec!["gateway".to_string()]));
    }

    #[test]
    fn rejects_edge_policy_fed_to_s2s_parser() {
        let err = parse_s2s_policy(&valid_edge()).unwrap_err();
        assert_eq!(err.reason, ValidationReason::ChildWrongType);
    }

    #[test]
    fn rejects_unknown_method() {
        let mut raw = valid_edge();
        raw["method"] = json!("TRACE");
        let err = parse_edge_policy(&raw).unwrap_err();
        assert_eq!(err.reason, ValidationReason::BadMethod);
    }

    #[test]
    fn dispatching_parser_picks_the_right_variant() {
        assert!(parse_policy(&valid_edge()).unwrap().is_edge());
        assert!(parse_policy(&valid_s2s()).unwrap().is_s2s());
    }
}
