//! `parseMirror`: normalize and validate a raw keyed mirror document.

use facilitator_core::error::{ValidationFailure, ValidationReason};
use facilitator_core::key::svc_key;
use facilitator_core::schema::{MirrorEntry, MirrorMap, Policies};
use serde_json::Value;

use crate::fields;
use crate::parent::parse_parent;
use crate::policy::{parse_edge_policy, parse_s2s_policy};

/// Parse a raw `{ "<key>": { serviceConfig, policies }, ... }` document into
/// a validated [`MirrorMap`].
///
/// Rejects arrays, `null`, and any non-object top level. Each entry's key
/// must equal `svcKey(parent.slug, parent.version)`, and every child policy
/// must reference the same parent id it is nested under. Arrays that mix
/// policy types (an `Edge` document under `policies.s2s` or vice versa) are
/// rejected, since each list is parsed with its own dedicated parser.
pub fn parse_mirror(raw: &Value) -> Result<MirrorMap, ValidationFailure> {
    let obj = fields::as_object(raw, None)?;

    let mut map = MirrorMap::new();
    for (key, entry_raw) in obj {
        let entry = parse_entry(entry_raw).map_err(|f| f.with_key(key.clone()))?;

        let expected_key = svc_key(&entry.service_config.slug, entry.service_config.version)
            .map_err(|_| {
                ValidationFailure::new(ValidationReason::KeyMismatch, "parent slug/version produced no canonical key")
                    .with_key(key.clone())
            })?;
        if *key != expected_key {
            return Err(ValidationFailure::new(
                ValidationReason::KeyMismatch,
                format!("key '{key}' does not match parent slug/version ('{expected_key}')"),
            )
            .with_key(key.clone()));
        }

        map.insert(key.clone(), entry);
    }

    Ok(map)
}

fn parse_entry(raw: &Value) -> Result<MirrorEntry, ValidationFailure> {
    let obj = fields::as_object(raw, None)?;

    let service_config_raw = obj.get("serviceConfig").ok_or_else(|| {
        ValidationFailure::new(ValidationReason::NotAnObject, "entry is missing 'serviceConfig'")
    })?;
    let service_config = parse_parent(service_config_raw)?;

    if !service_config.enabled || service_config.internal_only {
        return Err(ValidationFailure::new(
            ValidationReason::ServiceDisabled,
            format!(
                "entry for '{}' must have enabled=true and internalOnly=false, a mirror only holds visible entries",
                service_config.id
            ),
        ));
    }

    let policies_raw = obj.get("policies").ok_or_else(|| {
        ValidationFailure::new(ValidationReason::NotAnObject, "entry is missing 'policies'")
    })?;
    let policies_obj = fields::as_object(policies_raw, None)?;

    let edge = parse_policy_array(policies_obj, "edge", parse_edge_policy, &service_config.id)?;
    let s2s = parse_policy_array(policies_obj, "s2s", parse_s2s_policy, &service_config.id)?;

    Ok(MirrorEntry {
        service_config,
        policies: Policies { edge, s2s },
    })
}

fn parse_policy_array(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    parse_one: fn(&Value) -> Result<facilitator_core::schema::RoutePolicy, ValidationFailure>,
    parent_id: &str,
) -> Result<Vec<facilitator_core::schema::RoutePolicy>, ValidationFailure> {
    let items = match obj.get(field) {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ValidationFailure::new(
                ValidationReason::ChildWrongType,
                format!("'policies.{field}' must be an array"),
            ))
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let policy = parse_one(item)?;
        if policy.svcconfig_id != parent_id {
            return Err(ValidationFailure::new(
                ValidationReason::ChildWrongParent,
                format!(
                    "policy '{}' references svcconfigId '{}', expected '{}'",
                    policy.id, policy.svcconfig_id, parent_id
                ),
            ));
        }
        if !policy.enabled {
            return Err(ValidationFailure::new(
                ValidationReason::ServiceDisabled,
                format!("policy '{}' is disabled, a mirror only holds enabled policies", policy.id),
            ));
        }
        out.push(policy);
    }
    Ok(out)
}
