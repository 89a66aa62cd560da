//! Field-level extraction helpers shared by the parent and policy parsers.
//!
//! Every helper here enforces the "strict, no coercion" policy from the
//! loader's validation contract: a JSON boolean field must be `true`/`false`,
//! never `1`, `"true"`, or absent-with-default.

use chrono::{DateTime, Utc};
use serde_json::Value;
use url::Url;

use facilitator_core::error::{ValidationFailure, ValidationReason};

pub fn as_object<'a>(raw: &'a Value, key: Option<&str>) -> Result<&'a serde_json::Map<String, Value>, ValidationFailure> {
    raw.as_object().ok_or_else(|| {
        let mut f = ValidationFailure::new(
            ValidationReason::NotAnObject,
            "expected a JSON object",
        );
        if let Some(k) = key {
            f = f.with_key(k);
        }
        f
    })
}

pub fn get_str(obj: &serde_json::Map<String, Value>, field: &str) -> Result<String, ValidationFailure> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ValidationFailure::new(ValidationReason::BadId, format!("'{field}' must be a string"))
        })
}

pub fn get_opt_str(obj: &serde_json::Map<String, Value>, field: &str) -> Result<Option<String>, ValidationFailure> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationFailure::new(
            ValidationReason::BadId,
            format!("'{field}' must be a string or absent"),
        )),
    }
}

/// Normalize an id that may arrive as a plain string, a bare number, or a
/// Mongo extended-JSON `{"$oid": "..."}` wrapper, into a plain string. Any
/// other shape is rejected.
pub fn normalize_id(obj: &serde_json::Map<String, Value>, field: &str) -> Result<String, ValidationFailure> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Object(o)) => o
            .get("$oid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ValidationFailure::new(ValidationReason::BadId, format!("'{field}' has unrecognized id shape"))
            }),
        _ => Err(ValidationFailure::new(
            ValidationReason::BadId,
            format!("'{field}' must be a non-empty id"),
        )),
    }
}

/// Strict boolean: rejects numbers, strings, and missing fields outright.
pub fn get_bool(obj: &serde_json::Map<String, Value>, field: &str) -> Result<bool, ValidationFailure> {
    match obj.get(field) {
        Some(Value::Bool(b)) => Ok(*b),
        _ => Err(ValidationFailure::new(
            ValidationReason::BadBoolean,
            format!("'{field}' must be a strict boolean"),
        )),
    }
}

pub fn get_opt_bool(obj: &serde_json::Map<String, Value>, field: &str) -> Result<Option<bool>, ValidationFailure> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        _ => Err(ValidationFailure::new(
            ValidationReason::BadBoolean,
            format!("'{field}' must be a strict boolean or absent"),
        )),
    }
}

pub fn get_u32(obj: &serde_json::Map<String, Value>, field: &str) -> Result<u32, ValidationFailure> {
    obj.get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v >= 1)
        .ok_or_else(|| {
            ValidationFailure::new(
                ValidationReason::BadVersion,
                format!("'{field}' must be an integer >= 1"),
            )
        })
}

pub fn get_opt_i64(obj: &serde_json::Map<String, Value>, field: &str) -> Result<Option<i64>, ValidationFailure> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| ValidationFailure::new(ValidationReason::BadId, format!("'{field}' must be an integer"))),
    }
}

pub fn get_opt_strings(obj: &serde_json::Map<String, Value>, field: &str) -> Result<Option<Vec<String>>, ValidationFailure> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) => out.push(s.to_string()),
                    None => {
                        return Err(ValidationFailure::new(
                            ValidationReason::BadId,
                            format!("'{field}' must be an array of strings"),
                        ))
                    }
                }
            }
            Ok(Some(out))
        }
        Some(_) => Err(ValidationFailure::new(
            ValidationReason::BadId,
            format!("'{field}' must be an array of strings or absent"),
        )),
    }
}

/// Normalize a timestamp that may arrive as an ISO-8601 string or epoch
/// milliseconds, into a `DateTime<Utc>`.
pub fn normalize_timestamp(obj: &serde_json::Map<String, Value>, field: &str) -> Result<DateTime<Utc>, ValidationFailure> {
    match obj.get(field) {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| {
                ValidationFailure::new(ValidationReason::BadTimestamp, format!("'{field}' is not valid ISO-8601"))
            }),
        Some(Value::Number(n)) => {
            let millis = n
                .as_i64()
                .ok_or_else(|| ValidationFailure::new(ValidationReason::BadTimestamp, format!("'{field}' is not a valid epoch timestamp")))?;
            DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| ValidationFailure::new(ValidationReason::BadTimestamp, format!("'{field}' is out of range")))
        }
        _ => Err(ValidationFailure::new(
            ValidationReason::BadTimestamp,
            format!("'{field}' must be an ISO-8601 string or epoch millis"),
        )),
    }
}

pub fn validate_base_url(url: &str) -> Result<(), ValidationFailure> {
    let parsed = Url::parse(url).map_err(|_| {
        ValidationFailure::new(ValidationReason::BadUrl, format!("'{url}' is not an absolute URL"))
    })?;
    if parsed.host_str().is_none() {
        return Err(ValidationFailure::new(
            ValidationReason::BadUrl,
            format!("'{url}' has no host"),
        ));
    }
    Ok(())
}

pub fn validate_outbound_prefix(prefix: &str) -> Result<(), ValidationFailure> {
    use once_cell::sync::Lazy;
    use regex::Regex;
    static PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/[A-Za-z0-9/-]*$").unwrap());

    if prefix.ends_with('/') && prefix != "/" {
        return Err(ValidationFailure::new(
            ValidationReason::BadPrefix,
            format!("'{prefix}' must not have a trailing slash"),
        ));
    }
    if !PREFIX_RE.is_match(prefix) {
        return Err(ValidationFailure::new(
            ValidationReason::BadPrefix,
            format!("'{prefix}' must start with '/' and match [A-Za-z0-9/-]*"),
        ));
    }
    Ok(())
}
