//! Canonical mirror key scheme: `"<slug>@<version>"`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, ValidationFailure, ValidationReason};

static KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9-]+@[1-9][0-9]*$").unwrap());
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").unwrap());

/// Build the canonical key for a (slug, version) pair.
///
/// `slug` must already be lowercase `[a-z0-9-]+` and `version` a positive
/// integer; callers that have not yet validated those invariants should use
/// [`crate::schema::ServiceConfig`] validation first.
pub fn svc_key(slug: &str, version: u32) -> Result<String, Error> {
    if !SLUG_RE.is_match(slug) {
        return Err(ValidationFailure::new(
            ValidationReason::BadSlug,
            format!("slug '{slug}' must match [a-z0-9-]+"),
        )
        .into());
    }
    if version == 0 {
        return Err(ValidationFailure::new(
            ValidationReason::BadVersion,
            "version must be a positive integer",
        )
        .into());
    }
    Ok(format!("{slug}@{version}"))
}

/// Parse a canonical key back into its `(slug, version)` parts.
pub fn parse_svc_key(key: &str) -> Result<(String, u32), Error> {
    if !KEY_RE.is_match(key) {
        return Err(ValidationFailure::new(
            ValidationReason::KeyMismatch,
            format!("key '{key}' does not match ^[a-z0-9-]+@\\d+$"),
        )
        .into());
    }
    let (slug, version) = key.rsplit_once('@').expect("regex guarantees '@' present");
    let version: u32 = version
        .parse()
        .map_err(|_| ValidationFailure::new(ValidationReason::BadVersion, "version overflow"))?;
    Ok((slug.to_string(), version))
}
