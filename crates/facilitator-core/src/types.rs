//! Small enums shared by the data model: the route policy discriminant and
//! the permitted HTTP verbs.

use serde::{Deserialize, Serialize};

/// The two route policy kinds a [`crate::schema::ServiceConfig`] can own.
///
/// Kept as a tagged variant rather than a loosely-typed string field so the
/// parser (`facilitator-validation`) can enforce "edge list holds only Edge,
/// s2s list holds only S2S" at the type level once normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyType {
    Edge,
    #[serde(rename = "S2S")]
    S2S,
}

impl std::fmt::Display for PolicyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyType::Edge => write!(f, "Edge"),
            PolicyType::S2S => write!(f, "S2S"),
        }
    }
}

/// HTTP verbs a route policy may govern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Parse a method token case-insensitively, as it may arrive from either
    /// the database (already uppercase) or a pushed JSON body (caller-chosen
    /// case).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        };
        write!(f, "{s}")
    }
}

/// Provenance tag carried by a [`crate::schema::Snapshot`].
///
/// A push is reported to downstream consumers as `"db"` (see the open
/// question in the design notes on the two competing source tags); the
/// `Push` variant exists internally so the Mirror Store can still order
/// pushes against concurrent TTL refreshes, but [`Serialize`] collapses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Db,
    Lkg,
    Push,
}

impl Source {
    /// The wire-visible tag. Pushes are reported as `"db"` so downstream
    /// consumers see a consistent two-valued source without needing to
    /// know about the internal push-ordering variant.
    pub fn wire_tag(self) -> &'static str {
        match self {
            Source::Db | Source::Push => "db",
            Source::Lkg => "lkg",
        }
    }
}

impl Serialize for Source {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.wire_tag())
    }
}

impl<'de> Deserialize<'de> for Source {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "db" => Ok(Source::Db),
            "lkg" => Ok(Source::Lkg),
            "push" => Ok(Source::Push),
            other => Err(serde::de::Error::custom(format!(
                "unknown snapshot source '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_tag())
    }
}
