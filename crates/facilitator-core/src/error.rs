//! Error taxonomy for the Service Facilitator mirror subsystem.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Kinds of failure the mirror subsystem can produce.
///
/// This is a taxonomy, not a single monolithic type: the HTTP layer maps each
/// variant to a status code and problem `type` (see `facilitator-api`), and
/// the component boundaries described in the design (loader, LKG store,
/// mirror store) each own recovery for the variants they raise.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed push body, parent/policy shape, or key mismatch.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Resolve miss.
    #[error("not found: {0}")]
    NotFound(String),

    /// Resolved service exists but is not visible (disabled).
    #[error("service disabled: {0}")]
    AccessDenied(String),

    /// The current snapshot is empty.
    #[error("mirror unavailable")]
    Unavailable,

    /// DB I/O or timeout while loading; the caller should fall back to LKG.
    #[error("loader error: {0}")]
    Loader(String),

    /// LKG write failure; callers treat this as non-fatal.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Neither DB nor LKG yielded usable data at boot.
    #[error("boot fatal: {0}")]
    BootFatal(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Unavailable)
    }
}

/// Structured reason codes for [`Error::Validation`], used by callers that
/// need to branch on *why* a snapshot or record was rejected rather than just
/// the message text (e.g. the push handler's `mirror_validation_failed` body).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    BadId,
    BadBoolean,
    BadUrl,
    BadPrefix,
    BadVersion,
    BadSlug,
    BadTimestamp,
    BadMethod,
    KeyMismatch,
    ChildWrongType,
    ChildWrongParent,
    ServiceDisabled,
    NotAnObject,
    MixedPolicyType,
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidationReason::BadId => "bad_id",
            ValidationReason::BadBoolean => "bad_boolean",
            ValidationReason::BadUrl => "bad_url",
            ValidationReason::BadPrefix => "bad_prefix",
            ValidationReason::BadVersion => "bad_version",
            ValidationReason::BadSlug => "bad_slug",
            ValidationReason::BadTimestamp => "bad_timestamp",
            ValidationReason::BadMethod => "bad_method",
            ValidationReason::KeyMismatch => "key_mismatch",
            ValidationReason::ChildWrongType => "child_wrong_type",
            ValidationReason::ChildWrongParent => "child_wrong_parent",
            ValidationReason::ServiceDisabled => "service_disabled",
            ValidationReason::NotAnObject => "not_an_object",
            ValidationReason::MixedPolicyType => "mixed_policy_type",
        };
        write!(f, "{s}")
    }
}

/// A validation failure paired with its structured reason and, where
/// applicable, the record key it concerns.
#[derive(Error, Debug, Clone)]
#[error("{reason}: {message}")]
pub struct ValidationFailure {
    pub reason: ValidationReason,
    pub message: String,
    pub key: Option<String>,
}

impl ValidationFailure {
    pub fn new(reason: ValidationReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl From<ValidationFailure> for Error {
    fn from(f: ValidationFailure) -> Self {
        Error::Validation(f.to_string())
    }
}
