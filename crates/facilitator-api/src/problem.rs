//! RFC 7807-flavored problem envelope. Every error response is a single JSON
//! object carrying both the uniform `{ok, requestId, error, detail}` envelope
//! and the `type`/`title`/`status`/`detail` problem fields side by side, so a
//! caller can branch on either shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use facilitator_core::error::{Error, ValidationFailure, ValidationReason};

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub ok: bool,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub error: String,
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub detail: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ApiError {
    pub fn new(
        error_code: impl Into<String>,
        title: impl Into<String>,
        detail: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        let error_code = error_code.into();
        Self {
            ok: false,
            request_id: None,
            problem_type: error_code.clone(),
            error: error_code,
            title: title.into(),
            detail: detail.into(),
            status,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn missing_key() -> Self {
        Self::new(
            "missing_key",
            "Missing Key",
            "the `key` query parameter is required",
            StatusCode::BAD_REQUEST,
        )
    }

    pub fn not_found(key: &str) -> Self {
        Self::new(
            "not_found",
            "Not Found",
            format!("no mirror entry for key '{key}'"),
            StatusCode::NOT_FOUND,
        )
    }

    pub fn service_disabled(key: &str) -> Self {
        Self::new(
            "service_disabled",
            "Service Disabled",
            format!("service '{key}' is resolvable but currently disabled"),
            StatusCode::FORBIDDEN,
        )
    }

    pub fn mirror_unavailable() -> Self {
        Self::new(
            "mirror_unavailable",
            "Mirror Unavailable",
            "the mirror snapshot is currently empty",
            StatusCode::SERVICE_UNAVAILABLE,
        )
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            "internal_error",
            "Internal Server Error",
            detail,
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }

    /// A pushed mirror body failed Snapshot Validator checks. Distinct from
    /// [`Self::from`]'s `ValidationFailure` mapping (used for resolve/mirror
    /// reads, which surface 422): `POST mirror/load` always rejects with 400
    /// `mirror_validation_failed` regardless of which structured reason the
    /// validator returned, since a push is a write the caller must correct
    /// and retry, not a lookup that simply came back empty.
    pub fn mirror_validation_failed(failure: &ValidationFailure) -> Self {
        let mut detail = failure.message.clone();
        if let Some(key) = &failure.key {
            detail = format!("{detail} (key: {key})");
        }
        Self::new(
            "mirror_validation_failed",
            "Mirror Validation Failed",
            detail,
            StatusCode::BAD_REQUEST,
        )
    }

    pub fn not_a_base_path() -> Self {
        Self::new(
            "not_found",
            "Not Found",
            "request path does not match this service's mounted base",
            StatusCode::NOT_FOUND,
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.error, self.detail)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl From<&ValidationFailure> for ApiError {
    fn from(failure: &ValidationFailure) -> Self {
        let (code, status) = match failure.reason {
            ValidationReason::KeyMismatch => ("key_mismatch", StatusCode::UNPROCESSABLE_ENTITY),
            ValidationReason::ServiceDisabled => ("service_disabled", StatusCode::FORBIDDEN),
            _ => ("invalid_record", StatusCode::UNPROCESSABLE_ENTITY),
        };
        let mut detail = failure.message.clone();
        if let Some(key) = &failure.key {
            detail = format!("{detail} (key: {key})");
        }
        Self::new(code, title_for(code), detail, status)
    }
}

impl From<ValidationFailure> for ApiError {
    fn from(failure: ValidationFailure) -> Self {
        ApiError::from(&failure)
    }
}

/// Fallback conversion for the few paths that only have the collapsed
/// `facilitator_core::Error` taxonomy to work with (e.g. loader failures
/// bubbling out of the mirror store). Validation detail is lost here since
/// `Error::Validation` only carries a formatted string; callers that still
/// hold the original `ValidationFailure` should convert from that instead.
impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(message) => {
                Self::new("invalid_record", "Invalid Record", message, StatusCode::UNPROCESSABLE_ENTITY)
            }
            Error::NotFound(message) => {
                Self::new("not_found", "Not Found", message, StatusCode::NOT_FOUND)
            }
            Error::AccessDenied(message) => {
                Self::new("service_disabled", "Service Disabled", message, StatusCode::FORBIDDEN)
            }
            Error::Unavailable => Self::mirror_unavailable(),
            Error::Loader(message) => Self::internal(message),
            Error::Persistence(message) => Self::internal(message),
            Error::BootFatal(message) => Self::internal(message),
            Error::Io(err) => Self::internal(err.to_string()),
            Error::Json(err) => Self::internal(err.to_string()),
            Error::Internal(message) => Self::internal(message),
        }
    }
}

fn title_for(code: &str) -> &'static str {
    match code {
        "key_mismatch" => "Key Mismatch",
        "service_disabled" => "Service Disabled",
        _ => "Invalid Record",
    }
}
