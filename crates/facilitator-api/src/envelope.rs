//! The uniform success envelope: `{ ok: true, requestId, data }`. Error
//! responses use [`crate::problem::ApiError`] instead, which folds the
//! problem fields into its own body rather than wrapping a `data` payload.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    pub ok: bool,
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(request_id: impl Into<String>, data: T) -> Self {
        Self {
            ok: true,
            request_id: request_id.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
