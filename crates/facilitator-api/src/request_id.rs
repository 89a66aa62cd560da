//! Request-id propagation: take `x-request-id` from the incoming request if
//! present, otherwise mint one, stash it on the request for handlers to pick
//! up, and echo it on every response.

use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    match HeaderValue::from_str(&request_id) {
        Ok(value) => {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "request id was not a valid header value",
            )
                .into_response();
        }
    }

    response
}
