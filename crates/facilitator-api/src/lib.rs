//! The Service Facilitator's HTTP surface: resolve/mirror/push handlers, the
//! request-id middleware, health probes, and the RFC 7807-flavored problem
//! envelope they all share.

pub mod envelope;
pub mod handlers;
pub mod health;
pub mod problem;
pub mod request_id;
pub mod routes;

pub use handlers::AppState;
pub use health::HealthChecker;
pub use problem::ApiError;
pub use routes::router;
