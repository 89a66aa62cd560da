//! Data model, canonical key scheme, and error taxonomy shared by every
//! crate in the Service Facilitator workspace.
//!
//! This crate has no I/O of its own: it defines the types that the loader,
//! validator, LKG store, mirror store, and HTTP surface all pass between
//! each other, so a change to the wire contract has exactly one home.

pub mod error;
pub mod key;
pub mod schema;
pub mod types;

pub use error::{Error, Result, ValidationFailure, ValidationReason};
pub use key::{parse_svc_key, svc_key};
pub use schema::{
    LkgEnvelope, MirrorEntry, MirrorMap, Policies, RoutePolicy, ServiceConfig, Snapshot,
    LKG_DB_DOCUMENT_ID, LKG_SCHEMA_V2,
};
pub use types::{HttpMethod, PolicyType, Source};
