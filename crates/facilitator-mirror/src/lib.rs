//! The authoritative in-memory mirror: a TTL-cached read-through store with
//! single-flight refresh and LKG fallback, plus the periodic audit sweep
//! that watches for drift between the database and the snapshot.

pub mod audit;
pub mod mirror_store;
pub mod negative_cache;

pub use audit::AuditSweep;
pub use mirror_store::MirrorStore;
pub use negative_cache::NegativeCache;
