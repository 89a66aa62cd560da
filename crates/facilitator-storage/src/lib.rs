//! Persistence layer for the Service Facilitator: the atomic filesystem
//! (and optional database-mirrored) Last-Known-Good store, and the
//! configuration database loader that produces a fresh mirror map.

pub mod error;
pub mod lkg;
pub mod loader;

pub use error::StorageError;
pub use lkg::LkgStore;
pub use loader::{DbLoader, LoadOutcome, Loader, NullLoader};

/// Connects to the configuration database and resolves the configured
/// parent/policy/LKG collection handles in one place, mirroring the single
/// bootstrap-function discipline the rest of the workspace follows for
/// environment-derived resources.
pub async fn connect(
    uri: &str,
    db_name: &str,
    configs_collection: &str,
    policies_collection: &str,
    lkg_collection: &str,
) -> Result<DbHandles, StorageError> {
    let client = mongodb::Client::with_uri_str(uri).await?;
    let db = client.database(db_name);

    Ok(DbHandles {
        configs: db.collection(configs_collection),
        policies: db.collection(policies_collection),
        lkg: db.collection(lkg_collection),
    })
}

/// The three collection handles the facilitator needs: two read-only
/// (parents, policies) and one it owns exclusively (the LKG mirror
/// document). The facilitator never writes to the first two.
pub struct DbHandles {
    pub configs: mongodb::Collection<mongodb::bson::Document>,
    pub policies: mongodb::Collection<mongodb::bson::Document>,
    pub lkg: mongodb::Collection<mongodb::bson::Document>,
}
