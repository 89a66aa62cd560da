//! Storage-local error type. Kept separate from `facilitator_core::Error`
//! because the LKG store and loader need to distinguish I/O/driver failures
//! from validation failures before the caller decides how to react (a save
//! failure is a warning; a load validation failure falls back silently).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("bson serialization error: {0}")]
    BsonSer(#[from] mongodb::bson::ser::Error),

    #[error("bson deserialization error: {0}")]
    BsonDe(#[from] mongodb::bson::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] facilitator_core::error::ValidationFailure),

    #[error("loader error: {0}")]
    Loader(String),
}

impl From<StorageError> for facilitator_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Validation(f) => f.into(),
            StorageError::Loader(msg) => facilitator_core::Error::Loader(msg),
            other => facilitator_core::Error::Loader(other.to_string()),
        }
    }
}
