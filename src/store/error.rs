use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),

    #[error("store connection is closed")]
    Closed,

    #[error("unique index violation on '{path}' for value '{value}'")]
    UniqueViolation { path: String, value: String },

    #[error("storage backend failure: {0}")]
    Backend(String),
}
