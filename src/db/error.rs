/// Errors raised by the storage adapter.
///
/// Backend failures (including unique-key violations) are passed through
/// untranslated; callers that care about duplicates look them up first.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store was used before `Store::connect` succeeded or after `close`.
    #[error("Store: database not initialized")]
    NotInitialized,

    #[error("Store: unknown collection '{0}'")]
    UnknownCollection(String),

    /// Equality filters only work on natively indexed columns in the SQLite
    /// shim; anything else is refused instead of silently matching nothing.
    #[error("Store: filtering on '{field}' is not supported for '{collection}'")]
    UnsupportedFilter { collection: String, field: String },

    #[error("Store: sorting on '{field}' is not supported for '{collection}'")]
    UnsupportedSort { collection: String, field: String },

    #[error("Store: invalid id '{0}'")]
    InvalidId(String),

    #[error("Store: configuration error: {0}")]
    Config(String),

    #[error("Store: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store: MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Store: BSON encoding error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("Store: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store: blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
