//! Document-store style storage over MongoDB or a SQLite shim.
//!
//! Both backends speak JSON documents (`serde_json::Map`). Identifiers are
//! always rendered as strings under `_id`: an `ObjectId` hex string on Mongo,
//! the autoincrement row id on SQLite.

use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};

use crate::config::{AppConfig, StoreBackend};

pub mod error;
pub mod mirror;
pub mod mongo;
pub mod operations;
pub mod sqlite;

pub use error::{Result, StoreError};

pub type Document = Map<String, Value>;

/// Logical collection keys mapped to their physical names.
pub const COLLECTIONS: &[(&str, &str)] = &[
    ("USERS", "users"),
    ("DATASETS", "datasets"),
    ("PREDICTIONS", "predictions"),
    ("REPORTS", "reports"),
    ("ALERTS", "alerts"),
    ("LOGS", "logs"),
    ("SESSIONS", "sessions"),
];

/// Resolves a registry key (`"REPORTS"`) or a raw physical name (`"reports"`).
pub fn resolve_collection(name: &str) -> Option<&'static str> {
    COLLECTIONS
        .iter()
        .find(|(key, physical)| *key == name || *physical == name)
        .map(|(_, physical)| *physical)
}

/// Query filter. Deliberately narrow: match everything, match by id, or
/// equality on one named field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Id(String),
    Eq(String, Value),
}

impl Filter {
    pub fn id(id: impl Into<String>) -> Self {
        Filter::Id(id.into())
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        if field == "_id" {
            return match value {
                Value::String(id) => Filter::Id(id),
                other => Filter::Id(other.to_string()),
            };
        }
        Filter::Eq(field, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

enum Backend {
    Sqlite(Arc<sqlite::SqliteStore>),
    Mongo(mongo::MongoStore),
}

/// Process-wide store handle. Holds one connection (SQLite) or one client
/// (Mongo) until [`Store::close`] is called.
pub struct Store {
    kind: StoreBackend,
    name: String,
    backend: RwLock<Option<Arc<Backend>>>,
}

impl Store {
    /// Connects to the configured backend. The first attempt is followed by
    /// up to `connect_retries` retries with a fixed backoff.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let attempts = connect_attempts(config.connect_retries);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::try_connect(config).await {
                Ok(store) => {
                    tracing::info!(
                        backend = ?store.kind,
                        name = %store.name,
                        attempt,
                        "Store initialized"
                    );
                    return Ok(store);
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Store connection failed, retrying"
                    );
                    tokio::time::sleep(config.retry_backoff).await;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "Store connection failed, giving up");
                    return Err(e);
                }
            }
        }
    }

    async fn try_connect(config: &AppConfig) -> Result<Self> {
        match config.store_backend {
            StoreBackend::Sqlite => Self::open_sqlite(&config.sqlite_db_path),
            StoreBackend::Mongo => {
                let uri = config.mongo_uri.as_deref().ok_or_else(|| {
                    StoreError::Config("MONGO_URI is required for the mongo backend".into())
                })?;
                let mongo = mongo::MongoStore::connect(uri, &config.mongo_db_name).await?;
                Ok(Self::from_backend(
                    StoreBackend::Mongo,
                    config.mongo_db_name.clone(),
                    Backend::Mongo(mongo),
                ))
            }
        }
    }

    pub fn open_sqlite(path: &std::path::Path) -> Result<Self> {
        let sqlite = sqlite::SqliteStore::open(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_backend(
            StoreBackend::Sqlite,
            name,
            Backend::Sqlite(Arc::new(sqlite)),
        ))
    }

    fn from_backend(kind: StoreBackend, name: String, backend: Backend) -> Self {
        Store {
            kind,
            name,
            backend: RwLock::new(Some(Arc::new(backend))),
        }
    }

    pub fn kind(&self) -> StoreBackend {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.read_backend().is_some()
    }

    /// Returns a handle to a collection by registry key or physical name.
    pub fn collection(&self, name: &str) -> Result<Collection> {
        let backend = self.read_backend().ok_or(StoreError::NotInitialized)?;
        let physical =
            resolve_collection(name).ok_or_else(|| StoreError::UnknownCollection(name.into()))?;
        Ok(Collection {
            backend,
            name: physical,
        })
    }

    /// Releases the connection. Handles already in flight finish their call;
    /// new lookups fail with [`StoreError::NotInitialized`].
    pub fn close(&self) {
        let previous = self
            .backend
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match previous {
            Some(_) => tracing::info!(name = %self.name, "Store closed"),
            None => tracing::debug!(name = %self.name, "Store was already closed"),
        }
    }

    fn read_backend(&self) -> Option<Arc<Backend>> {
        self.backend
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Handle to one collection/table.
#[derive(Clone)]
pub struct Collection {
    backend: Arc<Backend>,
    name: &'static str,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Inserts a document and returns its generated id.
    pub async fn insert_one(&self, doc: &Document) -> Result<String> {
        match self.backend.as_ref() {
            Backend::Sqlite(s) => {
                let (s, name, doc) = (s.clone(), self.name, doc.clone());
                blocking(move || s.insert_one(name, &doc).map(|id| id.to_string())).await
            }
            Backend::Mongo(m) => m.insert_one(self.name, doc).await,
        }
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<Document>> {
        let mut docs = self.find(filter.clone()).limit(1).to_vec().await?;
        Ok(docs.pop())
    }

    pub fn find(&self, filter: Filter) -> Cursor {
        Cursor {
            collection: self.clone(),
            filter,
            sort: None,
            limit: None,
        }
    }

    /// Deletes at most one matching document, returning the deleted count.
    pub async fn delete_one(&self, filter: &Filter) -> Result<u64> {
        match self.backend.as_ref() {
            Backend::Sqlite(s) => {
                let (s, name, filter) = (s.clone(), self.name, filter.clone());
                blocking(move || s.delete_one(name, &filter)).await
            }
            Backend::Mongo(m) => m.delete_one(self.name, filter).await,
        }
    }

    /// Removes every document; the table/collection itself and its indexes stay.
    pub async fn drop(&self) -> Result<u64> {
        match self.backend.as_ref() {
            Backend::Sqlite(s) => {
                let (s, name) = (s.clone(), self.name);
                blocking(move || sqlite::SqliteStore::drop(&s, name)).await
            }
            Backend::Mongo(m) => m.drop(self.name).await,
        }
    }

    pub async fn count(&self) -> Result<u64> {
        match self.backend.as_ref() {
            Backend::Sqlite(s) => {
                let (s, name) = (s.clone(), self.name);
                blocking(move || s.count(name)).await
            }
            Backend::Mongo(m) => m.count(self.name).await,
        }
    }
}

/// Lazily executed query with chainable sort and limit.
pub struct Cursor {
    collection: Collection,
    filter: Filter,
    sort: Option<(String, SortDirection)>,
    limit: Option<i64>,
}

impl Cursor {
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some((field.into(), direction));
        self
    }

    /// Caps the result count. Zero or negative means no cap.
    pub fn limit(mut self, count: i64) -> Self {
        self.limit = (count > 0).then_some(count);
        self
    }

    pub async fn to_vec(self) -> Result<Vec<Document>> {
        let Cursor {
            collection,
            filter,
            sort,
            limit,
        } = self;
        match collection.backend.as_ref() {
            Backend::Sqlite(s) => {
                let (s, name) = (s.clone(), collection.name);
                blocking(move || {
                    let sort = sort.as_ref().map(|(f, d)| (f.as_str(), *d));
                    s.find(name, &filter, sort, limit)
                })
                .await
            }
            Backend::Mongo(m) => {
                let sort = sort.as_ref().map(|(f, d)| (f.as_str(), *d));
                m.find(collection.name, &filter, sort, limit).await
            }
        }
    }
}

fn connect_attempts(retries: u32) -> u32 {
    retries.saturating_add(1)
}

/// Runs a synchronous SQLite call on the blocking pool so the connection
/// mutex is never held on a runtime worker.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
