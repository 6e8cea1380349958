use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{Document, Filter, Result, SortDirection, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT UNIQUE NOT NULL,
    created_at TEXT,
    data TEXT
);

CREATE TABLE IF NOT EXISTS datasets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    location_name TEXT,
    timestamp TEXT,
    created_at TEXT,
    data TEXT
);
CREATE INDEX IF NOT EXISTS idx_datasets_location ON datasets(location_name, timestamp);
CREATE INDEX IF NOT EXISTS idx_datasets_created ON datasets(created_at);

CREATE TABLE IF NOT EXISTS predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT,
    data TEXT
);
CREATE INDEX IF NOT EXISTS idx_predictions_created ON predictions(created_at);

CREATE TABLE IF NOT EXISTS reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT,
    reporter TEXT,
    location_name TEXT,
    lat REAL,
    lng REAL,
    symptoms TEXT,
    cases INTEGER,
    turbidity REAL,
    ph REAL,
    chlorine REAL,
    tds REAL,
    fluoride REAL,
    nitrate REAL,
    chloride REAL,
    ec REAL,
    ai_prediction TEXT,
    ai_confidence REAL,
    created_at TEXT,
    data TEXT
);
CREATE INDEX IF NOT EXISTS idx_reports_timestamp ON reports(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_reports_created ON reports(created_at);

CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    level TEXT,
    created_at TEXT,
    data TEXT
);
CREATE INDEX IF NOT EXISTS idx_alerts_level ON alerts(level, created_at DESC);

CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT,
    data TEXT
);
CREATE INDEX IF NOT EXISTS idx_logs_created ON logs(created_at);

CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT UNIQUE,
    created_at TEXT,
    data TEXT
);
";

#[derive(Debug, Clone, Copy)]
enum ColumnKind {
    Text,
    Integer,
    Real,
}

/// Native columns duplicated out of the document blob so they can be
/// filtered and sorted on. Must match `SCHEMA`.
struct TableSpec {
    name: &'static str,
    columns: &'static [(&'static str, ColumnKind)],
}

const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "users",
        columns: &[("email", ColumnKind::Text), ("created_at", ColumnKind::Text)],
    },
    TableSpec {
        name: "datasets",
        columns: &[
            ("location_name", ColumnKind::Text),
            ("timestamp", ColumnKind::Text),
            ("created_at", ColumnKind::Text),
        ],
    },
    TableSpec {
        name: "predictions",
        columns: &[("created_at", ColumnKind::Text)],
    },
    TableSpec {
        name: "reports",
        columns: &[
            ("timestamp", ColumnKind::Text),
            ("reporter", ColumnKind::Text),
            ("location_name", ColumnKind::Text),
            ("lat", ColumnKind::Real),
            ("lng", ColumnKind::Real),
            ("symptoms", ColumnKind::Text),
            ("cases", ColumnKind::Integer),
            ("turbidity", ColumnKind::Real),
            ("ph", ColumnKind::Real),
            ("chlorine", ColumnKind::Real),
            ("tds", ColumnKind::Real),
            ("fluoride", ColumnKind::Real),
            ("nitrate", ColumnKind::Real),
            ("chloride", ColumnKind::Real),
            ("ec", ColumnKind::Real),
            ("ai_prediction", ColumnKind::Text),
            ("ai_confidence", ColumnKind::Real),
            ("created_at", ColumnKind::Text),
        ],
    },
    TableSpec {
        name: "alerts",
        columns: &[("level", ColumnKind::Text), ("created_at", ColumnKind::Text)],
    },
    TableSpec {
        name: "logs",
        columns: &[("created_at", ColumnKind::Text)],
    },
    TableSpec {
        name: "sessions",
        columns: &[
            ("session_id", ColumnKind::Text),
            ("created_at", ColumnKind::Text),
        ],
    },
];

impl TableSpec {
    fn lookup(name: &str) -> Result<&'static TableSpec> {
        TABLES
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }

    fn column(&self, field: &str) -> Option<(&'static str, ColumnKind)> {
        self.columns.iter().copied().find(|(c, _)| *c == field)
    }
}

/// Converts a JSON value into what the native column expects. Values of the
/// wrong shape become NULL in the column; the blob keeps the original.
fn to_sql(value: Option<&Value>, kind: ColumnKind) -> SqlValue {
    match (value, kind) {
        (None | Some(Value::Null), _) => SqlValue::Null,
        (Some(Value::Number(n)), ColumnKind::Integer) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(SqlValue::Integer)
            .unwrap_or(SqlValue::Null),
        (Some(Value::Number(n)), ColumnKind::Real) => {
            n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null)
        }
        (Some(Value::String(s)), ColumnKind::Text) => SqlValue::Text(s.clone()),
        (Some(other), ColumnKind::Text) => SqlValue::Text(other.to_string()),
        (Some(_), _) => SqlValue::Null,
    }
}

fn parse_row_id(id: &str) -> Result<i64> {
    id.trim()
        .parse::<i64>()
        .map_err(|_| StoreError::InvalidId(id.to_string()))
}

/// SQLite backend: one shared connection guarded by a mutex.
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!(path = %path.display(), "SQLite database opened");
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_one(&self, table: &str, doc: &Document) -> Result<i64> {
        let spec = TableSpec::lookup(table)?;

        let mut blob = doc.clone();
        blob.remove("_id");
        let data = serde_json::to_string(&blob)?;

        let mut columns: Vec<&str> = spec.columns.iter().map(|(c, _)| *c).collect();
        columns.push("data");
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            spec.name,
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut values: Vec<SqlValue> = spec
            .columns
            .iter()
            .map(|(column, kind)| to_sql(doc.get(*column), *kind))
            .collect();
        values.push(SqlValue::Text(data));

        let conn = self.lock();
        conn.execute(&sql, params_from_iter(values))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find(
        &self,
        table: &str,
        filter: &Filter,
        sort: Option<(&str, SortDirection)>,
        limit: Option<i64>,
    ) -> Result<Vec<Document>> {
        let spec = TableSpec::lookup(table)?;
        let (clause, mut params) = where_clause(spec, filter)?;

        let mut sql = format!("SELECT id, data FROM {}{}", spec.name, clause);
        if let Some((field, direction)) = sort {
            let column = if field == "_id" {
                "id"
            } else {
                spec.column(field)
                    .map(|(c, _)| c)
                    .ok_or_else(|| StoreError::UnsupportedSort {
                        collection: spec.name.to_string(),
                        field: field.to_string(),
                    })?
            };
            let dir = direction.as_sql();
            sql.push_str(&format!(" ORDER BY {column} {dir}, id {dir}"));
        }
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT ?{}", params.len() + 1));
            params.push(SqlValue::Integer(limit));
        }

        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| {
            let id: i64 = row.get(0)?;
            let data: Option<String> = row.get(1)?;
            Ok((id, data))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, data) = row?;
            docs.push(row_to_document(spec.name, id, data.as_deref()));
        }
        Ok(docs)
    }

    pub fn delete_one(&self, table: &str, filter: &Filter) -> Result<u64> {
        let spec = TableSpec::lookup(table)?;
        let (clause, params) = where_clause(spec, filter)?;
        let sql = format!(
            "DELETE FROM {name} WHERE id = (SELECT id FROM {name}{clause} LIMIT 1)",
            name = spec.name
        );
        let deleted = self.lock().execute(&sql, params_from_iter(params))?;
        Ok(deleted as u64)
    }

    pub fn drop(&self, table: &str) -> Result<u64> {
        let spec = TableSpec::lookup(table)?;
        let deleted = self
            .lock()
            .execute(&format!("DELETE FROM {}", spec.name), [])?;
        tracing::info!(table = spec.name, deleted, "Table cleared");
        Ok(deleted as u64)
    }

    pub fn count(&self, table: &str) -> Result<u64> {
        let spec = TableSpec::lookup(table)?;
        let n: i64 = self.lock().query_row(
            &format!("SELECT COUNT(*) FROM {}", spec.name),
            [],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }
}

fn where_clause(spec: &TableSpec, filter: &Filter) -> Result<(String, Vec<SqlValue>)> {
    match filter {
        Filter::All => Ok((String::new(), Vec::new())),
        Filter::Id(id) => Ok((
            " WHERE id = ?1".to_string(),
            vec![SqlValue::Integer(parse_row_id(id)?)],
        )),
        Filter::Eq(field, value) => {
            let (column, kind) =
                spec.column(field)
                    .ok_or_else(|| StoreError::UnsupportedFilter {
                        collection: spec.name.to_string(),
                        field: field.clone(),
                    })?;
            Ok((
                format!(" WHERE {column} = ?1"),
                vec![to_sql(Some(value), kind)],
            ))
        }
    }
}

fn row_to_document(table: &str, id: i64, data: Option<&str>) -> Document {
    let mut doc = match data.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        Some(Err(e)) => {
            tracing::warn!(table, id, error = %e, "Unreadable document blob");
            Document::new()
        }
        _ => Document::new(),
    };
    doc.insert("_id".to_string(), Value::String(id.to_string()));
    doc
}
