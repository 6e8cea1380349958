use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;

use super::{Document, Filter, Result, SortDirection, StoreError};

/// MongoDB backend: a thin pass-through to the driver.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 }).await?;
        let store = Self { db };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Idempotent; mirrors the static indices of the SQLite schema.
    async fn ensure_indexes(&self) -> Result<()> {
        let unique = IndexOptions::builder().unique(true).build();
        self.coll("users")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        self.coll("sessions")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "session_id": 1 })
                    .options(unique)
                    .build(),
            )
            .await?;
        self.coll("reports")
            .create_index(IndexModel::builder().keys(doc! { "timestamp": -1 }).build())
            .await?;
        self.coll("datasets")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "location_name": 1, "timestamp": 1 })
                    .build(),
            )
            .await?;
        self.coll("alerts")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "level": 1, "created_at": -1 })
                    .build(),
            )
            .await?;
        Ok(())
    }

    fn coll(&self, name: &str) -> Collection<bson::Document> {
        self.db.collection(name)
    }

    pub async fn insert_one(&self, name: &str, doc: &Document) -> Result<String> {
        let mut body = bson::to_document(doc)?;
        body.remove("_id");
        let result = self.coll(name).insert_one(body).await?;
        Ok(id_to_string(result.inserted_id))
    }

    pub async fn find(
        &self,
        name: &str,
        filter: &Filter,
        sort: Option<(&str, SortDirection)>,
        limit: Option<i64>,
    ) -> Result<Vec<Document>> {
        let coll = self.coll(name);
        let mut find = coll.find(filter_document(filter)?);
        if let Some((field, direction)) = sort {
            let field = if field == "id" { "_id" } else { field };
            find = find.sort(doc! { field: direction.as_i32() });
        }
        if let Some(limit) = limit {
            find = find.limit(limit);
        }

        let mut cursor = find.await?;
        let mut docs = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            docs.push(into_json_document(d));
        }
        Ok(docs)
    }

    pub async fn delete_one(&self, name: &str, filter: &Filter) -> Result<u64> {
        let result = self.coll(name).delete_one(filter_document(filter)?).await?;
        Ok(result.deleted_count)
    }

    pub async fn drop(&self, name: &str) -> Result<u64> {
        let result = self.coll(name).delete_many(doc! {}).await?;
        tracing::info!(collection = name, deleted = result.deleted_count, "Collection cleared");
        Ok(result.deleted_count)
    }

    pub async fn count(&self, name: &str) -> Result<u64> {
        Ok(self.coll(name).count_documents(doc! {}).await?)
    }
}

fn filter_document(filter: &Filter) -> Result<bson::Document> {
    match filter {
        Filter::All => Ok(doc! {}),
        Filter::Id(id) => {
            let oid = ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.clone()))?;
            Ok(doc! { "_id": oid })
        }
        Filter::Eq(field, value) => {
            let mut d = bson::Document::new();
            d.insert(field.clone(), bson::to_bson(value)?);
            Ok(d)
        }
    }
}

fn id_to_string(id: Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s,
        other => other.to_string(),
    }
}

fn into_json_document(mut d: bson::Document) -> Document {
    let id = d.remove("_id").map(id_to_string);
    let mut out = match Bson::Document(d).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Document::new(),
    };
    if let Some(id) = id {
        out.insert("_id".to_string(), Value::String(id));
    }
    out
}
