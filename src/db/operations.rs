use axum::{http::StatusCode, response::Response};
use serde_json::json;

use super::{Document, Filter, SortDirection, Store, StoreError};
use crate::config::Constants;
use crate::utils::{error_response, success_response};

/// Parses a `limit` query value. Missing or non-numeric values fall back to
/// `default`; the result is clamped to `1..=MAX_LIST_LIMIT`.
pub fn clamp_limit(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
        .clamp(1, Constants::MAX_LIST_LIMIT)
}

/// Maps a store failure onto an HTTP error body.
pub fn store_error_response(err: &StoreError) -> Response {
    match err {
        StoreError::NotInitialized => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Store not initialized")
        }
        StoreError::UnknownCollection(_) => error_response(StatusCode::NOT_FOUND, &err.to_string()),
        StoreError::UnsupportedFilter { .. }
        | StoreError::UnsupportedSort { .. }
        | StoreError::InvalidId(_) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        _ => {
            tracing::error!(error = %err, "Store operation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

/// Newest-first listing of a collection by `sort_field`.
pub async fn list_recent(
    store: &Store,
    collection: &str,
    sort_field: &str,
    limit: i64,
) -> Result<Vec<Document>, StoreError> {
    store
        .collection(collection)?
        .find(Filter::All)
        .sort(sort_field, SortDirection::Descending)
        .limit(limit)
        .to_vec()
        .await
}

/// Generic function to delete a document by ID
pub async fn delete_by_id(store: &Store, collection_name: &str, id: &str) -> Response {
    let coll = match store.collection(collection_name) {
        Ok(coll) => coll,
        Err(e) => return store_error_response(&e),
    };

    match coll.delete_one(&Filter::id(id)).await {
        Ok(1) => success_response(StatusCode::OK, json!({"status": "deleted"})),
        Ok(_) => error_response(StatusCode::NOT_FOUND, "Not found"),
        Err(e) => store_error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tempfile::TempDir;

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None, 200), 200);
        assert_eq!(clamp_limit(Some("abc"), 200), 200);
        assert_eq!(clamp_limit(Some("0"), 200), 1);
        assert_eq!(clamp_limit(Some("-4"), 20), 1);
        assert_eq!(clamp_limit(Some("5000"), 20), 1000);
        assert_eq!(clamp_limit(Some(" 15 "), 20), 15);
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            store_error_response(&StoreError::NotInitialized).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            store_error_response(&StoreError::InvalidId("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            store_error_response(&StoreError::UnknownCollection("x".into())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn delete_by_id_reports_missing_rows() {
        let dir = TempDir::new().unwrap();
        let store = Store::open_sqlite(&dir.path().join("t.db")).unwrap();
        let mut doc = Document::new();
        doc.insert("message".into(), json!("hello"));
        let id = store.collection("logs").unwrap().insert_one(&doc).await.unwrap();

        assert_eq!(delete_by_id(&store, "logs", &id).await.status(), StatusCode::OK);
        assert_eq!(
            delete_by_id(&store, "logs", &id).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            delete_by_id(&store, "logs", "abc").await.status(),
            StatusCode::BAD_REQUEST
        );
    }
}
