use axum::{
    extract::{rejection::JsonRejection, Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{json, Value};

use crate::{
    config::Constants,
    db::operations::{clamp_limit, delete_by_id, list_recent, store_error_response},
    state::AppState,
    structure::reports::{normalize_ai_prediction, ListQuery},
    utils::{error_response, now_timestamp, success_response},
};

/// Collections exposed under `/data/{entity}`.
pub const DATA_ENTITIES: [&str; 5] = ["datasets", "predictions", "reports", "alerts", "logs"];

fn entity_collection(entity: &str) -> Option<&'static str> {
    DATA_ENTITIES.iter().copied().find(|e| *e == entity)
}

pub async fn create_document(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    let Some(collection) = entity_collection(&entity) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown entity");
    };

    let mut doc = match payload {
        Ok(Json(Value::Object(doc))) => doc,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, "Body must be a JSON object"),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.body_text()),
    };
    doc.remove("_id");
    if collection == "reports" {
        if let Err(message) = normalize_ai_prediction(&mut doc) {
            return error_response(StatusCode::BAD_REQUEST, &message);
        }
    }
    doc.insert("created_at".into(), Value::String(now_timestamp()));

    let coll = match state.store.collection(collection) {
        Ok(coll) => coll,
        Err(e) => return store_error_response(&e),
    };
    match coll.insert_one(&doc).await {
        Ok(id) => {
            tracing::debug!(collection, id = %id, "Document inserted");
            success_response(StatusCode::CREATED, json!({ "id": id }))
        }
        Err(e) => store_error_response(&e),
    }
}

pub async fn list_documents(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let Some(collection) = entity_collection(&entity) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown entity");
    };
    let limit = clamp_limit(query.limit.as_deref(), Constants::DATA_LIST_LIMIT);

    match list_recent(&state.store, collection, "created_at", limit).await {
        Ok(docs) => success_response(StatusCode::OK, docs),
        Err(e) => store_error_response(&e),
    }
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> impl IntoResponse {
    let Some(collection) = entity_collection(&entity) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown entity");
    };
    delete_by_id(&state.store, collection, &id).await
}
