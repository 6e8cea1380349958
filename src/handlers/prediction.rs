use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{json, Map, Value};

use crate::{
    risk::classifier::{FailureKind, OPTIONAL_FEATURE_DEFAULTS},
    risk::PredictionOutcome,
    state::AppState,
    utils::{error_response, success_response},
};

pub async fn predict_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    let input = match payload {
        Ok(Json(Value::Object(map))) => map,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, "Body must be a JSON object"),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.body_text()),
    };

    match state.model.predict(&input) {
        PredictionOutcome::Success(prediction) => {
            let legacy = prediction.predicted_risk_level.legacy_code();
            let mut body = match serde_json::to_value(&prediction) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            body.insert("prediction".into(), json!(legacy));
            success_response(StatusCode::OK, Value::Object(body))
        }
        PredictionOutcome::Failure(failure) => {
            let status = match failure.kind {
                FailureKind::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                FailureKind::InvalidInput => StatusCode::BAD_REQUEST,
            };
            tracing::warn!(error = %failure.error, "Prediction rejected");
            let mut body = match serde_json::to_value(&failure) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            body.insert("prediction".into(), json!(-1));
            success_response(status, Value::Object(body))
        }
    }
}

pub async fn features_handler(State(state): State<AppState>) -> impl IntoResponse {
    let defaults: Map<String, Value> = OPTIONAL_FEATURE_DEFAULTS
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();

    let body = match state.model.bundle() {
        Some(bundle) => json!({
            "model_loaded": true,
            "feature_names": bundle.feature_names,
            "classes": bundle.classes,
            "accuracy": bundle.accuracy,
            "optional_defaults": defaults,
        }),
        None => json!({
            "model_loaded": false,
            "error": state.model.load_error(),
            "feature_names": crate::risk::classifier::FEATURE_NAMES,
            "classes": crate::risk::RiskLabel::ALL,
            "accuracy": null,
            "optional_defaults": defaults,
        }),
    };
    success_response(StatusCode::OK, body)
}
