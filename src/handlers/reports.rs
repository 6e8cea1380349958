use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::{
    config::Constants,
    db::operations::{clamp_limit, list_recent, store_error_response},
    risk::PredictionOutcome,
    state::AppState,
    structure::reports::{ListQuery, Report, ReportCreated, ReportList},
    utils::{error_response, now_timestamp, success_response},
};

enum BodyKind {
    Form,
    Multipart,
    Json,
    Other,
}

fn body_kind(req: &Request) -> BodyKind {
    let Some(ct) = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return BodyKind::Other;
    };
    let essence = ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "application/x-www-form-urlencoded" => BodyKind::Form,
        "multipart/form-data" => BodyKind::Multipart,
        "application/json" => BodyKind::Json,
        other if other.ends_with("+json") => BodyKind::Json,
        _ => BodyKind::Other,
    }
}

/// Reads a report submission as form-urlencoded, multipart or JSON fields.
/// A missing or unrecognised content type, or an empty body, is an empty
/// submission.
async fn submission_body(req: Request) -> Result<Map<String, Value>, Response> {
    let bad_request = |message: &str| error_response(StatusCode::BAD_REQUEST, message);

    match body_kind(&req) {
        BodyKind::Form => {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, &())
                .await
                .map_err(|e| bad_request(&e.body_text()))?;
            Ok(fields
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect())
        }
        BodyKind::Multipart => {
            let mut multipart = Multipart::from_request(req, &())
                .await
                .map_err(|e| bad_request(&e.body_text()))?;
            let mut fields = Map::new();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| bad_request(&e.body_text()))?
            {
                // uploaded files carry no report fields
                if field.file_name().is_some() {
                    continue;
                }
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let value = field.text().await.map_err(|e| bad_request(&e.body_text()))?;
                fields.insert(name, Value::String(value));
            }
            Ok(fields)
        }
        BodyKind::Json => {
            let bytes = Bytes::from_request(req, &())
                .await
                .map_err(|e| error_response(e.status(), &e.body_text()))?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Map::new());
            }
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(bad_request("Body must be a JSON object")),
                Err(e) => Err(bad_request(&format!("Invalid JSON body: {e}"))),
            }
        }
        BodyKind::Other => Ok(Map::new()),
    }
}

pub async fn submit_report(State(state): State<AppState>, req: Request) -> impl IntoResponse {
    let input = match submission_body(req).await {
        Ok(input) => input,
        Err(rejection) => return rejection,
    };

    let mut report = Report::from_submission(&input, now_timestamp());
    let risk = report.threshold_risk();

    if state.model.is_loaded() {
        if let Some(features) = report.feature_input() {
            match state.model.predict(&features) {
                PredictionOutcome::Success(prediction) => {
                    report.ai_prediction = Some(prediction.predicted_risk_level);
                    report.ai_confidence = Some(prediction.confidence);
                }
                PredictionOutcome::Failure(failure) => {
                    tracing::warn!(error = %failure.error, "Report classification failed");
                }
            }
        }
    }

    // the mirror is the fallback read path, so a failed primary write is
    // logged and the submission still succeeds
    let id = match insert_report(&state, &report).await {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::error!(error = %e, "Failed to store report in primary store");
            None
        }
    };

    let mirror = state.mirror.clone();
    let row = report.clone();
    match tokio::task::spawn_blocking(move || mirror.append(&row)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Failed to append report to mirror file"),
        Err(e) => tracing::warn!(error = %e, "Mirror append task failed"),
    }

    tracing::info!(
        report_id = ?id,
        risk = risk.as_str(),
        ai_prediction = ?report.ai_prediction,
        "Report submitted"
    );

    success_response(
        StatusCode::CREATED,
        ReportCreated {
            status: "ok",
            id,
            risk,
            ai_prediction: report.ai_prediction,
            ai_confidence: report.ai_confidence,
        },
    )
}

async fn insert_report(state: &AppState, report: &Report) -> anyhow::Result<String> {
    let doc = report.to_document()?;
    let id = state.store.collection("REPORTS")?.insert_one(&doc).await?;
    Ok(id)
}

/// The newest `limit` reports from the store, or from the mirror file when
/// the store fails or holds nothing.
pub async fn recent_reports(state: &AppState, limit: i64) -> Vec<Report> {
    match list_recent(&state.store, "REPORTS", "timestamp", limit).await {
        Ok(docs) if !docs.is_empty() => {
            return docs.into_iter().filter_map(Report::from_document).collect();
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Report query failed, reading mirror file"),
    }

    let mirror = state.mirror.clone();
    let limit = usize::try_from(limit).unwrap_or_default();
    match tokio::task::spawn_blocking(move || mirror.read_recent(limit)).await {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Failed to read mirror file");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Mirror read task failed");
            Vec::new()
        }
    }
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let limit = clamp_limit(query.limit.as_deref(), Constants::REPORT_LIST_LIMIT);
    let items = recent_reports(&state, limit).await;
    success_response(StatusCode::OK, ReportList { items })
}

pub async fn clear_reports(State(state): State<AppState>) -> impl IntoResponse {
    let deleted = match state.store.collection("REPORTS") {
        Ok(coll) => match coll.drop().await {
            Ok(n) => n,
            Err(e) => return store_error_response(&e),
        },
        Err(e) => return store_error_response(&e),
    };

    let mirror = state.mirror.clone();
    match tokio::task::spawn_blocking(move || mirror.reset()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Failed to reset mirror file"),
        Err(e) => tracing::warn!(error = %e, "Mirror reset task failed"),
    }

    tracing::info!(deleted, "Reports cleared");
    success_response(StatusCode::OK, json!({ "status": "cleared", "deleted": deleted }))
}
