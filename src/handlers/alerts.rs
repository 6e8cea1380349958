use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    config::Constants,
    db::operations::clamp_limit,
    handlers::reports::recent_reports,
    state::AppState,
    structure::{
        alerts::{Alert, AlertList},
        reports::ListQuery,
    },
    utils::success_response,
};

/// Alerts are computed on every call from the most recent reports.
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let limit = clamp_limit(query.limit.as_deref(), Constants::REPORT_LIST_LIMIT);
    let alerts = recent_reports(&state, limit)
        .await
        .iter()
        .filter_map(Alert::from_report)
        .collect();
    success_response(StatusCode::OK, AlertList { alerts })
}
