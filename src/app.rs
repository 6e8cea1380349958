use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::handlers::{alerts, auth, data, prediction, reports};
use crate::logging;
use crate::state::AppState;

pub fn build_http_app(state: AppState) -> Router {
    let cors = CorsLayer::very_permissive();

    Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/verify", get(auth::verify_handler))
        .route(
            "/data/{entity}",
            get(data::list_documents).post(data::create_document),
        )
        .route("/data/{entity}/{id}", delete(data::delete_document))
        .route("/api/report", post(reports::submit_report))
        .route("/api/reports", get(reports::list_reports))
        .route("/api/alerts", get(alerts::list_alerts))
        .route("/api/clear", post(reports::clear_reports))
        .route("/api/prediction", post(prediction::predict_handler))
        .route("/api/prediction/features", get(prediction::features_handler))
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
