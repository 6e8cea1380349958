mod common;

use axum::http::StatusCode;
use common::{build_test_context, build_test_context_with_model, request_json, request_no_body, submit_report};
use serde_json::{json, Value};

#[tokio::test]
async fn unavailable_model_returns_503_payload() {
    let ctx = build_test_context().expect("context should build");
    assert!(!ctx.state.model.is_loaded());

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        "/api/prediction",
        None,
        Some(json!({ "ph": 7.0, "cases": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body["error"],
        "Model not loaded. Please train and save the model first."
    );
    assert_eq!(body["predicted_risk_level"], Value::Null);
    assert_eq!(body["probabilities"], Value::Null);
    assert_eq!(body["confidence"], Value::Null);
    assert_eq!(body["prediction"], -1);
}

#[tokio::test]
async fn prediction_uses_defaults_and_legacy_code() {
    let ctx = build_test_context_with_model().expect("context should build");
    assert!(ctx.state.model.is_loaded());

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        "/api/prediction",
        None,
        Some(json!({ "ph": 7.2, "total_cases": 12 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted_risk_level"], "High Risk");
    assert_eq!(body["prediction"], 3);
    assert_eq!(body["confidence"], 0.8);
    assert_eq!(body["probabilities"]["Medium Risk"], 0.2);

    let features = &body["input_features"];
    assert_eq!(features["Total_Cases"], 12.0);
    assert_eq!(features["TDS"], 414.0);
    assert_eq!(features["F"], 0.35);
    assert_eq!(features["NO3"], 13.0);
    assert_eq!(features["Cl"], 50.0);
    assert_eq!(features["EC in uS/cm"], 643.0);
    assert!(body["interpretation"]
        .as_str()
        .unwrap()
        .ends_with("Prediction confidence: 80.0%"));
}

#[tokio::test]
async fn missing_ph_is_a_bad_request() {
    let ctx = build_test_context_with_model().expect("context should build");
    let (status, body) = request_json(
        &ctx.app,
        "POST",
        "/api/prediction",
        None,
        Some(json!({ "cases": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Prediction failed: pH is required for prediction");
    assert_eq!(body["predicted_risk_level"], Value::Null);
}

#[tokio::test]
async fn reports_carry_ai_fields_when_model_is_loaded() {
    let ctx = build_test_context_with_model().expect("context should build");

    let resp = submit_report(&ctx.app, json!({ "ph": 7.2, "cases": 8 })).await;
    assert_eq!(resp["risk"], "Medium");
    assert_eq!(resp["ai_prediction"], "Medium Risk");
    assert_eq!(resp["ai_confidence"], 0.9);

    // no pH, no classification
    let resp = submit_report(&ctx.app, json!({ "cases": 8 })).await;
    assert_eq!(resp["ai_prediction"], Value::Null);

    let (_, body) = request_no_body(&ctx.app, "GET", "/api/reports", None).await;
    assert_eq!(body["items"][1]["ai_prediction"], "Medium Risk");

    let (_, body) = request_no_body(&ctx.app, "GET", "/api/alerts", None).await;
    let alerts = body["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[1]["ai_prediction"], "Medium Risk");
}

#[tokio::test]
async fn features_endpoint_describes_the_model() {
    let ctx = build_test_context_with_model().expect("context should build");
    let (status, body) = request_no_body(&ctx.app, "GET", "/api/prediction/features", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["feature_names"].as_array().unwrap().len(), 7);
    assert_eq!(body["accuracy"], 0.91);
    assert_eq!(body["optional_defaults"]["ec"], 643.0);

    let ctx = build_test_context().expect("context should build");
    let (_, body) = request_no_body(&ctx.app, "GET", "/api/prediction/features", None).await;
    assert_eq!(body["model_loaded"], false);
    assert!(body["error"].is_string());
}
