use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use predict_server::model::ModelHandle;
use predict_server::server::config::ServerConfig;
use predict_server::web::create_axum_router;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

fn demo_artifact() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demo/model_pipeline.json")
}

fn app_with_model(path: PathBuf) -> Router {
    let config = ServerConfig {
        model_path: path,
        predict_timeout_ms: Some(2000),
        ..ServerConfig::default()
    };
    let model = ModelHandle::load(&config.model_path);
    create_axum_router(model, Arc::new(config))
}

async fn predict(app: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_insurance_demo_predicts_charges() {
    let app = app_with_model(demo_artifact());
    let (status, body) = predict(
        app,
        json!({
            "age": 31,
            "bmi": 34.39,
            "children": 3,
            "smoker": "yes",
            "sex": "male",
            "region": "northwest"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let charges = body["prediction"].as_f64().unwrap();
    assert!((charges - 32478.5575).abs() < 1e-6, "charges = {charges}");
}

#[tokio::test]
async fn test_baseline_categories_contribute_nothing() {
    let app = app_with_model(demo_artifact());
    let (status, body) = predict(
        app,
        json!({
            "region": "northeast",
            "sex": "female",
            "smoker": "no",
            "children": 0,
            "bmi": 30,
            "age": 40
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "prediction": 8509.0 }));
}

#[tokio::test]
async fn test_form_style_string_numbers_are_accepted() {
    let app = app_with_model(demo_artifact());
    let (status, _) = predict(
        app,
        json!({
            "age": "40",
            "bmi": "30",
            "children": "0",
            "smoker": "no",
            "sex": "female",
            "region": "northeast"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_region_is_a_client_error() {
    let app = app_with_model(demo_artifact());
    let (status, body) = predict(
        app,
        json!({
            "age": 40,
            "bmi": 30,
            "children": 0,
            "smoker": "no",
            "sex": "female",
            "region": "atlantis"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Feature 'region' has unknown category 'atlantis'"
    );
}

#[tokio::test]
async fn test_missing_artifact_disables_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_model(dir.path().join("model_pipeline.json"));
    let (status, body) = predict(app, json!({ "age": 30, "income": 50000 })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "error": "Model not loaded. Please check server logs." })
    );
}
