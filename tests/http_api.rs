use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use noshow_predictor::classifiers::{Classifier, LogisticParams, LogisticRegression};
use noshow_predictor::config::PipelineConfig;
use noshow_predictor::predictor::ModelStore;
use noshow_predictor::server::{router, AppState};

fn logistic_menu(_seed: u64) -> Vec<Box<dyn Classifier>> {
    vec![Box::new(LogisticRegression::new(LogisticParams::default()))]
}

fn app() -> Router {
    let config = PipelineConfig {
        records: 500,
        ..PipelineConfig::default()
    };
    router(Arc::new(AppState::new(
        ModelStore::new(),
        config,
        logistic_menu,
    )))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn patient() -> Value {
    json!({
        "Age": 34,
        "Gender": "M",
        "Scholarship": 0,
        "Hipertension": 1,
        "Diabetes": 0,
        "Alcoholism": 0,
        "Handcap": 0,
        "SMS_received": 1,
        "days_between": 3,
        "scheduled_weekday": 0,
        "appointment_weekday": 3
    })
}

#[tokio::test]
async fn dashboard_is_served() {
    let app = app();
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("No-Show Predictor"));
}

#[tokio::test]
async fn untrained_requests_conflict() {
    let app = app();

    let (status, body) = send(&app, "POST", "/predict", Some(patient())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "model not trained yet");

    let (status, _) = send(&app, "GET", "/model_performance", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn train_then_predict() {
    let app = app();

    let (status, body) = send(&app, "POST", "/train", Some(json!({ "records": 500, "seed": 7 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["best_model"], "Logistic Regression");
    assert!(body["metrics"]["roc_auc"].as_f64().is_some());

    let (status, performance) = send(&app, "GET", "/model_performance", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(performance["run_id"], body["run_id"]);
    assert_eq!(performance["models"].as_array().unwrap().len(), 1);
    let curve = performance["roc_curve"].as_array().unwrap();
    assert_eq!(curve.first().unwrap()["fpr"], 0.0);
    assert_eq!(curve.last().unwrap()["tpr"], 1.0);
    let importance = performance["feature_importance"].as_array().unwrap();
    assert!(!importance.is_empty() && importance.len() <= 10);

    let (status, prediction) = send(&app, "POST", "/predict", Some(patient())).await;
    assert_eq!(status, StatusCode::OK);
    let probability = prediction["no_show_probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&probability));
    assert!(["Low", "Medium", "High"].contains(&prediction["risk_level"].as_str().unwrap()));
}

#[tokio::test]
async fn train_without_body_uses_config() {
    let app = app();
    let (status, body) = send(&app, "POST", "/train", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn malformed_prediction_names_the_field() {
    let app = app();
    send(&app, "POST", "/train", None).await;

    let mut incomplete = patient();
    incomplete.as_object_mut().unwrap().remove("appointment_weekday");
    let (status, body) = send(&app, "POST", "/predict", Some(incomplete)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("appointment_weekday"));

    let (status, _) = send(&app, "POST", "/predict", Some(json!({ "Age": "old" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn wrongly_typed_fields_are_named() {
    let app = app();
    send(&app, "POST", "/train", None).await;

    let mut too_old = patient();
    too_old["Age"] = json!(300);
    let (status, body) = send(&app, "POST", "/predict", Some(too_old)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("Age"));

    let mut negative_days = patient();
    negative_days["days_between"] = json!(-3);
    let (status, body) = send(&app, "POST", "/predict", Some(negative_days)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("days_between"));
}

#[tokio::test]
async fn failed_retrain_keeps_the_previous_run() {
    let app = app();
    let (status, first) = send(&app, "POST", "/train", None).await;
    assert_eq!(status, StatusCode::OK);

    // one record cannot be split into train and test sets
    let (status, body) = send(&app, "POST", "/train", Some(json!({ "records": 1 }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().is_some());

    let (status, performance) = send(&app, "GET", "/model_performance", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(performance["run_id"], first["run_id"]);

    let (status, _) = send(&app, "POST", "/predict", Some(patient())).await;
    assert_eq!(status, StatusCode::OK);
}
