//! HTTP route tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use churnwise_classifiers::config::PipelineConfig;
use churnwise_classifiers::io::ArtifactPaths;
use churnwise_classifiers::serving::ServingModels;
use churnwise_cli::config::AppConfig;
use churnwise_cli::server::{build_router, AppState};

fn fixture_path() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/raw/customer_data.csv")
}

fn test_state(model_dir: &std::path::Path) -> AppState {
    AppState::new(AppConfig {
        data_path: fixture_path(),
        model_dir: model_dir.to_path_buf(),
        ..AppConfig::default()
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn scenario_body(model_type: &str) -> Value {
    json!({
        "model_type": model_type,
        "age": 25,
        "monthly_spend": 299,
        "tenure": 6,
        "recharge_type": 0,
        "data_usage": 12,
        "complaints": 2
    })
}

// ---------------------------------------------------------------------------
// /api/metrics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn metrics_are_404_until_a_training_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let model_dir = dir.path().join("models");
    // No dataset and no artifacts: nothing to restore or train from.
    let state = AppState::new(AppConfig {
        data_path: dir.path().join("missing.csv"),
        model_dir: model_dir.clone(),
        ..AppConfig::default()
    });
    let app = build_router(state.clone());

    let (status, body) = get(&app, "/api/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "Metrics not available");
    assert!(state.try_ready().is_none());

    ServingModels::train_and_persist(
        fixture_path(),
        &PipelineConfig::default(),
        &ArtifactPaths::in_dir(&model_dir),
    )
    .unwrap();

    let (status, body) = get(&app, "/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    for model in ["decision_tree", "knn"] {
        for field in ["accuracy", "precision", "recall", "f1_score", "confusion_matrix"] {
            assert!(body[model].get(field).is_some(), "{}.{} missing", model, field);
        }
    }
    assert!(body["comparison"].get("recommended_model").is_some());
}

#[tokio::test]
async fn metrics_request_initializes_a_fresh_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let app = build_router(state.clone());

    let (status, _) = get(&app, "/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.try_ready().is_some());
    assert!(dir.path().join("model_metrics.json").exists());
}

// ---------------------------------------------------------------------------
// /api/predict
// ---------------------------------------------------------------------------

#[tokio::test]
async fn predict_scenario_with_decision_tree() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let (status, body) = post_json(&app, "/api/predict", scenario_body("decision_tree")).await;
    assert_eq!(status, StatusCode::OK);

    let prediction = body["prediction"].as_str().unwrap();
    assert!(prediction == "Churn" || prediction == "No Churn");
    assert_eq!(body["model_used"], "Decision Tree");
    match &body["probability"] {
        Value::Null => assert!(body.get("confidence").is_none()),
        p => {
            let p = p.as_f64().unwrap();
            assert!((0.0..=1.0).contains(&p));
            let confidence = body["confidence"].as_str().unwrap();
            assert!(confidence == "High" || confidence == "Medium");
        }
    }
    let value = body["prediction_value"].as_u64().unwrap();
    assert_eq!(value == 1, prediction == "Churn");
}

#[tokio::test]
async fn predict_initializes_lazily_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let app = build_router(state.clone());
    assert!(state.try_ready().is_none());

    let (status, body) = post_json(&app, "/api/predict", scenario_body("best")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.try_ready().is_some());
    assert!(dir.path().join("model_metrics.json").exists());

    let expected = state.try_ready().unwrap().metrics().best_model();
    assert_eq!(body["model_used"], expected.display_name());
}

#[tokio::test]
async fn predict_accepts_numeric_strings_and_plan_labels() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let body = json!({
        "model_type": "knn",
        "age": "42",
        "monthly_spend": "799.5",
        "tenure": 24,
        "recharge_type": "Postpaid",
        "data_usage": 35,
        "complaints": "0"
    });
    let (status, body) = post_json(&app, "/api/predict", body).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["model_used"], "KNN");
}

#[tokio::test]
async fn predict_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let (status, body) = post_json(&app, "/api/predict", scenario_body("svm")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Unknown model type"));

    let mut missing = scenario_body("knn");
    missing.as_object_mut().unwrap().remove("age");
    let (status, body) = post_json(&app, "/api/predict", missing).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("error").is_some());

    let mut garbled = scenario_body("knn");
    garbled["tenure"] = json!("six");
    let (status, _) = post_json(&app, "/api/predict", garbled).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut unknown_plan = scenario_body("knn");
    unknown_plan["recharge_type"] = json!(99);
    let (status, _) = post_json(&app, "/api/predict", unknown_plan).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn predict_rejects_features_that_overflow_after_scaling() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    for model_type in ["knn", "decision_tree"] {
        let mut huge = scenario_body(model_type);
        huge["monthly_spend"] = json!(1e200);
        let (status, body) = post_json(&app, "/api/predict", huge).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("error").is_some());
    }

    // The server keeps answering afterwards.
    let (status, _) = post_json(&app, "/api/predict", scenario_body("knn")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_requests_initialize_once() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let app = build_router(state.clone());

    let requests: Vec<_> = (0..8)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { post_json(&app, "/api/predict", scenario_body("best")).await })
        })
        .collect();
    let direct: Vec<_> = (0..4)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move { state.ready().await.unwrap() })
        })
        .collect();

    for handle in requests {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK, "{}", body);
    }
    let shared = state.try_ready().unwrap();
    for handle in direct {
        assert!(Arc::ptr_eq(&handle.await.unwrap(), &shared));
    }

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("model_metrics.json")).unwrap())
            .unwrap();
    assert_eq!(written["trained_at"], json!(shared.metrics().trained_at));
}

// ---------------------------------------------------------------------------
// /api/evaluate_dataset and /api/dataset
// ---------------------------------------------------------------------------

#[tokio::test]
async fn evaluate_dataset_scores_every_customer() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let (status, body) = post_json(&app, "/api/evaluate_dataset", json!({"model_type": "decision_tree"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 8);
    assert_eq!(body["model_used"], "Decision Tree");

    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 8);
    assert_eq!(predictions[0]["customer_id"], "C001");
    assert_eq!(predictions[0]["actual"], "Churn");
    let churned = predictions.iter().filter(|p| p["prediction"] == "Churn").count();
    assert_eq!(body["churned"], churned);
    let accuracy = body["accuracy"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&accuracy));
}

#[tokio::test]
async fn dataset_returns_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let (status, body) = get(&app, "/api/dataset").await;
    assert_eq!(status, StatusCode::OK);
    let rows: Value = serde_json::from_slice(&body).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 8);
    assert_eq!(rows[0]["Customer_ID"], "C001");
    assert_eq!(rows[0]["Recharge_Type"], "Prepaid (28 Days)");
    assert_eq!(rows[7]["Churn"], "Yes");
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_renders_home_with_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let (status, body) = get(&app, "/no/such/page").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(String::from_utf8(body).unwrap().contains("Telecom Customer Churn Prediction"));
}

#[tokio::test]
async fn analysis_page_shows_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let (status, body) = get(&app, "/analysis").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Churn rate"));
    assert!(html.contains("Prepaid (28 Days)"));
}

#[tokio::test]
async fn predict_page_offers_every_model() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let (status, body) = get(&app, "/predict").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    for key in ["best", "decision_tree", "knn"] {
        assert!(html.contains(&format!("value=\"{}\"", key)), "missing option {}", key);
    }
}

#[tokio::test]
async fn comparison_page_lists_both_models() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let (status, body) = get(&app, "/comparison").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Decision Tree"));
    assert!(html.contains("KNN"));
    assert!(html.contains("Recommended model"));
}

#[tokio::test]
async fn home_page_fails_with_500_when_models_cannot_be_built() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(AppConfig {
        data_path: dir.path().join("missing.csv"),
        model_dir: dir.path().join("models"),
        ..AppConfig::default()
    });
    let app = build_router(state.clone());

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(String::from_utf8(body).unwrap().contains("Telecom Customer Churn Prediction"));
    assert!(state.try_ready().is_none());
}
