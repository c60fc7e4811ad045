mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{small_config, synthetic_rows};
use review_risk::model::train_model;
use review_risk::server::{router, AppState, PredictResponse};
use serde_json::{json, Value};
use std::sync::OnceLock;
use tower::ServiceExt;

fn app() -> Router {
    static STATE: OnceLock<AppState> = OnceLock::new();
    let state = STATE.get_or_init(|| {
        let artifact = train_model(&synthetic_rows(900), &small_config()).unwrap();
        AppState::new(artifact, 5)
    });
    router(state.clone())
}

async fn call(request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn post_json(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_model_version() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = call(request).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["model_version"].as_str().unwrap().starts_with(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn test_predict_returns_probability_level_and_explanation() {
    let body = json!({
        "order_value": 189.9,
        "freight_value": 110.0,
        "num_items": 1,
        "payment_type": "boleto",
        "payment_installments": 1,
        "payment_value": 299.9,
        "order_purchase_timestamp": "2017-06-01 10:00:00",
        "order_estimated_delivery_date": "2017-06-20 00:00:00",
        "product_weight_g": 800,
        "customer_state": "SP",
        "seller_state": "SP",
        "seller_id": "seller-bad",
        "product_category": "housewares"
    });
    let (status, bytes) = call(post_json(body.to_string())).await;

    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&bytes));
    let response: PredictResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(response.risk_probability > 0.0 && response.risk_probability < 1.0);
    assert_eq!(response.top_features.len(), 5);

    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(["low", "medium", "high"].contains(&json["risk_level"].as_str().unwrap()));
    assert!(json["top_features"][0]["feature"].is_string());
    assert!(json["top_features"][0]["impact"].is_number());
}

#[tokio::test]
async fn test_predict_accepts_an_empty_object() {
    let (status, _) = call(post_json("{}".to_string())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_values_are_unprocessable() {
    let (status, bytes) = call(post_json(json!({"order_value": -5.0}).to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json["error"].as_str().unwrap().contains("order_value"));

    let (status, _) = call(post_json(json!({"order_purchase_timestamp": "soon"}).to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let (status, _) = call(post_json("{not json".to_string())).await;
    assert!(status.is_client_error());

    let (status, _) = call(post_json(json!({"order_value": "cheap"}).to_string())).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_unknown_route() {
    let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
    let (status, _) = call(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
