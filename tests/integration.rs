use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use courier_ledger::api::rest::router;
use courier_ledger::engine::scoring::FactorTable;
use courier_ledger::state::AppState;
use courier_ledger::storage::memory::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> axum::Router {
    let state = AppState::new(Arc::new(MemoryStore::new()), FactorTable::default());
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn create_courier(app: &axum::Router, courier_type: &str) -> i64 {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/couriers",
            json!({
                "couriers": [{
                    "courier_type": courier_type,
                    "regions": [1, 2, 3],
                    "working_hours": ["10:00-12:00"]
                }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["couriers"][0]["courier_id"]
        .as_i64()
        .unwrap()
}

async fn create_order(app: &axum::Router, cost: i64) -> i64 {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "orders": [{
                    "weight": 2.5,
                    "region": 1,
                    "delivery_hours": ["10:00-12:00", "14:00-15:00"],
                    "cost": cost
                }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["orders"][0]["order_id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    app.clone()
        .oneshot(get_request("/couriers/1"))
        .await
        .unwrap();

    let response = app.oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("store_operations_total"));
    assert!(body.contains("not_found"));
}

#[tokio::test]
async fn create_and_get_courier() {
    let app = setup();
    let courier_id = create_courier(&app, "FOOT").await;

    let res = app
        .oneshot(get_request(&format!("/couriers/{courier_id}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["courier_type"], "FOOT");
    assert_eq!(body["regions"], json!([1, 2, 3]));
    assert_eq!(body["working_hours"], json!(["10:00-12:00"]));
}

#[tokio::test]
async fn invalid_working_hours_return_400() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/couriers",
            json!({
                "couriers": [{
                    "courier_type": "BIKE",
                    "regions": [1],
                    "working_hours": ["10:00-12:90"]
                }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_region_rejects_whole_batch() {
    let app = setup();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/couriers",
            json!({
                "couriers": [
                    { "courier_type": "FOOT", "regions": [1], "working_hours": ["08:00-09:00"] },
                    { "courier_type": "AUTO", "regions": [4, 4], "working_hours": ["08:00-09:00"] }
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let res = app
        .oneshot(get_request("/couriers?limit=10"))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body["couriers"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn get_nonexistent_courier_returns_404() {
    let app = setup();
    let response = app.oneshot(get_request("/couriers/999")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_positive_id_returns_400() {
    let app = setup();
    let response = app.oneshot(get_request("/orders/-1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_past_the_end_is_empty_success() {
    let app = setup();
    create_order(&app, 10).await;

    let res = app
        .oneshot(get_request("/orders?limit=5&offset=3"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["orders"].as_array().unwrap().len(), 0);
    assert_eq!(body["limit"], 5);
    assert_eq!(body["offset"], 3);
}

#[tokio::test]
async fn list_defaults_to_single_item() {
    let app = setup();
    create_courier(&app, "FOOT").await;
    create_courier(&app, "BIKE").await;

    let res = app.oneshot(get_request("/couriers")).await.unwrap();
    let body = body_json(res).await;

    assert_eq!(body["couriers"].as_array().unwrap().len(), 1);
    assert_eq!(body["couriers"][0]["courier_type"], "FOOT");
    assert_eq!(body["limit"], 1);
    assert_eq!(body["offset"], 0);
}

#[tokio::test]
async fn completing_unassigned_order_returns_400() {
    let app = setup();
    let courier_id = create_courier(&app, "AUTO").await;
    let order_id = create_order(&app, 30).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders/complete",
            json!({
                "complete_info": [{
                    "courier_id": courier_id,
                    "order_id": order_id,
                    "complete_time": "2023-05-01T12:00:00Z"
                }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .oneshot(get_request(&format!("/orders/{order_id}")))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert!(body["completed_time"].is_null());
    assert!(body["courier_id"].is_null());
}

#[tokio::test]
async fn full_completion_flow_feeds_meta_info() {
    let app = setup();
    let courier_id = create_courier(&app, "AUTO").await;
    let mut order_ids = Vec::new();
    for cost in [5, 10, 15] {
        order_ids.push(create_order(&app, cost).await);
    }

    let assignments: Vec<Value> = order_ids
        .iter()
        .map(|order_id| json!({ "courier_id": courier_id, "order_id": order_id }))
        .collect();
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders/assign",
            json!({ "assignments": assignments }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let complete_info: Vec<Value> = order_ids
        .iter()
        .map(|order_id| {
            json!({
                "courier_id": courier_id,
                "order_id": order_id,
                "complete_time": "2023-05-01T09:15:00Z"
            })
        })
        .collect();
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders/complete",
            json!({ "complete_info": complete_info }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let completed = body_json(res).await;
    let completed = completed.as_array().unwrap();
    assert_eq!(completed.len(), 3);
    for order in completed {
        assert_eq!(order["courier_id"], courier_id);
        assert!(!order["completed_time"].is_null());
        assert_eq!(order["delivery_hours"].as_array().unwrap().len(), 2);
    }

    let res = app
        .clone()
        .oneshot(get_request(&format!(
            "/couriers/meta-info/{courier_id}?start_date=2023-05-01&end_date=2023-05-02"
        )))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let info = body_json(res).await;
    assert_eq!(info["earnings"], 120);
    assert_eq!(info["rating"], 0);
    assert_eq!(info["courier_type"], "AUTO");

    let res = app
        .oneshot(get_request(&format!(
            "/couriers/meta-info/{courier_id}?start_date=2023-06-01&end_date=2023-06-02"
        )))
        .await
        .unwrap();
    let info = body_json(res).await;
    assert_eq!(info["earnings"], 0);
    assert_eq!(info["rating"], 0);
}

#[tokio::test]
async fn malformed_meta_info_dates_return_400() {
    let app = setup();
    let courier_id = create_courier(&app, "FOOT").await;

    let res = app
        .oneshot(get_request(&format!(
            "/couriers/meta-info/{courier_id}?start_date=2023-05-01&end_date=tomorrow"
        )))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
