use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::rest::validation::{non_empty, positive_id, time_intervals, Pagination};
use crate::error::AppError;
use crate::models::order::{CompleteOrder, NewOrder, OrderAssignment, OrderRecord};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", get(list_orders).post(create_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/assign", post(assign_orders))
        .route("/orders/complete", post(complete_orders))
}

#[derive(Deserialize)]
pub struct CreateOrdersRequest {
    pub orders: Vec<NewOrder>,
}

#[derive(Serialize)]
pub struct CreateOrdersResponse {
    pub orders: Vec<OrderRecord>,
}

#[derive(Serialize)]
pub struct GetOrdersResponse {
    pub orders: Vec<OrderRecord>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Deserialize)]
pub struct AssignOrdersRequest {
    pub assignments: Vec<OrderAssignment>,
}

#[derive(Deserialize)]
pub struct CompleteOrdersRequest {
    pub complete_info: Vec<CompleteOrder>,
}

fn validate_order(order: &NewOrder) -> Result<(), AppError> {
    if !(order.weight.is_finite() && order.weight > 0.0) {
        return Err(AppError::BadRequest("weight must be > 0".to_string()));
    }
    if order.region <= 0 {
        return Err(AppError::BadRequest("region must be > 0".to_string()));
    }
    if order.cost < 0 {
        return Err(AppError::BadRequest("cost must be >= 0".to_string()));
    }
    time_intervals("delivery_hours", &order.delivery_hours)
}

async fn create_orders(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrdersRequest>,
) -> Result<Json<CreateOrdersResponse>, AppError> {
    non_empty("orders", &payload.orders)?;
    for order in &payload.orders {
        validate_order(order)?;
    }

    let orders = state.orders.add_orders(&payload.orders).await?;
    Ok(Json(CreateOrdersResponse { orders }))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderRecord>, AppError> {
    let id = positive_id("order id", id)?;
    Ok(Json(state.orders.order(id).await?))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> Result<Json<GetOrdersResponse>, AppError> {
    let (limit, offset) = page.resolve()?;
    let orders = state.orders.orders(limit, offset).await?;

    Ok(Json(GetOrdersResponse {
        orders,
        limit,
        offset,
    }))
}

async fn assign_orders(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AssignOrdersRequest>,
) -> Result<Json<Vec<OrderRecord>>, AppError> {
    non_empty("assignments", &payload.assignments)?;
    for assignment in &payload.assignments {
        positive_id("courier_id", assignment.courier_id)?;
        positive_id("order_id", assignment.order_id)?;
    }

    Ok(Json(state.orders.assign_orders(&payload.assignments).await?))
}

async fn complete_orders(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CompleteOrdersRequest>,
) -> Result<Json<Vec<OrderRecord>>, AppError> {
    non_empty("complete_info", &payload.complete_info)?;
    for completion in &payload.complete_info {
        positive_id("courier_id", completion.courier_id)?;
        positive_id("order_id", completion.order_id)?;
    }

    Ok(Json(state.orders.complete_orders(&payload.complete_info).await?))
}
