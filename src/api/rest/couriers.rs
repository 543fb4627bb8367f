use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::rest::validation::{non_empty, positive_id, time_intervals, Pagination};
use crate::error::AppError;
use crate::models::courier::{CourierMetaInfo, CourierRecord, NewCourier};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers", get(list_couriers).post(create_couriers))
        .route("/couriers/:id", get(get_courier))
        .route("/couriers/meta-info/:id", get(get_courier_meta_info))
}

#[derive(Deserialize)]
pub struct CreateCouriersRequest {
    pub couriers: Vec<NewCourier>,
}

#[derive(Serialize)]
pub struct CreateCouriersResponse {
    pub couriers: Vec<CourierRecord>,
}

#[derive(Serialize)]
pub struct GetCouriersResponse {
    pub couriers: Vec<CourierRecord>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Deserialize)]
pub struct MetaInfoQuery {
    pub start_date: String,
    pub end_date: String,
}

fn validate_courier(courier: &NewCourier) -> Result<(), AppError> {
    non_empty("regions", &courier.regions)?;
    if courier.regions.iter().any(|region| *region <= 0) {
        return Err(AppError::BadRequest("regions must be > 0".to_string()));
    }
    time_intervals("working_hours", &courier.working_hours)
}

async fn create_couriers(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCouriersRequest>,
) -> Result<Json<CreateCouriersResponse>, AppError> {
    non_empty("couriers", &payload.couriers)?;
    for courier in &payload.couriers {
        validate_courier(courier)?;
    }

    let couriers = state.couriers.add_couriers(&payload.couriers).await?;
    Ok(Json(CreateCouriersResponse { couriers }))
}

async fn get_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CourierRecord>, AppError> {
    let id = positive_id("courier id", id)?;
    Ok(Json(state.couriers.courier(id).await?))
}

async fn list_couriers(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> Result<Json<GetCouriersResponse>, AppError> {
    let (limit, offset) = page.resolve()?;
    let couriers = state.couriers.couriers(limit, offset).await?;

    Ok(Json(GetCouriersResponse {
        couriers,
        limit,
        offset,
    }))
}

async fn get_courier_meta_info(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<MetaInfoQuery>,
) -> Result<Json<CourierMetaInfo>, AppError> {
    let id = positive_id("courier id", id)?;
    let info = state
        .couriers
        .meta_info(id, &query.start_date, &query.end_date)
        .await?;
    Ok(Json(info))
}
