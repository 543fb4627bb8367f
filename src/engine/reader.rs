use std::sync::Arc;

use tracing::debug;

use crate::engine::scoring::DateWindow;
use crate::error::AppError;
use crate::models::courier::CourierRecord;
use crate::models::order::OrderRecord;
use crate::storage::{OrderRow, Storage};

/// Rebuilds courier and order aggregates from their parent and child rows.
/// Reads run outside any transaction.
#[derive(Clone)]
pub struct AggregateReader {
    store: Arc<dyn Storage>,
}

impl AggregateReader {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    pub async fn courier(&self, courier_id: i64) -> Result<CourierRecord, AppError> {
        let row = self
            .store
            .courier(courier_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("courier {courier_id} not found")))?;

        let regions = self.store.courier_regions(courier_id).await?;
        let working_hours = self.store.courier_working_hours(courier_id).await?;

        Ok(CourierRecord {
            courier_id: row.courier_id,
            courier_type: row.courier_type,
            regions,
            working_hours,
        })
    }

    /// Fails with `NotFound` when the page holds no couriers.
    pub async fn couriers(&self, limit: i64, offset: i64) -> Result<Vec<CourierRecord>, AppError> {
        let ids = self.store.courier_ids(limit, offset).await?;
        if ids.is_empty() {
            return Err(AppError::NotFound(format!(
                "no couriers at offset {offset}"
            )));
        }

        debug!(count = ids.len(), limit, offset, "loading courier page");

        let mut couriers = Vec::with_capacity(ids.len());
        for courier_id in ids {
            couriers.push(self.courier(courier_id).await?);
        }
        Ok(couriers)
    }

    pub async fn order(&self, order_id: i64) -> Result<OrderRecord, AppError> {
        let row = self
            .store
            .order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        let delivery_hours = self.store.order_delivery_hours(order_id).await?;
        Ok(order_record(row, delivery_hours))
    }

    /// Fails with `NotFound` when the page holds no orders.
    pub async fn orders(&self, limit: i64, offset: i64) -> Result<Vec<OrderRecord>, AppError> {
        let ids = self.store.order_ids(limit, offset).await?;
        if ids.is_empty() {
            return Err(AppError::NotFound(format!("no orders at offset {offset}")));
        }

        debug!(count = ids.len(), limit, offset, "loading order page");

        let mut orders = Vec::with_capacity(ids.len());
        for order_id in ids {
            orders.push(self.order(order_id).await?);
        }
        Ok(orders)
    }

    pub async fn costs(&self, courier_id: i64, window: &DateWindow) -> Result<Vec<i64>, AppError> {
        let (from, to) = window.bounds();
        Ok(self.store.completed_costs(courier_id, from, to).await?)
    }
}

pub(crate) fn order_record(row: OrderRow, delivery_hours: Vec<String>) -> OrderRecord {
    OrderRecord {
        order_id: row.order_id,
        weight: row.weight,
        region: row.region,
        delivery_hours,
        cost: row.cost,
        assigned_courier_id: row.assigned_courier_id,
        courier_id: row.courier_id,
        completed_time: row.completed_time,
    }
}
