use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::engine::reader::order_record;
use crate::error::AppError;
use crate::models::courier::{CourierRecord, NewCourier};
use crate::models::order::{CompleteOrder, NewOrder, OrderAssignment, OrderRecord};
use crate::observability::metrics::Metrics;
use crate::storage::{Storage, Transaction};

/// Multi-row writes. Each call runs as one transaction: items are written in
/// input order and the first failing item rolls back the whole batch.
#[derive(Clone)]
pub struct AggregateWriter {
    store: Arc<dyn Storage>,
    metrics: Metrics,
}

impl AggregateWriter {
    pub fn new(store: Arc<dyn Storage>, metrics: Metrics) -> Self {
        Self { store, metrics }
    }

    pub async fn add_couriers(
        &self,
        couriers: &[NewCourier],
    ) -> Result<Vec<CourierRecord>, AppError> {
        debug!(batch = couriers.len(), "adding couriers");

        let mut tx = self.store.begin().await?;
        let result = self.insert_couriers(tx.as_mut(), couriers).await;
        self.finish("add_couriers", tx, result).await
    }

    pub async fn add_orders(&self, orders: &[NewOrder]) -> Result<Vec<OrderRecord>, AppError> {
        debug!(batch = orders.len(), "adding orders");

        let mut tx = self.store.begin().await?;
        let result = insert_orders(tx.as_mut(), orders).await;
        self.finish("add_orders", tx, result).await
    }

    pub async fn assign_orders(
        &self,
        assignments: &[OrderAssignment],
    ) -> Result<Vec<OrderRecord>, AppError> {
        debug!(batch = assignments.len(), "assigning orders");

        let mut tx = self.store.begin().await?;
        let result = assign(tx.as_mut(), assignments).await;
        self.finish("assign_orders", tx, result).await
    }

    pub async fn set_completed(
        &self,
        completions: &[CompleteOrder],
    ) -> Result<Vec<OrderRecord>, AppError> {
        debug!(batch = completions.len(), "completing orders");

        let mut tx = self.store.begin().await?;
        let result = complete(tx.as_mut(), completions).await;
        self.finish("set_completed", tx, result).await
    }

    async fn insert_couriers(
        &self,
        tx: &mut dyn Transaction,
        couriers: &[NewCourier],
    ) -> Result<Vec<CourierRecord>, AppError> {
        let mut added = Vec::with_capacity(couriers.len());

        for courier in couriers {
            let courier_type_id = self
                .store
                .courier_type_id(courier.courier_type)
                .await?
                .ok_or(AppError::UnknownCourierType(courier.courier_type))?;

            let row = tx.insert_courier(courier_type_id).await?;

            let mut regions = Vec::with_capacity(courier.regions.len());
            for region in &courier.regions {
                regions.push(tx.insert_courier_region(row.courier_id, *region).await?);
            }

            let mut working_hours = Vec::with_capacity(courier.working_hours.len());
            for interval in &courier.working_hours {
                working_hours.push(tx.insert_working_hours(row.courier_id, interval).await?);
            }

            added.push(CourierRecord {
                courier_id: row.courier_id,
                courier_type: row.courier_type,
                regions,
                working_hours,
            });
        }

        Ok(added)
    }

    async fn finish<T>(
        &self,
        operation: &'static str,
        tx: Box<dyn Transaction>,
        result: Result<T, AppError>,
    ) -> Result<T, AppError> {
        match result {
            Ok(value) => {
                tx.commit().await?;
                info!(operation, "batch committed");
                Ok(value)
            }
            Err(err) => {
                self.metrics
                    .batch_rollbacks_total
                    .with_label_values(&[operation])
                    .inc();
                warn!(operation, error = %err, "rolling back batch");

                if let Err(rollback_err) = tx.rollback().await {
                    error!(operation, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

async fn insert_orders(
    tx: &mut dyn Transaction,
    orders: &[NewOrder],
) -> Result<Vec<OrderRecord>, AppError> {
    let mut added = Vec::with_capacity(orders.len());

    for order in orders {
        let row = tx.insert_order(order).await?;

        let mut delivery_hours = Vec::with_capacity(order.delivery_hours.len());
        for interval in &order.delivery_hours {
            delivery_hours.push(tx.insert_delivery_hours(row.order_id, interval).await?);
        }

        let stored = tx.order(row.order_id).await?.ok_or_else(|| {
            AppError::Internal(format!("order {} vanished after insert", row.order_id))
        })?;
        if stored.completed_time.is_some() || stored.courier_id.is_some() {
            return Err(AppError::Internal(format!(
                "order {} was created already completed",
                stored.order_id
            )));
        }

        added.push(order_record(stored, delivery_hours));
    }

    Ok(added)
}

async fn assign(
    tx: &mut dyn Transaction,
    assignments: &[OrderAssignment],
) -> Result<Vec<OrderRecord>, AppError> {
    let mut assigned = Vec::with_capacity(assignments.len());

    for assignment in assignments {
        let order = tx
            .order(assignment.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", assignment.order_id)))?;

        if !tx.courier_exists(assignment.courier_id).await? {
            return Err(AppError::NotFound(format!(
                "courier {} not found",
                assignment.courier_id
            )));
        }

        if let Some(recorded) = order.recorded_courier() {
            if recorded != assignment.courier_id {
                return Err(AppError::OwnershipMismatch {
                    order_id: assignment.order_id,
                    courier_id: assignment.courier_id,
                });
            }
        }

        let row = tx
            .assign_order(assignment.order_id, assignment.courier_id)
            .await?;
        let delivery_hours = tx.delivery_hours(row.order_id).await?;
        assigned.push(order_record(row, delivery_hours));
    }

    Ok(assigned)
}

async fn complete(
    tx: &mut dyn Transaction,
    completions: &[CompleteOrder],
) -> Result<Vec<OrderRecord>, AppError> {
    let mut completed = Vec::with_capacity(completions.len());

    for completion in completions {
        let order = tx
            .order(completion.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", completion.order_id)))?;

        // An order with no recorded courier cannot be claimed either.
        if order.recorded_courier() != Some(completion.courier_id) {
            return Err(AppError::OwnershipMismatch {
                order_id: completion.order_id,
                courier_id: completion.courier_id,
            });
        }

        let row = tx
            .complete_order(
                completion.order_id,
                completion.courier_id,
                completion.complete_time,
            )
            .await?;
        let delivery_hours = tx.delivery_hours(row.order_id).await?;
        completed.push(order_record(row, delivery_hours));
    }

    Ok(completed)
}
