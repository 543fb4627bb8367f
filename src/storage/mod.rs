//! Read and transaction seams shared by the memory and Postgres backends.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::courier::CourierType;
use crate::models::order::NewOrder;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The store rejected a row (check, unique or foreign key constraint).
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("storage failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourierRow {
    pub courier_id: i64,
    pub courier_type: CourierType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub order_id: i64,
    pub weight: f64,
    pub region: i32,
    pub cost: i64,
    pub assigned_courier_id: Option<i64>,
    pub courier_id: Option<i64>,
    pub completed_time: Option<DateTime<Utc>>,
}

impl OrderRow {
    /// Courier the order is currently recorded against: the completing courier
    /// once completed, otherwise the assignee.
    pub fn recorded_courier(&self) -> Option<i64> {
        self.courier_id.or(self.assigned_courier_id)
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn begin(&self) -> Result<Box<dyn Transaction>, StorageError>;

    async fn courier_type_id(
        &self,
        courier_type: CourierType,
    ) -> Result<Option<i32>, StorageError>;

    async fn courier(&self, courier_id: i64) -> Result<Option<CourierRow>, StorageError>;

    async fn courier_regions(&self, courier_id: i64) -> Result<Vec<i32>, StorageError>;

    async fn courier_working_hours(&self, courier_id: i64) -> Result<Vec<String>, StorageError>;

    /// Page of courier ids in creation order.
    async fn courier_ids(&self, limit: i64, offset: i64) -> Result<Vec<i64>, StorageError>;

    async fn order(&self, order_id: i64) -> Result<Option<OrderRow>, StorageError>;

    async fn order_delivery_hours(&self, order_id: i64) -> Result<Vec<String>, StorageError>;

    /// Page of order ids in creation order.
    async fn order_ids(&self, limit: i64, offset: i64) -> Result<Vec<i64>, StorageError>;

    /// Costs of orders completed by `courier_id` with `from <= completed_time <= to`.
    async fn completed_costs(
        &self,
        courier_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<i64>, StorageError>;
}

#[async_trait]
pub trait Transaction: Send {
    async fn insert_courier(&mut self, courier_type_id: i32) -> Result<CourierRow, StorageError>;

    async fn insert_courier_region(
        &mut self,
        courier_id: i64,
        region: i32,
    ) -> Result<i32, StorageError>;

    async fn insert_working_hours(
        &mut self,
        courier_id: i64,
        interval: &str,
    ) -> Result<String, StorageError>;

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderRow, StorageError>;

    async fn insert_delivery_hours(
        &mut self,
        order_id: i64,
        interval: &str,
    ) -> Result<String, StorageError>;

    async fn courier_exists(&mut self, courier_id: i64) -> Result<bool, StorageError>;

    async fn order(&mut self, order_id: i64) -> Result<Option<OrderRow>, StorageError>;

    async fn delivery_hours(&mut self, order_id: i64) -> Result<Vec<String>, StorageError>;

    async fn assign_order(
        &mut self,
        order_id: i64,
        courier_id: i64,
    ) -> Result<OrderRow, StorageError>;

    async fn complete_order(
        &mut self,
        order_id: i64,
        courier_id: i64,
        completed_time: DateTime<Utc>,
    ) -> Result<OrderRow, StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
