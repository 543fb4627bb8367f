use std::time::Instant;

use crate::engine::reader::AggregateReader;
use crate::engine::writer::AggregateWriter;
use crate::error::AppError;
use crate::models::order::{CompleteOrder, NewOrder, OrderAssignment, OrderRecord};
use crate::observability::metrics::Metrics;

#[derive(Clone)]
pub struct OrderService {
    reader: AggregateReader,
    writer: AggregateWriter,
    metrics: Metrics,
}

impl OrderService {
    pub fn new(reader: AggregateReader, writer: AggregateWriter, metrics: Metrics) -> Self {
        Self {
            reader,
            writer,
            metrics,
        }
    }

    pub async fn add_orders(&self, orders: &[NewOrder]) -> Result<Vec<OrderRecord>, AppError> {
        let started = Instant::now();
        let result = self.writer.add_orders(orders).await;
        self.metrics.observe("add_orders", started, &result);
        result
    }

    pub async fn order(&self, order_id: i64) -> Result<OrderRecord, AppError> {
        let started = Instant::now();
        let result = self.reader.order(order_id).await;
        self.metrics.observe("get_order", started, &result);
        result
    }

    /// An empty page is an empty list, not an error.
    pub async fn orders(&self, limit: i64, offset: i64) -> Result<Vec<OrderRecord>, AppError> {
        let started = Instant::now();
        let result = match self.reader.orders(limit, offset).await {
            Err(AppError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        };
        self.metrics.observe("get_orders", started, &result);
        result
    }

    pub async fn assign_orders(
        &self,
        assignments: &[OrderAssignment],
    ) -> Result<Vec<OrderRecord>, AppError> {
        let started = Instant::now();
        let result = self.writer.assign_orders(assignments).await;
        self.metrics.observe("assign_orders", started, &result);
        result
    }

    pub async fn complete_orders(
        &self,
        completions: &[CompleteOrder],
    ) -> Result<Vec<OrderRecord>, AppError> {
        let started = Instant::now();
        let result = self.writer.set_completed(completions).await;
        self.metrics.observe("set_complete_orders", started, &result);
        result
    }
}
