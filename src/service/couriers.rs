use std::time::Instant;

use tracing::debug;

use crate::engine::reader::AggregateReader;
use crate::engine::scoring::{DateWindow, FactorTable};
use crate::engine::writer::AggregateWriter;
use crate::error::AppError;
use crate::models::courier::{CourierMetaInfo, CourierRecord, NewCourier};
use crate::observability::metrics::Metrics;

#[derive(Clone)]
pub struct CourierService {
    reader: AggregateReader,
    writer: AggregateWriter,
    factors: FactorTable,
    metrics: Metrics,
}

impl CourierService {
    pub fn new(
        reader: AggregateReader,
        writer: AggregateWriter,
        factors: FactorTable,
        metrics: Metrics,
    ) -> Self {
        Self {
            reader,
            writer,
            factors,
            metrics,
        }
    }

    pub async fn add_couriers(&self, couriers: &[NewCourier]) -> Result<Vec<CourierRecord>, AppError> {
        let started = Instant::now();
        let result = self.writer.add_couriers(couriers).await;
        self.metrics.observe("add_couriers", started, &result);
        result
    }

    pub async fn courier(&self, courier_id: i64) -> Result<CourierRecord, AppError> {
        let started = Instant::now();
        let result = self.reader.courier(courier_id).await;
        self.metrics.observe("get_courier", started, &result);
        result
    }

    /// An empty page is an empty list, not an error.
    pub async fn couriers(&self, limit: i64, offset: i64) -> Result<Vec<CourierRecord>, AppError> {
        let started = Instant::now();
        let result = match self.reader.couriers(limit, offset).await {
            Err(AppError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        };
        self.metrics.observe("get_couriers", started, &result);
        result
    }

    pub async fn meta_info(
        &self,
        courier_id: i64,
        start_date: &str,
        end_date: &str,
    ) -> Result<CourierMetaInfo, AppError> {
        let started = Instant::now();
        let result = self.compute_meta_info(courier_id, start_date, end_date).await;
        self.metrics.observe("get_courier_meta_info", started, &result);
        result
    }

    async fn compute_meta_info(
        &self,
        courier_id: i64,
        start_date: &str,
        end_date: &str,
    ) -> Result<CourierMetaInfo, AppError> {
        let window = DateWindow::parse(start_date, end_date)?;
        let courier = self.reader.courier(courier_id).await?;
        let costs = self.reader.costs(courier_id, &window).await?;

        if costs.is_empty() {
            debug!(courier_id, "no completed orders in window");
            return Ok(CourierMetaInfo::from_record(courier, 0, 0));
        }

        let rating = self
            .factors
            .rating(costs.len(), &window, courier.courier_type)?;
        let earnings = self.factors.earnings(&costs, courier.courier_type)?;

        debug!(courier_id, completed = costs.len(), rating, earnings, "computed meta info");
        Ok(CourierMetaInfo::from_record(courier, rating, earnings))
    }
}
