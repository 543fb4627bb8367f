use std::sync::Arc;

use crate::engine::reader::AggregateReader;
use crate::engine::scoring::FactorTable;
use crate::engine::writer::AggregateWriter;
use crate::observability::metrics::Metrics;
use crate::service::couriers::CourierService;
use crate::service::orders::OrderService;
use crate::storage::Storage;

pub struct AppState {
    pub couriers: CourierService,
    pub orders: OrderService,
    pub storage_backend: &'static str,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(store: Arc<dyn Storage>, factors: FactorTable) -> Self {
        let metrics = Metrics::new();
        let reader = AggregateReader::new(store.clone());
        let writer = AggregateWriter::new(store.clone(), metrics.clone());

        Self {
            couriers: CourierService::new(
                reader.clone(),
                writer.clone(),
                factors,
                metrics.clone(),
            ),
            orders: OrderService::new(reader, writer, metrics.clone()),
            storage_backend: store.backend(),
            metrics,
        }
    }
}
