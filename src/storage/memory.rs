use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::models::courier::CourierType;
use crate::models::order::NewOrder;
use crate::storage::{CourierRow, OrderRow, Storage, StorageError, Transaction};

/// Process-local store with the same constraints as the relational schema.
///
/// Transactions stage rows privately and publish them on commit, children
/// before parents, so a reader that finds a parent row also finds its children.
/// Committed order rows a transaction reads are pinned at first read; commit
/// fails if any pinned row it rewrites has changed since.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Tables>,
}

struct Tables {
    courier_types: DashMap<CourierType, i32>,
    couriers: DashMap<i64, CourierRow>,
    regions: DashMap<i64, Vec<i32>>,
    working_hours: DashMap<i64, Vec<String>>,
    orders: DashMap<i64, OrderRow>,
    delivery_hours: DashMap<i64, Vec<String>>,
    courier_seq: AtomicI64,
    order_seq: AtomicI64,
    commit_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_courier_types(&CourierType::ALL)
    }

    pub fn with_courier_types(courier_types: &[CourierType]) -> Self {
        let registered = DashMap::new();
        for (idx, courier_type) in courier_types.iter().enumerate() {
            registered.insert(*courier_type, idx as i32 + 1);
        }

        Self {
            tables: Arc::new(Tables {
                courier_types: registered,
                couriers: DashMap::new(),
                regions: DashMap::new(),
                working_hours: DashMap::new(),
                orders: DashMap::new(),
                delivery_hours: DashMap::new(),
                courier_seq: AtomicI64::new(0),
                order_seq: AtomicI64::new(0),
                commit_lock: Mutex::new(()),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn page(mut ids: Vec<i64>, limit: i64, offset: i64) -> Vec<i64> {
    ids.sort_unstable();
    ids.into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Storage for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StorageError> {
        Ok(Box::new(MemoryTransaction {
            tables: self.tables.clone(),
            couriers: BTreeMap::new(),
            regions: BTreeMap::new(),
            working_hours: BTreeMap::new(),
            orders: BTreeMap::new(),
            delivery_hours: BTreeMap::new(),
            observed_orders: BTreeMap::new(),
        }))
    }

    async fn courier_type_id(
        &self,
        courier_type: CourierType,
    ) -> Result<Option<i32>, StorageError> {
        Ok(self
            .tables
            .courier_types
            .get(&courier_type)
            .map(|entry| *entry.value()))
    }

    async fn courier(&self, courier_id: i64) -> Result<Option<CourierRow>, StorageError> {
        Ok(self
            .tables
            .couriers
            .get(&courier_id)
            .map(|entry| entry.value().clone()))
    }

    async fn courier_regions(&self, courier_id: i64) -> Result<Vec<i32>, StorageError> {
        Ok(self
            .tables
            .regions
            .get(&courier_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn courier_working_hours(&self, courier_id: i64) -> Result<Vec<String>, StorageError> {
        Ok(self
            .tables
            .working_hours
            .get(&courier_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn courier_ids(&self, limit: i64, offset: i64) -> Result<Vec<i64>, StorageError> {
        let ids = self.tables.couriers.iter().map(|entry| *entry.key()).collect();
        Ok(page(ids, limit, offset))
    }

    async fn order(&self, order_id: i64) -> Result<Option<OrderRow>, StorageError> {
        Ok(self
            .tables
            .orders
            .get(&order_id)
            .map(|entry| entry.value().clone()))
    }

    async fn order_delivery_hours(&self, order_id: i64) -> Result<Vec<String>, StorageError> {
        Ok(self
            .tables
            .delivery_hours
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn order_ids(&self, limit: i64, offset: i64) -> Result<Vec<i64>, StorageError> {
        let ids = self.tables.orders.iter().map(|entry| *entry.key()).collect();
        Ok(page(ids, limit, offset))
    }

    async fn completed_costs(
        &self,
        courier_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<i64>, StorageError> {
        let mut completed: Vec<(i64, i64)> = self
            .tables
            .orders
            .iter()
            .filter_map(|entry| {
                let order = entry.value();
                let in_window = order
                    .completed_time
                    .is_some_and(|time| time >= from && time <= to);

                if order.courier_id == Some(courier_id) && in_window {
                    Some((order.order_id, order.cost))
                } else {
                    None
                }
            })
            .collect();

        completed.sort_unstable_by_key(|(order_id, _)| *order_id);
        Ok(completed.into_iter().map(|(_, cost)| cost).collect())
    }
}

pub struct MemoryTransaction {
    tables: Arc<Tables>,
    couriers: BTreeMap<i64, CourierRow>,
    regions: BTreeMap<i64, Vec<i32>>,
    working_hours: BTreeMap<i64, Vec<String>>,
    orders: BTreeMap<i64, OrderRow>,
    delivery_hours: BTreeMap<i64, Vec<String>>,
    observed_orders: BTreeMap<i64, OrderRow>,
}

impl MemoryTransaction {
    fn courier_visible(&self, courier_id: i64) -> bool {
        self.couriers.contains_key(&courier_id) || self.tables.couriers.contains_key(&courier_id)
    }

    fn order_visible(&mut self, order_id: i64) -> Option<OrderRow> {
        if let Some(row) = self.orders.get(&order_id) {
            return Some(row.clone());
        }
        if let Some(row) = self.observed_orders.get(&order_id) {
            return Some(row.clone());
        }

        let committed = self
            .tables
            .orders
            .get(&order_id)
            .map(|entry| entry.value().clone())?;
        self.observed_orders.insert(order_id, committed.clone());
        Some(committed)
    }

    fn require_order(&mut self, order_id: i64) -> Result<OrderRow, StorageError> {
        self.order_visible(order_id).ok_or_else(|| {
            StorageError::Constraint(format!("order {order_id} does not exist"))
        })
    }

    fn require_courier(&self, courier_id: i64) -> Result<(), StorageError> {
        if self.courier_visible(courier_id) {
            Ok(())
        } else {
            Err(StorageError::Constraint(format!(
                "courier {courier_id} does not exist"
            )))
        }
    }
}

fn require_interval(interval: &str) -> Result<(), StorageError> {
    if interval.trim().is_empty() {
        return Err(StorageError::Constraint(
            "interval must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn insert_courier(&mut self, courier_type_id: i32) -> Result<CourierRow, StorageError> {
        let courier_type = self
            .tables
            .courier_types
            .iter()
            .find(|entry| *entry.value() == courier_type_id)
            .map(|entry| *entry.key())
            .ok_or_else(|| {
                StorageError::Constraint(format!(
                    "courier type id {courier_type_id} does not exist"
                ))
            })?;

        let courier_id = self.tables.courier_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let row = CourierRow {
            courier_id,
            courier_type,
        };
        self.couriers.insert(courier_id, row.clone());
        Ok(row)
    }

    async fn insert_courier_region(
        &mut self,
        courier_id: i64,
        region: i32,
    ) -> Result<i32, StorageError> {
        if region <= 0 {
            return Err(StorageError::Constraint(format!(
                "region must be positive, got {region}"
            )));
        }
        self.require_courier(courier_id)?;

        let committed = self
            .tables
            .regions
            .get(&courier_id)
            .is_some_and(|entry| entry.value().contains(&region));
        let staged = self.regions.entry(courier_id).or_default();
        if committed || staged.contains(&region) {
            return Err(StorageError::Constraint(format!(
                "region {region} already recorded for courier {courier_id}"
            )));
        }

        staged.push(region);
        Ok(region)
    }

    async fn insert_working_hours(
        &mut self,
        courier_id: i64,
        interval: &str,
    ) -> Result<String, StorageError> {
        require_interval(interval)?;
        self.require_courier(courier_id)?;

        self.working_hours
            .entry(courier_id)
            .or_default()
            .push(interval.to_string());
        Ok(interval.to_string())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderRow, StorageError> {
        if !(order.weight.is_finite() && order.weight > 0.0) {
            return Err(StorageError::Constraint(format!(
                "weight must be positive, got {}",
                order.weight
            )));
        }
        if order.region <= 0 {
            return Err(StorageError::Constraint(format!(
                "region must be positive, got {}",
                order.region
            )));
        }
        if order.cost < 0 {
            return Err(StorageError::Constraint(format!(
                "cost must not be negative, got {}",
                order.cost
            )));
        }

        let order_id = self.tables.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let row = OrderRow {
            order_id,
            weight: order.weight,
            region: order.region,
            cost: order.cost,
            assigned_courier_id: None,
            courier_id: None,
            completed_time: None,
        };
        self.orders.insert(order_id, row.clone());
        Ok(row)
    }

    async fn insert_delivery_hours(
        &mut self,
        order_id: i64,
        interval: &str,
    ) -> Result<String, StorageError> {
        require_interval(interval)?;
        self.require_order(order_id)?;

        self.delivery_hours
            .entry(order_id)
            .or_default()
            .push(interval.to_string());
        Ok(interval.to_string())
    }

    async fn courier_exists(&mut self, courier_id: i64) -> Result<bool, StorageError> {
        Ok(self.courier_visible(courier_id))
    }

    async fn order(&mut self, order_id: i64) -> Result<Option<OrderRow>, StorageError> {
        Ok(self.order_visible(order_id))
    }

    async fn delivery_hours(&mut self, order_id: i64) -> Result<Vec<String>, StorageError> {
        let mut hours = self
            .tables
            .delivery_hours
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        if let Some(staged) = self.delivery_hours.get(&order_id) {
            hours.extend(staged.iter().cloned());
        }
        Ok(hours)
    }

    async fn assign_order(
        &mut self,
        order_id: i64,
        courier_id: i64,
    ) -> Result<OrderRow, StorageError> {
        self.require_courier(courier_id)?;
        let mut row = self.require_order(order_id)?;

        row.assigned_courier_id = Some(courier_id);
        self.orders.insert(order_id, row.clone());
        Ok(row)
    }

    async fn complete_order(
        &mut self,
        order_id: i64,
        courier_id: i64,
        completed_time: DateTime<Utc>,
    ) -> Result<OrderRow, StorageError> {
        self.require_courier(courier_id)?;
        let mut row = self.require_order(order_id)?;

        row.courier_id = Some(courier_id);
        row.completed_time = Some(completed_time);
        self.orders.insert(order_id, row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let tx = *self;
        let tables = tx.tables;
        let _guard = tables
            .commit_lock
            .lock()
            .map_err(|err| StorageError::Backend(format!("commit lock poisoned: {err}")))?;

        for (order_id, seen) in &tx.observed_orders {
            if !tx.orders.contains_key(order_id) {
                continue;
            }
            let current = tables
                .orders
                .get(order_id)
                .map(|entry| entry.value().clone());
            if current.as_ref() != Some(seen) {
                return Err(StorageError::Constraint(format!(
                    "order {order_id} was changed by a concurrent transaction"
                )));
            }
        }

        for (courier_id, regions) in tx.regions {
            tables.regions.entry(courier_id).or_default().extend(regions);
        }
        for (courier_id, hours) in tx.working_hours {
            tables.working_hours.entry(courier_id).or_default().extend(hours);
        }
        for (order_id, hours) in tx.delivery_hours {
            tables.delivery_hours.entry(order_id).or_default().extend(hours);
        }
        for (courier_id, row) in tx.couriers {
            tables.couriers.insert(courier_id, row);
        }
        for (order_id, row) in tx.orders {
            tables.orders.insert(order_id, row);
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        debug!(
            couriers = self.couriers.len(),
            orders = self.orders.len(),
            "discarding staged rows"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::MemoryStore;
    use crate::models::courier::CourierType;
    use crate::models::order::NewOrder;
    use crate::storage::{Storage, StorageError};

    fn new_order(cost: i64) -> NewOrder {
        NewOrder {
            weight: 1.5,
            region: 1,
            delivery_hours: vec!["10:00-11:00".to_string()],
            cost,
        }
    }

    #[tokio::test]
    async fn staged_rows_are_invisible_until_commit() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let courier = tx.insert_courier(1).await.unwrap();
        tx.insert_courier_region(courier.courier_id, 7).await.unwrap();

        assert!(store.courier(courier.courier_id).await.unwrap().is_none());

        tx.commit().await.unwrap();

        assert_eq!(
            store.courier(courier.courier_id).await.unwrap().unwrap().courier_type,
            CourierType::Foot
        );
        assert_eq!(store.courier_regions(courier.courier_id).await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn rollback_discards_everything_and_does_not_reuse_ids() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let discarded = tx.insert_order(&new_order(10)).await.unwrap();
        tx.insert_delivery_hours(discarded.order_id, "10:00-11:00")
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(store.order_ids(10, 0).await.unwrap().is_empty());
        assert!(
            store
                .order_delivery_hours(discarded.order_id)
                .await
                .unwrap()
                .is_empty()
        );

        let mut tx = store.begin().await.unwrap();
        let kept = tx.insert_order(&new_order(10)).await.unwrap();
        tx.commit().await.unwrap();

        assert!(kept.order_id > discarded.order_id);
    }

    #[tokio::test]
    async fn duplicate_region_for_one_courier_is_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let courier = tx.insert_courier(2).await.unwrap();

        tx.insert_courier_region(courier.courier_id, 3).await.unwrap();
        let err = tx
            .insert_courier_region(courier.courier_id, 3)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Constraint(_)));
    }

    #[tokio::test]
    async fn child_rows_require_an_existing_parent() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let region = tx.insert_courier_region(99, 1).await.unwrap_err();
        let hours = tx.insert_delivery_hours(99, "10:00-11:00").await.unwrap_err();

        assert!(matches!(region, StorageError::Constraint(_)));
        assert!(matches!(hours, StorageError::Constraint(_)));
    }

    #[tokio::test]
    async fn concurrent_assignment_of_the_same_order_conflicts() {
        let store = MemoryStore::new();

        let mut setup = store.begin().await.unwrap();
        let first = setup.insert_courier(1).await.unwrap().courier_id;
        let second = setup.insert_courier(2).await.unwrap().courier_id;
        let order_id = setup.insert_order(&new_order(10)).await.unwrap().order_id;
        setup.commit().await.unwrap();

        let mut tx1 = store.begin().await.unwrap();
        let mut tx2 = store.begin().await.unwrap();
        let seen_by_first = tx1.order(order_id).await.unwrap().unwrap();
        let seen_by_second = tx2.order(order_id).await.unwrap().unwrap();
        assert!(seen_by_first.assigned_courier_id.is_none());
        assert!(seen_by_second.assigned_courier_id.is_none());
        tx1.assign_order(order_id, first).await.unwrap();
        tx2.assign_order(order_id, second).await.unwrap();

        tx1.commit().await.unwrap();
        let err = tx2.commit().await.unwrap_err();

        assert!(matches!(err, StorageError::Constraint(_)));
        let stored = store.order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.assigned_courier_id, Some(first));
    }

    #[tokio::test]
    async fn read_only_observation_does_not_block_commit() {
        let store = MemoryStore::new();

        let mut setup = store.begin().await.unwrap();
        let courier_id = setup.insert_courier(1).await.unwrap().courier_id;
        let order_id = setup.insert_order(&new_order(10)).await.unwrap().order_id;
        setup.commit().await.unwrap();

        let mut reader = store.begin().await.unwrap();
        reader.order(order_id).await.unwrap();
        reader.insert_delivery_hours(order_id, "12:00-13:00").await.unwrap();

        let mut writer = store.begin().await.unwrap();
        writer.assign_order(order_id, courier_id).await.unwrap();
        writer.commit().await.unwrap();

        reader.commit().await.unwrap();
        assert_eq!(
            store.order_delivery_hours(order_id).await.unwrap(),
            vec!["12:00-13:00".to_string()]
        );
    }

    #[tokio::test]
    async fn unregistered_courier_type_has_no_id() {
        let store = MemoryStore::with_courier_types(&[CourierType::Foot]);

        assert_eq!(store.courier_type_id(CourierType::Foot).await.unwrap(), Some(1));
        assert_eq!(store.courier_type_id(CourierType::Auto).await.unwrap(), None);
    }

    #[tokio::test]
    async fn completed_costs_include_both_window_bounds() {
        let store = MemoryStore::new();
        let from = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2023, 5, 2, 0, 0, 0).unwrap();

        let mut tx = store.begin().await.unwrap();
        let courier = tx.insert_courier(3).await.unwrap();
        let times = [
            from,
            to,
            to + chrono::Duration::seconds(1),
            from - chrono::Duration::seconds(1),
        ];
        for (idx, time) in times.iter().enumerate() {
            let order = tx.insert_order(&new_order(idx as i64 + 1)).await.unwrap();
            tx.complete_order(order.order_id, courier.courier_id, *time)
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        let costs = store
            .completed_costs(courier.courier_id, from, to)
            .await
            .unwrap();
        assert_eq!(costs, vec![1, 2]);
    }
}
