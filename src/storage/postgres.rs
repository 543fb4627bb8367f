//! PostgreSQL backend; sqlx errors are mapped to `StorageError` by SQLSTATE.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::models::courier::CourierType;
use crate::models::order::NewOrder;
use crate::storage::{CourierRow, OrderRow, Storage, StorageError, Transaction};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

type OrderTuple = (
    i64,
    f64,
    i32,
    i64,
    Option<i64>,
    Option<i64>,
    Option<DateTime<Utc>>,
);

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|err| map_sqlx_error("connect", err))?;

        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|err| map_sqlx_error("migrate", err))?;

        info!("schema is up to date");
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") | Some("23514") | Some("23502") => {
                    StorageError::Constraint(msg)
                }
                _ => StorageError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StorageError::Backend(format!("{operation}: connection pool closed"))
        }
        other => StorageError::Backend(format!("{operation}: {other}")),
    }
}

fn parse_courier_type(raw: &str) -> Result<CourierType, StorageError> {
    raw.parse::<CourierType>().map_err(StorageError::Backend)
}

fn order_row(
    (order_id, weight, region, cost, assigned_courier_id, courier_id, completed_time): OrderTuple,
) -> OrderRow {
    OrderRow {
        order_id,
        weight,
        region,
        cost,
        assigned_courier_id,
        courier_id,
        completed_time,
    }
}

#[async_trait]
impl Storage for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StorageError> {
        let inner = self
            .pool
            .begin()
            .await
            .map_err(|err| map_sqlx_error("begin", err))?;
        Ok(Box::new(PgTransaction { inner }))
    }

    async fn courier_type_id(
        &self,
        courier_type: CourierType,
    ) -> Result<Option<i32>, StorageError> {
        sqlx::query_scalar::<_, i32>(
            "SELECT courier_type_id FROM courier_types WHERE courier_type = $1",
        )
        .bind(courier_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("courier_type_id", err))
    }

    async fn courier(&self, courier_id: i64) -> Result<Option<CourierRow>, StorageError> {
        let row = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT c.courier_id, t.courier_type
            FROM couriers c
            JOIN courier_types t ON t.courier_type_id = c.courier_type_id
            WHERE c.courier_id = $1
            "#,
        )
        .bind(courier_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("courier", err))?;

        row.map(|(courier_id, raw_type)| {
            Ok(CourierRow {
                courier_id,
                courier_type: parse_courier_type(&raw_type)?,
            })
        })
        .transpose()
    }

    async fn courier_regions(&self, courier_id: i64) -> Result<Vec<i32>, StorageError> {
        sqlx::query_scalar::<_, i32>(
            "SELECT region FROM couriers_to_regions WHERE courier_id = $1 ORDER BY region",
        )
        .bind(courier_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("courier_regions", err))
    }

    async fn courier_working_hours(&self, courier_id: i64) -> Result<Vec<String>, StorageError> {
        sqlx::query_scalar::<_, String>(
            "SELECT working_interval FROM working_hours WHERE courier_id = $1 ORDER BY id",
        )
        .bind(courier_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("courier_working_hours", err))
    }

    async fn courier_ids(&self, limit: i64, offset: i64) -> Result<Vec<i64>, StorageError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT courier_id FROM couriers ORDER BY courier_id OFFSET $1 LIMIT $2",
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("courier_ids", err))
    }

    async fn order(&self, order_id: i64) -> Result<Option<OrderRow>, StorageError> {
        let row = sqlx::query_as::<_, OrderTuple>(
            r#"
            SELECT order_id, weight, region, cost, assigned_courier_id, courier_id, completed_time
            FROM orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("order", err))?;

        Ok(row.map(order_row))
    }

    async fn order_delivery_hours(&self, order_id: i64) -> Result<Vec<String>, StorageError> {
        sqlx::query_scalar::<_, String>(
            "SELECT delivery_interval FROM delivery_hours WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("order_delivery_hours", err))
    }

    async fn order_ids(&self, limit: i64, offset: i64) -> Result<Vec<i64>, StorageError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT order_id FROM orders ORDER BY order_id OFFSET $1 LIMIT $2",
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("order_ids", err))
    }

    async fn completed_costs(
        &self,
        courier_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<i64>, StorageError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT cost
            FROM orders
            WHERE courier_id = $1 AND completed_time BETWEEN $2 AND $3
            ORDER BY order_id
            "#,
        )
        .bind(courier_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("completed_costs", err))
    }
}

pub struct PgTransaction {
    inner: sqlx::Transaction<'static, sqlx::Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn insert_courier(&mut self, courier_type_id: i32) -> Result<CourierRow, StorageError> {
        let (courier_id, raw_type) = sqlx::query_as::<_, (i64, String)>(
            r#"
            INSERT INTO couriers (courier_type_id)
            VALUES ($1)
            RETURNING courier_id,
                (SELECT courier_type FROM courier_types WHERE courier_type_id = $1)
            "#,
        )
        .bind(courier_type_id)
        .fetch_one(&mut *self.inner)
        .await
        .map_err(|err| map_sqlx_error("insert_courier", err))?;

        Ok(CourierRow {
            courier_id,
            courier_type: parse_courier_type(&raw_type)?,
        })
    }

    async fn insert_courier_region(
        &mut self,
        courier_id: i64,
        region: i32,
    ) -> Result<i32, StorageError> {
        sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO couriers_to_regions (courier_id, region)
            VALUES ($1, $2)
            RETURNING region
            "#,
        )
        .bind(courier_id)
        .bind(region)
        .fetch_one(&mut *self.inner)
        .await
        .map_err(|err| map_sqlx_error("insert_courier_region", err))
    }

    async fn insert_working_hours(
        &mut self,
        courier_id: i64,
        interval: &str,
    ) -> Result<String, StorageError> {
        sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO working_hours (courier_id, working_interval)
            VALUES ($1, $2)
            RETURNING working_interval
            "#,
        )
        .bind(courier_id)
        .bind(interval)
        .fetch_one(&mut *self.inner)
        .await
        .map_err(|err| map_sqlx_error("insert_working_hours", err))
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderRow, StorageError> {
        let row = sqlx::query_as::<_, OrderTuple>(
            r#"
            INSERT INTO orders (weight, region, cost)
            VALUES ($1, $2, $3)
            RETURNING order_id, weight, region, cost, assigned_courier_id, courier_id, completed_time
            "#,
        )
        .bind(order.weight)
        .bind(order.region)
        .bind(order.cost)
        .fetch_one(&mut *self.inner)
        .await
        .map_err(|err| map_sqlx_error("insert_order", err))?;

        Ok(order_row(row))
    }

    async fn insert_delivery_hours(
        &mut self,
        order_id: i64,
        interval: &str,
    ) -> Result<String, StorageError> {
        sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO delivery_hours (order_id, delivery_interval)
            VALUES ($1, $2)
            RETURNING delivery_interval
            "#,
        )
        .bind(order_id)
        .bind(interval)
        .fetch_one(&mut *self.inner)
        .await
        .map_err(|err| map_sqlx_error("insert_delivery_hours", err))
    }

    async fn courier_exists(&mut self, courier_id: i64) -> Result<bool, StorageError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM couriers WHERE courier_id = $1)",
        )
        .bind(courier_id)
        .fetch_one(&mut *self.inner)
        .await
        .map_err(|err| map_sqlx_error("courier_exists", err))
    }

    async fn order(&mut self, order_id: i64) -> Result<Option<OrderRow>, StorageError> {
        let row = sqlx::query_as::<_, OrderTuple>(
            r#"
            SELECT order_id, weight, region, cost, assigned_courier_id, courier_id, completed_time
            FROM orders
            WHERE order_id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *self.inner)
        .await
        .map_err(|err| map_sqlx_error("order", err))?;

        Ok(row.map(order_row))
    }

    async fn delivery_hours(&mut self, order_id: i64) -> Result<Vec<String>, StorageError> {
        sqlx::query_scalar::<_, String>(
            "SELECT delivery_interval FROM delivery_hours WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&mut *self.inner)
        .await
        .map_err(|err| map_sqlx_error("delivery_hours", err))
    }

    async fn assign_order(
        &mut self,
        order_id: i64,
        courier_id: i64,
    ) -> Result<OrderRow, StorageError> {
        let row = sqlx::query_as::<_, OrderTuple>(
            r#"
            UPDATE orders
            SET assigned_courier_id = $1
            WHERE order_id = $2
            RETURNING order_id, weight, region, cost, assigned_courier_id, courier_id, completed_time
            "#,
        )
        .bind(courier_id)
        .bind(order_id)
        .fetch_optional(&mut *self.inner)
        .await
        .map_err(|err| map_sqlx_error("assign_order", err))?;

        row.map(order_row).ok_or_else(|| {
            StorageError::Constraint(format!("order {order_id} does not exist"))
        })
    }

    async fn complete_order(
        &mut self,
        order_id: i64,
        courier_id: i64,
        completed_time: DateTime<Utc>,
    ) -> Result<OrderRow, StorageError> {
        let row = sqlx::query_as::<_, OrderTuple>(
            r#"
            UPDATE orders
            SET courier_id = $1, completed_time = $2
            WHERE order_id = $3
            RETURNING order_id, weight, region, cost, assigned_courier_id, courier_id, completed_time
            "#,
        )
        .bind(courier_id)
        .bind(completed_time)
        .bind(order_id)
        .fetch_optional(&mut *self.inner)
        .await
        .map_err(|err| map_sqlx_error("complete_order", err))?;

        row.map(order_row).ok_or_else(|| {
            StorageError::Constraint(format!("order {order_id} does not exist"))
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.inner
            .commit()
            .await
            .map_err(|err| map_sqlx_error("commit", err))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.inner
            .rollback()
            .await
            .map_err(|err| map_sqlx_error("rollback", err))
    }
}
