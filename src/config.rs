use std::collections::HashMap;
use std::env;

use crate::engine::scoring::{CourierFactors, FactorTable};
use crate::error::AppError;
use crate::models::courier::CourierType;

#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Memory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub storage: StorageBackend,
    pub factors: FactorTable,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 8080)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            storage: storage_backend()?,
            factors: factor_table()?,
        })
    }
}

fn storage_backend() -> Result<StorageBackend, AppError> {
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".to_string());

    match backend.as_str() {
        "memory" => Ok(StorageBackend::Memory),
        "postgres" => Ok(StorageBackend::Postgres {
            database_url: env::var("DATABASE_URL").map_err(|_| {
                AppError::Internal("DATABASE_URL is required for postgres storage".to_string())
            })?,
            max_connections: parse_or_default("DATABASE_MAX_CONNECTIONS", 5)?,
        }),
        other => Err(AppError::Internal(format!(
            "invalid STORAGE_BACKEND: {other}, expected memory/postgres"
        ))),
    }
}

fn factor_table() -> Result<FactorTable, AppError> {
    let defaults = FactorTable::default();
    let mut factors = HashMap::new();

    for courier_type in CourierType::ALL {
        let default = defaults.factors(courier_type)?;
        let prefix = courier_type.as_str();

        factors.insert(
            courier_type,
            CourierFactors {
                cost_factor: parse_or_default(
                    &format!("{prefix}_COURIER_COST_FACTOR"),
                    default.cost_factor,
                )?,
                rate_factor: parse_or_default(
                    &format!("{prefix}_COURIER_RATE_FACTOR"),
                    default.rate_factor,
                )?,
            },
        );
    }

    Ok(FactorTable::new(factors))
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
