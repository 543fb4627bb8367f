use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::AppError;
use crate::models::courier::CourierType;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourierFactors {
    pub cost_factor: i64,
    pub rate_factor: i64,
}

/// Per-type cost and rate factors. Adding a courier type is a new entry here.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorTable {
    factors: HashMap<CourierType, CourierFactors>,
}

impl FactorTable {
    pub fn new(factors: HashMap<CourierType, CourierFactors>) -> Self {
        Self { factors }
    }

    pub fn factors(&self, courier_type: CourierType) -> Result<CourierFactors, AppError> {
        self.factors
            .get(&courier_type)
            .copied()
            .ok_or(AppError::UnknownCourierType(courier_type))
    }

    pub fn earnings(&self, costs: &[i64], courier_type: CourierType) -> Result<i64, AppError> {
        let factors = self.factors(courier_type)?;
        earnings(costs, factors.cost_factor)
    }

    pub fn rating(
        &self,
        completed_orders: usize,
        window: &DateWindow,
        courier_type: CourierType,
    ) -> Result<i64, AppError> {
        let factors = self.factors(courier_type)?;
        rating(completed_orders, window.hours(), factors.rate_factor)
    }
}

impl Default for FactorTable {
    fn default() -> Self {
        let factors = HashMap::from([
            (
                CourierType::Foot,
                CourierFactors {
                    cost_factor: 2,
                    rate_factor: 3,
                },
            ),
            (
                CourierType::Bike,
                CourierFactors {
                    cost_factor: 3,
                    rate_factor: 2,
                },
            ),
            (
                CourierType::Auto,
                CourierFactors {
                    cost_factor: 4,
                    rate_factor: 1,
                },
            ),
        ]);
        Self { factors }
    }
}

/// Calendar-day window `[start, end]`, both bounds at midnight UTC. A reversed
/// window is kept as given: it matches no completions and has negative hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self, AppError> {
        let start = parse_date("start_date", start)?;
        let end = parse_date("end_date", end)?;
        Ok(Self { start, end })
    }

    pub fn hours(&self) -> i64 {
        (self.end - self.start).num_hours()
    }

    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (midnight_utc(self.start), midnight_utc(self.end))
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|err| AppError::DateRange(format!("{field} {raw:?}: {err}")))
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

pub fn earnings(costs: &[i64], cost_factor: i64) -> Result<i64, AppError> {
    costs
        .iter()
        .try_fold(0i64, |total, cost| total.checked_add(*cost))
        .and_then(|total| total.checked_mul(cost_factor))
        .ok_or_else(|| {
            AppError::Overflow(format!(
                "earnings of {} orders with cost factor {cost_factor} exceed i64",
                costs.len()
            ))
        })
}

/// `round(completed_orders / hours * rate_factor)`, rounding half away from zero.
///
/// Callers short-circuit to zero when nothing was completed; a non-empty
/// history over an empty window is a date range error.
pub fn rating(completed_orders: usize, hours: i64, rate_factor: i64) -> Result<i64, AppError> {
    if hours <= 0 {
        return Err(AppError::DateRange(format!(
            "window of {hours} hours cannot rate {completed_orders} orders"
        )));
    }

    let per_hour = completed_orders as f64 / hours as f64;
    Ok((per_hour * rate_factor as f64).round() as i64)
}
