use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOrder {
    pub weight: f64,
    pub region: i32,
    pub delivery_hours: Vec<String>,
    pub cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRecord {
    pub order_id: i64,
    pub weight: f64,
    pub region: i32,
    pub delivery_hours: Vec<String>,
    pub cost: i64,
    pub assigned_courier_id: Option<i64>,
    pub courier_id: Option<i64>,
    pub completed_time: Option<DateTime<Utc>>,
}

impl OrderRecord {
    pub fn is_completed(&self) -> bool {
        self.completed_time.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OrderAssignment {
    pub courier_id: i64,
    pub order_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CompleteOrder {
    pub courier_id: i64,
    pub order_id: i64,
    pub complete_time: DateTime<Utc>,
}
