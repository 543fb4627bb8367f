use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum CourierType {
    Foot,
    Bike,
    Auto,
}

impl CourierType {
    pub const ALL: [CourierType; 3] = [CourierType::Foot, CourierType::Bike, CourierType::Auto];

    pub fn as_str(&self) -> &'static str {
        match self {
            CourierType::Foot => "FOOT",
            CourierType::Bike => "BIKE",
            CourierType::Auto => "AUTO",
        }
    }
}

impl fmt::Display for CourierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourierType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FOOT" => Ok(CourierType::Foot),
            "BIKE" => Ok(CourierType::Bike),
            "AUTO" => Ok(CourierType::Auto),
            other => Err(format!("unknown courier type: {other}")),
        }
    }
}

/// Courier as submitted for creation, before storage assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCourier {
    pub courier_type: CourierType,
    pub regions: Vec<i32>,
    pub working_hours: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourierRecord {
    pub courier_id: i64,
    pub courier_type: CourierType,
    pub regions: Vec<i32>,
    pub working_hours: Vec<String>,
}

/// Courier attributes plus rating and earnings over a date window.
/// Computed on read, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourierMetaInfo {
    pub courier_id: i64,
    pub courier_type: CourierType,
    pub regions: Vec<i32>,
    pub working_hours: Vec<String>,
    pub rating: i64,
    pub earnings: i64,
}

impl CourierMetaInfo {
    pub fn from_record(record: CourierRecord, rating: i64, earnings: i64) -> Self {
        Self {
            courier_id: record.courier_id,
            courier_type: record.courier_type,
            regions: record.regions,
            working_hours: record.working_hours,
            rating,
            earnings,
        }
    }
}
