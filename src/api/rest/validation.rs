use chrono::NaiveTime;
use serde::Deserialize;

use crate::error::AppError;

const INTERVAL_LEN: usize = "HH:MM-HH:MM".len();

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Resolves to `(limit, offset)`, defaulting to one item from the start.
    pub fn resolve(&self) -> Result<(i64, i64), AppError> {
        let limit = self.limit.unwrap_or(1);
        let offset = self.offset.unwrap_or(0);

        if limit <= 0 {
            return Err(AppError::BadRequest("limit must be > 0".to_string()));
        }
        if offset < 0 {
            return Err(AppError::BadRequest("offset must be >= 0".to_string()));
        }

        Ok((limit, offset))
    }
}

pub fn positive_id(kind: &str, id: i64) -> Result<i64, AppError> {
    if id <= 0 {
        return Err(AppError::BadRequest(format!("{kind} must be > 0")));
    }
    Ok(id)
}

pub fn non_empty<T>(field: &str, items: &[T]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Accepts `HH:MM-HH:MM` with both ends valid 24-hour clock times.
pub fn time_intervals(field: &str, intervals: &[String]) -> Result<(), AppError> {
    non_empty(field, intervals)?;

    for interval in intervals {
        if !is_time_interval(interval) {
            return Err(AppError::BadRequest(format!(
                "{field} entry {interval:?} is not HH:MM-HH:MM"
            )));
        }
    }
    Ok(())
}

fn is_time_interval(raw: &str) -> bool {
    if raw.len() != INTERVAL_LEN {
        return false;
    }

    match raw.split_once('-') {
        Some((from, to)) => {
            NaiveTime::parse_from_str(from, "%H:%M").is_ok()
                && NaiveTime::parse_from_str(to, "%H:%M").is_ok()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_time_interval, Pagination};

    #[test]
    fn accepts_well_formed_intervals() {
        assert!(is_time_interval("10:00-12:00"));
        assert!(is_time_interval("00:00-23:59"));
    }

    #[test]
    fn rejects_malformed_intervals() {
        assert!(!is_time_interval("10:00-12:90"));
        assert!(!is_time_interval("24:00-12:00"));
        assert!(!is_time_interval("9:00-12:00"));
        assert!(!is_time_interval("10:00_12:00"));
        assert!(!is_time_interval(""));
    }

    #[test]
    fn pagination_defaults_to_first_item() {
        let page = Pagination {
            limit: None,
            offset: None,
        };
        assert_eq!(page.resolve().unwrap(), (1, 0));
    }

    #[test]
    fn pagination_rejects_non_positive_limit() {
        let page = Pagination {
            limit: Some(0),
            offset: Some(3),
        };
        assert!(page.resolve().is_err());
    }
}
