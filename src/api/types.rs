//! HTTP request and response types

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Health check body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: "Sensorcast API is running".to_string(),
        }
    }
}

/// `?days=` on the forecast routes
#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    pub days: Option<String>,
}

/// Optional JSON body of the forecast routes
#[derive(Debug, Default, Deserialize)]
pub struct ForecastBody {
    pub days: Option<Value>,
}

/// Pick `days` from the query string first, then the JSON body, and parse it
/// as a number. Whole-number and range checks happen in the forecast service.
pub fn resolve_days(query: &ForecastQuery, body: &[u8]) -> Result<f64, AppError> {
    let from_query = query
        .days
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Value::String(s.to_string()));

    // An unreadable body counts as no body.
    let from_body = || {
        serde_json::from_slice::<ForecastBody>(body)
            .ok()
            .and_then(|b| b.days)
            .filter(|v| !v.is_null())
    };

    match from_query.or_else(from_body) {
        Some(raw) => parse_days(&raw),
        None => Err(AppError::Validation("missing 'days' parameter".into())),
    }
}

fn parse_days(raw: &Value) -> Result<f64, AppError> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| AppError::Validation("'days' must be a positive number".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(days: Option<&str>) -> ForecastQuery {
        ForecastQuery {
            days: days.map(String::from),
        }
    }

    fn message(result: Result<f64, AppError>) -> String {
        match result {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_query_wins_over_body() {
        let days = resolve_days(&query(Some("3")), br#"{"days": 5}"#).unwrap();
        assert_eq!(days, 3.0);
    }

    #[test]
    fn test_body_number_and_string() {
        assert_eq!(resolve_days(&query(None), br#"{"days": 2}"#).unwrap(), 2.0);
        assert_eq!(resolve_days(&query(None), br#"{"days": "4"}"#).unwrap(), 4.0);
        assert_eq!(resolve_days(&query(Some("")), br#"{"days": 1}"#).unwrap(), 1.0);
    }

    #[test]
    fn test_missing_days() {
        assert_eq!(message(resolve_days(&query(None), b"")), "missing 'days' parameter");
        assert_eq!(
            message(resolve_days(&query(None), b"not json")),
            "missing 'days' parameter"
        );
        assert_eq!(
            message(resolve_days(&query(None), br#"{"days": null}"#)),
            "missing 'days' parameter"
        );
    }

    #[test]
    fn test_non_numeric_or_non_positive() {
        for raw in ["abc", "0", "-2", "NaN", "inf"] {
            assert_eq!(
                message(resolve_days(&query(Some(raw)), b"")),
                "'days' must be a positive number",
                "{}",
                raw
            );
        }
        assert_eq!(
            message(resolve_days(&query(None), br#"{"days": true}"#)),
            "'days' must be a positive number"
        );
    }

    #[test]
    fn test_fractional_days_pass_through_to_service() {
        assert_eq!(resolve_days(&query(Some("1.5")), b"").unwrap(), 1.5);
    }
}
