//! Raw reading values → normalized values (temperatures in Kelvin).

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::shed::DataType;
use crate::utils::parse_timestamp;

const KELVIN_OFFSET: f64 = 273.15;
/// The network writes -1 for "no reading" in some series.
const MISSING_SENTINEL: f64 = -1.0;

/// Declared temperature scale of a series.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TemperatureScale {
    Celsius,
    Fahrenheit,
    Kelvin,
    /// Fallback for any undeclared scale. The formula is kept as deployed and
    /// is almost certainly not a real unit.
    Felsius,
}

impl TemperatureScale {
    pub fn from_declared(scale: &str) -> Self {
        match scale {
            "C" => TemperatureScale::Celsius,
            "F" => TemperatureScale::Fahrenheit,
            "K" => TemperatureScale::Kelvin,
            _ => TemperatureScale::Felsius,
        }
    }

    pub fn to_kelvin(self, v: f64) -> f64 {
        match self {
            TemperatureScale::Celsius => v + KELVIN_OFFSET,
            TemperatureScale::Fahrenheit => (v + 459.67) * 5.0 / 9.0,
            TemperatureScale::Kelvin => v,
            TemperatureScale::Felsius => ((v + 16.0) * 5.0 / 7.0) + KELVIN_OFFSET,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rejected {
    Missing,
    BelowAbsoluteZero,
    NegativeLight,
}

pub fn normalize_value(data_type: DataType, scale: &str, raw: Option<f64>) -> Result<f64, Rejected> {
    let v = match raw {
        Some(v) if v != MISSING_SENTINEL => v,
        _ => return Err(Rejected::Missing),
    };
    match data_type {
        DataType::Temperature => {
            let kelvin = TemperatureScale::from_declared(scale).to_kelvin(v);
            if kelvin < 0.0 {
                Err(Rejected::BelowAbsoluteZero)
            } else {
                Ok(kelvin)
            }
        }
        DataType::Light if v < 0.0 => Err(Rejected::NegativeLight),
        _ => Ok(v),
    }
}

/// Split one `[timestamp, value]` record. A `null` value is a missing reading,
/// not a malformed record.
pub fn parse_point(point: &Value) -> Result<(DateTime<Utc>, Option<f64>), String> {
    let pair = point
        .as_array()
        .filter(|p| p.len() >= 2)
        .ok_or_else(|| format!("expected [timestamp, value], got {}", point))?;
    let ts_raw = pair[0]
        .as_str()
        .ok_or_else(|| format!("timestamp is not a string: {}", pair[0]))?;
    let timestamp = parse_timestamp(ts_raw)?;
    let value = match &pair[1] {
        Value::Null => None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(
            s.trim()
                .parse::<f64>()
                .map_err(|_| format!("value is not numeric: {:?}", s))?,
        ),
        other => return Err(format!("value is not numeric: {}", other)),
    };
    Ok((timestamp, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn temperatures_convert_to_kelvin() {
        let t = DataType::Temperature;
        assert!(close(normalize_value(t, "C", Some(20.0)).unwrap(), 293.15));
        assert!(close(normalize_value(t, "F", Some(32.0)).unwrap(), 273.15));
        assert!(close(normalize_value(t, "K", Some(300.0)).unwrap(), 300.0));
        assert!(close(normalize_value(t, "Q", Some(5.0)).unwrap(), 15.0 + 273.15));
        assert_eq!(normalize_value(t, "K", Some(-3.0)), Err(Rejected::BelowAbsoluteZero));
        assert_eq!(normalize_value(t, "C", Some(-300.0)), Err(Rejected::BelowAbsoluteZero));
    }

    #[test]
    fn missing_and_negative_light_are_dropped() {
        assert_eq!(normalize_value(DataType::Gas, "ppm", None), Err(Rejected::Missing));
        assert_eq!(normalize_value(DataType::Gas, "ppm", Some(-1.0)), Err(Rejected::Missing));
        assert_eq!(normalize_value(DataType::Temperature, "C", Some(-1.0)), Err(Rejected::Missing));
        assert_eq!(normalize_value(DataType::Light, "lux", Some(-0.5)), Err(Rejected::NegativeLight));
        assert_eq!(normalize_value(DataType::Light, "lux", Some(0.0)), Ok(0.0));
        assert_eq!(normalize_value(DataType::Solar, "W", Some(-4.0)), Ok(-4.0));
    }

    #[test]
    fn points_parse_with_null_values() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(parse_point(&json!(["2024-01-15T12:00:00Z", 3.5])), Ok((ts, Some(3.5))));
        assert_eq!(parse_point(&json!(["2024-01-15T12:00:00Z", null])), Ok((ts, None)));
        assert_eq!(parse_point(&json!(["2024-01-15T12:00:00Z", "41"])), Ok((ts, Some(41.0))));
        assert!(parse_point(&json!(["not a time", 1])).is_err());
        assert!(parse_point(&json!(["2024-01-15T12:00:00Z"])).is_err());
        assert!(parse_point(&json!({"ts": 1})).is_err());
    }
}
