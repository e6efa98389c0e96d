//! Display conversion for normalized readings.

use core::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::models::ideal::Ideal;
use crate::models::shed::DataType;

const KELVIN_OFFSET: f64 = 273.15;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum TemperatureUnit {
    Kelvin,
    #[default]
    Celsius,
    Fahrenheit,
    Felsius,
}

impl TemperatureUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Kelvin => "°K",
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
            TemperatureUnit::Felsius => "°⋲",
        }
    }

    pub fn convert_kelvin(self, kelvin: f64) -> f64 {
        match self {
            TemperatureUnit::Kelvin => kelvin,
            TemperatureUnit::Celsius => kelvin - KELVIN_OFFSET,
            TemperatureUnit::Fahrenheit => kelvin * 9.0 / 5.0 - 459.67,
            // Inverse of the ingest fallback formula.
            TemperatureUnit::Felsius => (kelvin - KELVIN_OFFSET) * 7.0 / 5.0 - 16.0,
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "k" | "kelvin" => Ok(TemperatureUnit::Kelvin),
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            "felsius" => Ok(TemperatureUnit::Felsius),
            other => Err(format!("unknown temperature unit: {}", other)),
        }
    }
}

impl Display for TemperatureUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemperatureUnit::Kelvin => "kelvin",
            TemperatureUnit::Celsius => "celsius",
            TemperatureUnit::Fahrenheit => "fahrenheit",
            TemperatureUnit::Felsius => "felsius",
        };
        f.write_str(name)
    }
}

pub fn display_value(data_type: DataType, raw: f64, unit: TemperatureUnit) -> f64 {
    match data_type {
        DataType::Temperature => unit.convert_kelvin(raw),
        _ => raw,
    }
}

pub fn unit_suffix(data_type: DataType, unit: TemperatureUnit) -> &'static str {
    match data_type {
        DataType::Temperature => unit.symbol(),
        DataType::Gas => "ppm",
        DataType::Humidity => "%",
        DataType::Light => "lux",
        DataType::Moisture => "% vwc",
        DataType::Solar => "W",
    }
}

/// `21.50°C`, or `N/A` when there is no value.
pub fn format_reading(data_type: DataType, raw: Option<f64>, unit: TemperatureUnit) -> String {
    match raw {
        Some(raw) => format!(
            "{:.2}{}",
            display_value(data_type, raw, unit),
            unit_suffix(data_type, unit)
        ),
        None => "N/A".to_string(),
    }
}

pub fn format_ideal(ideal: Option<&Ideal>, unit: TemperatureUnit) -> String {
    match ideal {
        Some(i) => format!(
            "{:.2} to {:.2}{}",
            display_value(i.data_type, i.min, unit),
            display_value(i.data_type, i.max, unit),
            unit_suffix(i.data_type, unit)
        ),
        None => "N/A".to_string(),
    }
}

/// `42s ago`, `5m ago`, `3h ago`, or `on 2024/01/15`.
pub fn time_since(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - ts;
    if elapsed.num_seconds() < 60 {
        format!("{}s ago", elapsed.num_seconds())
    } else if elapsed.num_minutes() < 60 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_hours() < 24 {
        format!("{}h ago", elapsed.num_hours())
    } else {
        format!("on {}", ts.format("%Y/%m/%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::normalize::TemperatureScale;
    use chrono::{TimeDelta, TimeZone};

    #[test]
    fn kelvin_round_trips_through_every_unit() {
        let kelvin = 293.15;
        assert!((TemperatureUnit::Celsius.convert_kelvin(kelvin) - 20.0).abs() < 1e-9);
        assert!((TemperatureUnit::Fahrenheit.convert_kelvin(kelvin) - 68.0).abs() < 1e-9);
        assert_eq!(TemperatureUnit::Kelvin.convert_kelvin(kelvin), kelvin);

        let felsius = TemperatureUnit::Felsius.convert_kelvin(kelvin);
        assert!((TemperatureScale::Felsius.to_kelvin(felsius) - kelvin).abs() < 1e-9);
    }

    #[test]
    fn parses_unit_names() {
        assert_eq!("C".parse::<TemperatureUnit>(), Ok(TemperatureUnit::Celsius));
        assert_eq!(" Fahrenheit ".parse::<TemperatureUnit>(), Ok(TemperatureUnit::Fahrenheit));
        assert_eq!("kelvin".parse::<TemperatureUnit>(), Ok(TemperatureUnit::Kelvin));
        assert!("rankine".parse::<TemperatureUnit>().is_err());
    }

    #[test]
    fn formatting() {
        let unit = TemperatureUnit::Celsius;
        assert_eq!(format_reading(DataType::Temperature, Some(294.65), unit), "21.50°C");
        assert_eq!(format_reading(DataType::Moisture, Some(41.0), unit), "41.00% vwc");
        assert_eq!(format_reading(DataType::Gas, None, unit), "N/A");
        let ideal = Ideal::site("gh2", DataType::Temperature, 280.15, 291.15);
        assert_eq!(format_ideal(Some(&ideal), unit), "7.00 to 18.00°C");
        assert_eq!(format_ideal(None, unit), "N/A");

        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(time_since(now - TimeDelta::seconds(42), now), "42s ago");
        assert_eq!(time_since(now - TimeDelta::minutes(5), now), "5m ago");
        assert_eq!(time_since(now - TimeDelta::hours(3), now), "3h ago");
        assert_eq!(time_since(now - TimeDelta::days(2), now), "on 2024/01/13");
    }
}
