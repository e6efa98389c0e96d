//! Documents served by the sensor network's HTTP API, plus the small closed
//! vocabularies (data types, resolutions, device categories) they are keyed by.
//!
//! Scope: types only. Fields the network is known to omit are `Option` so a
//! single sloppy record never fails a whole document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub String);

/// Zone ids are only unique within their site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

// =====================
// Vocabularies
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Gas,
    Moisture,
    #[serde(alias = "LUMOSITY")]
    Light,
    Temperature,
    Humidity,
    Solar,
}

impl DataType {
    pub const ALL: [DataType; 6] = [
        DataType::Gas,
        DataType::Moisture,
        DataType::Light,
        DataType::Temperature,
        DataType::Humidity,
        DataType::Solar,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DataType::Gas => "gas",
            DataType::Moisture => "moisture",
            DataType::Light => "light",
            DataType::Temperature => "temperature",
            DataType::Humidity => "humidity",
            DataType::Solar => "solar",
        }
    }

    /// Key of the `[[timestamp, value], ...]` array in a series document.
    pub fn value_field(self) -> &'static str {
        match self {
            DataType::Gas => "gas_values",
            DataType::Moisture => "moisture_value",
            DataType::Light => "light_value",
            DataType::Temperature => "temperature_value",
            DataType::Humidity => "humidity_value",
            DataType::Solar => "solar_value",
        }
    }

    /// Key of the declared scale string in a series document.
    pub fn scale_field(self) -> &'static str {
        match self {
            DataType::Gas => "gas_scale",
            DataType::Moisture => "moisture_scale",
            DataType::Light => "light_scale",
            DataType::Temperature => "temp_scale",
            DataType::Humidity => "humidity_scale",
            DataType::Solar => "solar_scale",
        }
    }

    /// How many standard deviations a current value may stray from the
    /// historical mean before it counts as extreme.
    pub fn sd_multiplier(self) -> f64 {
        match self {
            DataType::Gas => 1.0,
            DataType::Moisture => 2.0,
            DataType::Light => 10.0,
            DataType::Temperature => 2.0,
            DataType::Humidity => 2.0,
            DataType::Solar => 10.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    EveryMinute,
    Every10Minutes,
    EveryHour,
}

impl Resolution {
    /// Declaration order doubles as merge precedence when readings collide.
    pub const ALL: [Resolution; 3] = [Resolution::EveryMinute, Resolution::Every10Minutes, Resolution::EveryHour];

    pub fn label(self) -> &'static str {
        match self {
            Resolution::EveryMinute => "every minute",
            Resolution::Every10Minutes => "every 10 minutes",
            Resolution::EveryHour => "every hour",
        }
    }

    pub fn path_segment(self) -> &'static str {
        match self {
            Resolution::EveryMinute => "minute",
            Resolution::Every10Minutes => "10minute",
            Resolution::EveryHour => "hour",
        }
    }

    /// Freshness margin used when matching a reading to an arbitrary timestamp.
    pub fn margin(self) -> chrono::Duration {
        match self {
            Resolution::EveryMinute => chrono::Duration::seconds(30),
            Resolution::Every10Minutes => chrono::Duration::seconds(300),
            Resolution::EveryHour => chrono::Duration::seconds(30 * 60),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceCategory {
    Gas,
    Solar,
    Hydrometer,
    TempHumid,
    Lumosity,
}

impl DeviceCategory {
    pub const ALL: [DeviceCategory; 5] = [
        DeviceCategory::Gas,
        DeviceCategory::Solar,
        DeviceCategory::Hydrometer,
        DeviceCategory::TempHumid,
        DeviceCategory::Lumosity,
    ];

    /// Key used by the device index document.
    pub fn label(self) -> &'static str {
        match self {
            DeviceCategory::Gas => "gas",
            DeviceCategory::Solar => "solar",
            DeviceCategory::Hydrometer => "hydrometer",
            DeviceCategory::TempHumid => "tempHumid",
            DeviceCategory::Lumosity => "lumosity",
        }
    }
}

// =====================
// Documents
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDoc {
    pub id: ZoneId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteDoc {
    pub id: SiteId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default, rename = "al", alias = "altitude")]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub zones: Vec<ZoneDoc>,
}

/// `{category label -> [device id]}`; unknown categories are tolerated.
pub type DeviceIndexDoc = BTreeMap<String, Vec<DeviceId>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDoc {
    #[serde(default)]
    pub id: Option<DeviceId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub site_id: Option<SiteId>,
    #[serde(default)]
    pub zone_id: Option<ZoneId>,
    /// Kept as text; parse failures are handled per record by the builder.
    #[serde(default)]
    pub last_connection: Option<String>,
    #[serde(default)]
    pub software_version: Option<String>,
}

/// One device's readings at one resolution. The payload is keyed by per-type
/// field names, so it stays loosely typed until the builder picks it apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesDoc {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl SeriesDoc {
    /// Raw `[timestamp, value]` records for a data type, when the document carries
    /// both its value array and its scale.
    pub fn points(&self, data_type: DataType) -> Option<&[Value]> {
        self.scale(data_type)?;
        self.fields
            .get(data_type.value_field())
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    pub fn scale(&self, data_type: DataType) -> Option<&str> {
        self.fields.get(data_type.scale_field()).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_site_list_with_short_altitude_key() {
        let json = r#"[{"id":"gh1","name":"Greenhouse 1","lat":51.29,"lon":1.06,"al":60.0,
            "country_code":"GB","time_zone":"Europe/London","zones":[{"id":"1","name":"Tomatoes"}]}]"#;
        let sites: Vec<SiteDoc> = serde_json::from_str(json).expect("parse sites");
        assert_eq!(sites[0].id, SiteId("gh1".into()));
        assert_eq!(sites[0].altitude, Some(60.0));
        assert_eq!(sites[0].zones[0].name.as_deref(), Some("Tomatoes"));
    }

    #[test]
    fn series_points_require_scale_field() {
        let json = r#"{"id":"d1","temperature_value":[["2024-01-15T12:00:00Z",20.5]],
            "humidity_value":[["2024-01-15T12:00:00Z",35]],"humidity_scale":"RH"}"#;
        let doc: SeriesDoc = serde_json::from_str(json).expect("parse series");
        assert!(doc.points(DataType::Temperature).is_none());
        assert_eq!(doc.points(DataType::Humidity).map(|p| p.len()), Some(1));
        assert_eq!(doc.scale(DataType::Humidity), Some("RH"));
    }

    #[test]
    fn category_labels_match_serde_names() {
        for category in DeviceCategory::ALL {
            let name = serde_json::to_value(category).expect("serialize");
            assert_eq!(name.as_str(), Some(category.label()));
        }
    }
}
