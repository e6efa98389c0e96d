//! Synthetic sensor network for running without the real API.
//!
//! Every document is generated from a seed and the minute it is requested for,
//! so an anchored source returns identical documents on every call.

use chrono::{DateTime, DurationRound, SecondsFormat, TimeDelta, Timelike, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::models::shed::{
    DataType, DeviceCategory, DeviceDoc, DeviceId, DeviceIndexDoc, Resolution, SeriesDoc, SiteDoc, SiteId, ZoneDoc,
    ZoneId,
};
use crate::source::{SourceError, TelemetrySource};

const DEFAULT_SEED: u64 = 0x0420_1337_DEAD_BEEF;
/// Chance that a single reading comes back as `null`.
const NULL_READING_RATE: f64 = 0.01;
/// Chance that a device reports a stale last connection.
const OFFLINE_RATE: f64 = 0.05;

struct SiteProfile {
    id: &'static str,
    name: &'static str,
    lat: f64,
    lon: f64,
    altitude: f64,
}

struct ZoneProfile {
    site: &'static str,
    id: &'static str,
    name: &'static str,
    temp_c: f64,
    humidity: f64,
    moisture: Option<f64>,
    light_peak: Option<f64>,
    gas_ppm: Option<f64>,
    solar_peak: Option<f64>,
}

static SITES: [SiteProfile; 5] = [
    SiteProfile { id: "gh1", name: "Greenhouse 1", lat: 51.2965, lon: 1.0642, altitude: 60.0 },
    SiteProfile { id: "gh2", name: "Greenhouse 2", lat: 51.2968, lon: 1.0651, altitude: 61.0 },
    SiteProfile { id: "gh3", name: "Greenhouse 3", lat: 51.2959, lon: 1.0660, altitude: 59.5 },
    SiteProfile { id: "house", name: "Farm House", lat: 51.2971, lon: 1.0655, altitude: 58.5 },
    SiteProfile { id: "outside", name: "Outside", lat: 51.2975, lon: 1.0630, altitude: 57.0 },
];

static ZONES: [ZoneProfile; 7] = [
    ZoneProfile {
        site: "gh1",
        id: "1",
        name: "Tomatoes",
        temp_c: 18.0,
        humidity: 35.0,
        moisture: Some(35.0),
        light_peak: Some(280.0),
        gas_ppm: None,
        solar_peak: None,
    },
    ZoneProfile {
        site: "gh1",
        id: "2",
        name: "Cucumbers",
        temp_c: 19.0,
        humidity: 36.0,
        moisture: Some(40.0),
        light_peak: Some(260.0),
        gas_ppm: None,
        solar_peak: None,
    },
    ZoneProfile {
        site: "gh2",
        id: "1",
        name: "Seedlings",
        temp_c: 12.0,
        humidity: 34.0,
        moisture: Some(30.0),
        light_peak: None,
        gas_ppm: Some(0.4),
        solar_peak: None,
    },
    ZoneProfile {
        site: "gh3",
        id: "1",
        name: "Orchids",
        temp_c: 21.0,
        humidity: 37.0,
        moisture: Some(28.0),
        light_peak: None,
        gas_ppm: None,
        solar_peak: None,
    },
    ZoneProfile {
        site: "house",
        id: "store",
        name: "Store Room",
        temp_c: 16.0,
        humidity: 45.0,
        moisture: None,
        light_peak: Some(150.0),
        gas_ppm: None,
        solar_peak: None,
    },
    ZoneProfile {
        site: "outside",
        id: "heap",
        name: "Compost Heap",
        temp_c: 38.0,
        humidity: 70.0,
        moisture: None,
        light_peak: None,
        gas_ppm: None,
        solar_peak: None,
    },
    ZoneProfile {
        site: "outside",
        id: "field",
        name: "Field",
        temp_c: 9.0,
        humidity: 80.0,
        moisture: Some(69.0),
        light_peak: None,
        gas_ppm: None,
        solar_peak: Some(900.0),
    },
];

struct FakeDevice {
    id: String,
    category: DeviceCategory,
    zone: &'static ZoneProfile,
}

pub struct FakeSource {
    seed: u64,
    anchor: Option<DateTime<Utc>>,
    devices: Vec<FakeDevice>,
}

impl FakeSource {
    /// Documents follow the wall clock.
    pub fn live() -> Self {
        Self::build(DEFAULT_SEED, None)
    }

    /// Documents are generated as if it were always `anchor`.
    pub fn anchored(anchor: DateTime<Utc>, seed: u64) -> Self {
        Self::build(seed, Some(anchor))
    }

    fn build(seed: u64, anchor: Option<DateTime<Utc>>) -> Self {
        let mut devices = Vec::new();
        for zone in &ZONES {
            let suffix = format!("{}-{}", zone.site, zone.id);
            let mut add = |prefix: &str, category| {
                devices.push(FakeDevice {
                    id: format!("{}-{}", prefix, suffix),
                    category,
                    zone,
                })
            };
            add("th", DeviceCategory::TempHumid);
            if zone.moisture.is_some() {
                add("hyd", DeviceCategory::Hydrometer);
            }
            if zone.light_peak.is_some() {
                add("lum", DeviceCategory::Lumosity);
            }
            if zone.gas_ppm.is_some() {
                add("gas", DeviceCategory::Gas);
            }
            if zone.solar_peak.is_some() {
                add("sol", DeviceCategory::Solar);
            }
        }
        FakeSource { seed, anchor, devices }
    }

    fn now(&self) -> DateTime<Utc> {
        let now = self.anchor.unwrap_or_else(Utc::now);
        now.duration_trunc(TimeDelta::minutes(1)).unwrap_or(now)
    }

    fn find(&self, id: &DeviceId) -> Result<&FakeDevice, SourceError> {
        self.devices.iter().find(|d| d.id == id.0).ok_or_else(|| SourceError::Http {
            status: 404,
            message: format!("unknown device {}", id.0),
        })
    }

    fn rng_for(&self, device: &str, salt: u64, now: DateTime<Utc>) -> SmallRng {
        SmallRng::seed_from_u64(self.seed ^ fnv1a(device.as_bytes()) ^ salt.rotate_left(17) ^ now.timestamp() as u64)
    }
}

impl TelemetrySource for FakeSource {
    fn list_sites(&self) -> Result<Vec<SiteDoc>, SourceError> {
        Ok(SITES
            .iter()
            .map(|site| SiteDoc {
                id: SiteId(site.id.to_string()),
                name: Some(site.name.to_string()),
                lat: Some(site.lat),
                lon: Some(site.lon),
                altitude: Some(site.altitude),
                country_code: Some("GB".to_string()),
                time_zone: Some("Europe/London".to_string()),
                zones: ZONES
                    .iter()
                    .filter(|z| z.site == site.id)
                    .map(|z| ZoneDoc {
                        id: ZoneId(z.id.to_string()),
                        name: Some(z.name.to_string()),
                    })
                    .collect(),
            })
            .collect())
    }

    fn list_device_ids_by_category(&self) -> Result<DeviceIndexDoc, SourceError> {
        let mut index: DeviceIndexDoc = DeviceCategory::ALL
            .iter()
            .map(|c| (c.label().to_string(), Vec::new()))
            .collect();
        for device in &self.devices {
            if let Some(ids) = index.get_mut(device.category.label()) {
                ids.push(DeviceId(device.id.clone()));
            }
        }
        Ok(index)
    }

    fn get_device(&self, id: &DeviceId) -> Result<DeviceDoc, SourceError> {
        let device = self.find(id)?;
        let now = self.now();
        let mut rng = self.rng_for(&device.id, 0, now);
        let offline = rng.random_bool(OFFLINE_RATE);
        let last_seen = if offline {
            now - TimeDelta::minutes(rng.random_range(6..90))
        } else {
            now - TimeDelta::seconds(rng.random_range(0..90))
        };
        Ok(DeviceDoc {
            id: Some(id.clone()),
            name: Some(format!("{} {}", device.zone.name, category_noun(device.category))),
            site_id: Some(SiteId(device.zone.site.to_string())),
            zone_id: Some(ZoneId(device.zone.id.to_string())),
            last_connection: Some(last_seen.to_rfc3339_opts(SecondsFormat::Secs, true)),
            software_version: Some(format!("1.{}.{}", fnv1a(device.id.as_bytes()) % 4, rng.random_range(0..10))),
        })
    }

    fn get_device_series(&self, id: &DeviceId, resolution: Resolution) -> Result<SeriesDoc, SourceError> {
        let device = self.find(id)?;
        let now = self.now();
        let (step, count) = match resolution {
            Resolution::EveryMinute => (TimeDelta::minutes(1), 60),
            Resolution::Every10Minutes => (TimeDelta::minutes(10), 36),
            Resolution::EveryHour => (TimeDelta::hours(1), 48),
        };
        let mut rng = self.rng_for(&device.id, resolution as u64 + 1, now);

        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), Value::String(device.id.clone()));
        for &data_type in data_types(device.category) {
            let points: Vec<Value> = (0..count)
                .map(|i| {
                    let ts = now - step * i;
                    let value = if rng.random_bool(NULL_READING_RATE) {
                        Value::Null
                    } else {
                        json!(round2(reading(device.zone, data_type, ts, &mut rng)))
                    };
                    json!([ts.to_rfc3339_opts(SecondsFormat::Secs, true), value])
                })
                .collect();
            fields.insert(data_type.value_field().to_string(), Value::Array(points));
            fields.insert(data_type.scale_field().to_string(), json!(declared_scale(data_type)));
        }
        Ok(SeriesDoc { fields })
    }
}

fn data_types(category: DeviceCategory) -> &'static [DataType] {
    match category {
        DeviceCategory::Gas => &[DataType::Gas],
        DeviceCategory::Solar => &[DataType::Solar],
        DeviceCategory::Hydrometer => &[DataType::Moisture],
        DeviceCategory::TempHumid => &[DataType::Temperature, DataType::Humidity],
        DeviceCategory::Lumosity => &[DataType::Light],
    }
}

fn declared_scale(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Gas => "ppm",
        DataType::Moisture => "% vwc",
        DataType::Light => "lux",
        DataType::Temperature => "C",
        DataType::Humidity => "%",
        DataType::Solar => "W",
    }
}

fn category_noun(category: DeviceCategory) -> &'static str {
    match category {
        DeviceCategory::Gas => "gas sensor",
        DeviceCategory::Solar => "solar panel",
        DeviceCategory::Hydrometer => "hydrometer",
        DeviceCategory::TempHumid => "climate probe",
        DeviceCategory::Lumosity => "light meter",
    }
}

/// Raw value in the declared scale at `ts`.
fn reading(zone: &ZoneProfile, data_type: DataType, ts: DateTime<Utc>, rng: &mut SmallRng) -> f64 {
    let day_fraction = ts.num_seconds_from_midnight() as f64 / 86_400.0;
    let diurnal = (2.0 * PI * (day_fraction - 0.375)).sin();
    let daylight = gaussian(day_fraction, 0.5, 0.12);
    match data_type {
        DataType::Temperature => zone.temp_c + 3.0 * diurnal + rng.random_range(-0.3..0.3),
        DataType::Humidity => (zone.humidity - 2.0 * diurnal + rng.random_range(-0.8..0.8)).clamp(0.0, 100.0),
        DataType::Moisture => zone.moisture.unwrap_or(0.0) + rng.random_range(-1.5..1.5),
        DataType::Light => (zone.light_peak.unwrap_or(0.0) * daylight + rng.random_range(-2.0..2.0)).max(0.0),
        DataType::Gas => (zone.gas_ppm.unwrap_or(0.0) + rng.random_range(-0.05..0.05)).max(0.0),
        DataType::Solar => (zone.solar_peak.unwrap_or(0.0) * daylight * rng.random_range(0.6..1.0)).max(0.0),
    }
}

fn gaussian(x: f64, center: f64, width: f64) -> f64 {
    let z = (x - center) / width;
    (-0.5 * z * z).exp()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
