//! Shared test scaffolding: an in-memory telemetry source loaded from JSON
//! fixtures, and a small builder for hand-made generations.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::graph::{Device, DeviceRef, Generation, Reading, Series, Site, SiteRef, Zone, ZoneRef};
use crate::models::ideal::{DayContext, Ideal};
use crate::models::shed::{
    DataType, DeviceCategory, DeviceDoc, DeviceId, DeviceIndexDoc, Resolution, SeriesDoc, SiteDoc, SiteId, ZoneId,
};
use crate::source::{SourceError, TelemetrySource};

/// 2024-01-15 12:00:00 UTC, the clock every fixture is written against.
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

/// Winter, daytime.
pub fn noon_context() -> DayContext {
    DayContext::at(12, 1)
}

#[derive(Debug, Default, Deserialize)]
pub struct StaticSource {
    pub sites: Vec<SiteDoc>,
    pub devices: DeviceIndexDoc,
    #[serde(default)]
    pub device_docs: BTreeMap<DeviceId, DeviceDoc>,
    /// device id -> resolution path segment -> document
    #[serde(default)]
    pub series: BTreeMap<DeviceId, BTreeMap<String, SeriesDoc>>,
    #[serde(skip)]
    pub fail_sites: bool,
    #[serde(skip)]
    pub fail_index: bool,
    #[serde(skip)]
    pub panicking_devices: BTreeSet<DeviceId>,
    #[serde(skip)]
    pub failing_series: BTreeSet<(DeviceId, Resolution)>,
}

impl StaticSource {
    pub fn load(path: &str) -> StaticSource {
        let json = std::fs::read_to_string(path).expect("fixture present");
        serde_json::from_str(&json).expect("parse network fixture")
    }
}

impl TelemetrySource for StaticSource {
    fn list_sites(&self) -> Result<Vec<SiteDoc>, SourceError> {
        if self.fail_sites {
            return Err(SourceError::Http {
                status: 503,
                message: "<no body>".into(),
            });
        }
        Ok(self.sites.clone())
    }

    fn list_device_ids_by_category(&self) -> Result<DeviceIndexDoc, SourceError> {
        if self.fail_index {
            return Err(SourceError::Transport("connection reset".into()));
        }
        Ok(self.devices.clone())
    }

    fn get_device(&self, id: &DeviceId) -> Result<DeviceDoc, SourceError> {
        if self.panicking_devices.contains(id) {
            panic!("device {} blew up", id.0);
        }
        self.device_docs.get(id).cloned().ok_or_else(|| SourceError::Http {
            status: 404,
            message: format!("no device {}", id.0),
        })
    }

    fn get_device_series(&self, id: &DeviceId, resolution: Resolution) -> Result<SeriesDoc, SourceError> {
        if self.failing_series.contains(&(id.clone(), resolution)) {
            return Err(SourceError::Transport("timed out".into()));
        }
        Ok(self
            .series
            .get(id)
            .and_then(|by_res| by_res.get(resolution.path_segment()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Readings as `(minutes before noon, value)`.
pub type Points<'a> = &'a [(i64, f64)];

pub struct GenerationFixture {
    pub generation: Generation,
}

impl GenerationFixture {
    pub fn new() -> Self {
        GenerationFixture {
            generation: Generation::new(noon(), noon_context()),
        }
    }

    pub fn site(&mut self, id: &str, ideals: &[Ideal]) -> SiteRef {
        self.generation
            .push_site(Site {
                id: SiteId(id.into()),
                name: format!("Site {}", id),
                latitude: None,
                longitude: None,
                altitude: None,
                country_code: None,
                time_zone: None,
                zones: Vec::new(),
                devices: Vec::new(),
                ideals: ideal_map(ideals),
            })
            .expect("unique site")
    }

    pub fn zone(&mut self, site: SiteRef, id: &str, ideals: &[Ideal]) -> ZoneRef {
        self.generation
            .push_zone(Zone {
                id: ZoneId(id.into()),
                name: format!("Zone {}", id),
                site,
                devices: Vec::new(),
                ideals: ideal_map(ideals),
            })
            .expect("unique zone")
    }

    /// `connected_mins_ago` of `None` means the device never reported a connection.
    pub fn device(
        &mut self,
        zone: ZoneRef,
        id: &str,
        connected_mins_ago: Option<i64>,
        readings: &[(DataType, Points<'_>)],
    ) -> DeviceRef {
        self.push_device(zone, id, connected_mins_ago, &[], readings)
    }

    pub fn device_with_ideals(
        &mut self,
        zone: ZoneRef,
        id: &str,
        ideals: &[Ideal],
        readings: &[(DataType, Points<'_>)],
    ) -> DeviceRef {
        self.push_device(zone, id, Some(0), ideals, readings)
    }

    fn push_device(
        &mut self,
        zone: ZoneRef,
        id: &str,
        connected_mins_ago: Option<i64>,
        ideals: &[Ideal],
        readings: &[(DataType, Points<'_>)],
    ) -> DeviceRef {
        let site = self.generation.zone(zone).site;
        let series = readings
            .iter()
            .map(|(data_type, points)| Series {
                data_type: *data_type,
                resolution: Resolution::EveryMinute,
                scale: "test".into(),
                readings: points
                    .iter()
                    .map(|(mins_ago, raw)| Reading {
                        timestamp: noon() - TimeDelta::minutes(*mins_ago),
                        raw: *raw,
                        data_type: *data_type,
                    })
                    .collect(),
            })
            .collect();
        self.generation
            .push_device(Device {
                id: DeviceId(id.into()),
                name: format!("Device {}", id),
                category: DeviceCategory::TempHumid,
                site,
                zone,
                last_connection: connected_mins_ago.map(|m| noon() - TimeDelta::minutes(m)),
                software_version: None,
                series,
                ideals: ideal_map(ideals),
            })
            .expect("unique device")
    }
}

fn ideal_map(ideals: &[Ideal]) -> BTreeMap<DataType, Ideal> {
    ideals.iter().map(|i| (i.data_type, i.clone())).collect()
}
