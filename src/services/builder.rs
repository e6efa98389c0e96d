//! Builds a fresh [`Generation`] from a [`TelemetrySource`].
//!
//! Sites and the device index are structural: if either cannot be read the
//! build fails and nothing is published. Below that, failures are local. A bad
//! record drops the record, a failed series fetch drops the series, a failed
//! or panicking device fetch drops the device.

use chrono::{DateTime, Utc};
use core::fmt;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use crate::models::graph::{Device, Generation, Reading, Series, Site, Zone};
use crate::models::ideal::{DayContext, Ideal};
use crate::models::shed::{DataType, DeviceCategory, DeviceDoc, DeviceId, Resolution, SeriesDoc, SiteDoc};
use crate::services::ideals::{IdealResolver, ResolveScope};
use crate::services::normalize::{normalize_value, parse_point, Rejected, TemperatureScale};
use crate::source::{SourceError, TelemetrySource};
use crate::utils::parse_timestamp;

#[derive(Debug)]
pub enum BuildError {
    Sites(SourceError),
    DeviceIndex(SourceError),
    /// The fetch thread pool could not be started.
    Pool(String),
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Sites(e) => write!(f, "site list unavailable: {}", e),
            BuildError::DeviceIndex(e) => write!(f, "device index unavailable: {}", e),
            BuildError::Pool(e) => write!(f, "fetch pool unavailable: {}", e),
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BuildError::Sites(e) | BuildError::DeviceIndex(e) => Some(e),
            BuildError::Pool(_) => None,
        }
    }
}

/// A device fetched but not yet attached to a generation.
struct FetchedDevice {
    doc: DeviceDoc,
    series: Vec<Series>,
}

pub struct SnapshotBuilder<'a> {
    source: &'a dyn TelemetrySource,
    resolver: &'a IdealResolver,
    workers: NonZeroUsize,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(source: &'a dyn TelemetrySource, resolver: &'a IdealResolver, workers: NonZeroUsize) -> Self {
        SnapshotBuilder {
            source,
            resolver,
            workers,
        }
    }

    pub fn build(&self) -> Result<Generation, BuildError> {
        self.build_at(Utc::now(), DayContext::local_now())
    }

    /// Build against a fixed clock. Ideals are resolved once, with `context`.
    pub fn build_at(&self, now: DateTime<Utc>, context: DayContext) -> Result<Generation, BuildError> {
        let started = Instant::now();
        let mut generation = Generation::new(now, context);

        let sites = self.source.list_sites().map_err(BuildError::Sites)?;
        for doc in sites {
            self.attach_site(&mut generation, doc);
        }

        let index = self
            .source
            .list_device_ids_by_category()
            .map_err(BuildError::DeviceIndex)?;
        let ids = device_ids_in_category_order(&index);
        generation.expected_devices = ids.len();

        let fetched = self.fetch_devices(&ids)?;
        for ((category, id), device) in ids.iter().zip(fetched) {
            if let Some(device) = device {
                self.attach_device(&mut generation, *category, id, device);
            }
        }

        info!(
            "Build: {} site(s), {} zone(s), {}/{} device(s) in {:.2?}",
            generation.sites().len(),
            generation.zones().len(),
            generation.devices().len(),
            generation.expected_devices,
            started.elapsed()
        );
        Ok(generation)
    }

    fn attach_site(&self, generation: &mut Generation, doc: SiteDoc) {
        let context = generation.context;
        let name = doc.name.unwrap_or_else(|| {
            warn!("Build: site {} has no name", doc.id.0);
            doc.id.0.clone()
        });
        let ideals = resolve_all(|t| self.resolver.resolve(ResolveScope::Site(&doc.id), t, context));
        let site = Site {
            id: doc.id.clone(),
            name,
            latitude: doc.lat,
            longitude: doc.lon,
            altitude: doc.altitude,
            country_code: doc.country_code,
            time_zone: doc.time_zone,
            zones: Vec::new(),
            devices: Vec::new(),
            ideals,
        };
        let Some(site_ref) = generation.push_site(site) else {
            warn!("Build: duplicate site {} ignored", doc.id.0);
            return;
        };
        debug!("Build: site {}", doc.id.0);

        for zone in doc.zones {
            let ideals = resolve_all(|t| self.resolver.resolve(ResolveScope::Zone(&doc.id, &zone.id), t, context));
            let name = zone.name.unwrap_or_else(|| zone.id.0.clone());
            let zone_id = zone.id.clone();
            let pushed = generation.push_zone(Zone {
                id: zone.id,
                name,
                site: site_ref,
                devices: Vec::new(),
                ideals,
            });
            if pushed.is_none() {
                warn!("Build: duplicate zone {}/{} ignored", doc.id.0, zone_id.0);
            }
        }
    }

    /// Fetch every device on a pool of `workers` threads. The indexed collect
    /// keeps the result in device-index order.
    fn fetch_devices(&self, ids: &[(DeviceCategory, DeviceId)]) -> Result<Vec<Option<FetchedDevice>>, BuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.get())
            .build()
            .map_err(|e| BuildError::Pool(e.to_string()))?;

        Ok(pool.install(|| {
            ids.par_iter()
                .map(|(_, id)| match panic::catch_unwind(AssertUnwindSafe(|| self.fetch_device(id))) {
                    Ok(Ok(device)) => Some(device),
                    Ok(Err(e)) => {
                        warn!("Build: device {} skipped: {}", id.0, e);
                        None
                    }
                    Err(_) => {
                        warn!("Build: device {} skipped: fetch panicked", id.0);
                        None
                    }
                })
                .collect()
        }))
    }

    /// Metadata first, then the three resolutions side by side.
    fn fetch_device(&self, id: &DeviceId) -> Result<FetchedDevice, SourceError> {
        let doc = self.source.get_device(id)?;

        let fetched: Vec<(Resolution, thread::Result<Result<SeriesDoc, SourceError>>)> = Resolution::ALL
            .par_iter()
            .map(|&resolution| {
                let result = panic::catch_unwind(AssertUnwindSafe(|| self.source.get_device_series(id, resolution)));
                (resolution, result)
            })
            .collect();

        let mut series = Vec::new();
        for (resolution, result) in fetched {
            match result {
                Ok(Ok(doc)) => series.extend(series_from_doc(id, resolution, &doc)),
                Ok(Err(e)) => warn!("Build: device {} {} series skipped: {}", id.0, resolution.label(), e),
                Err(_) => warn!("Build: device {} {} series skipped: fetch panicked", id.0, resolution.label()),
            }
        }
        Ok(FetchedDevice { doc, series })
    }

    fn attach_device(&self, generation: &mut Generation, category: DeviceCategory, id: &DeviceId, fetched: FetchedDevice) {
        let FetchedDevice { doc, series } = fetched;
        if let Some(reported) = &doc.id
            && reported != id
        {
            warn!("Build: device {} reported itself as {}", id.0, reported.0);
        }
        let (Some(site_id), Some(zone_id)) = (doc.site_id, doc.zone_id) else {
            warn!("Build: device {} has no site/zone reference; skipped", id.0);
            return;
        };
        let Some(site) = generation.site_by_id(&site_id) else {
            warn!("Build: device {} references unknown site {}; skipped", id.0, site_id.0);
            return;
        };
        let Some(zone) = generation.zone_by_id(&site_id, &zone_id) else {
            warn!(
                "Build: device {} references unknown zone {}/{}; skipped",
                id.0, site_id.0, zone_id.0
            );
            return;
        };

        let last_connection = doc.last_connection.as_deref().and_then(|raw| {
            parse_timestamp(raw)
                .map_err(|e| warn!("Build: device {} last connection: {}", id.0, e))
                .ok()
        });
        let name = doc.name.unwrap_or_else(|| {
            warn!("Build: device {} has no name", id.0);
            id.0.clone()
        });
        let context = generation.context;
        let ideals = resolve_all(|t| {
            self.resolver
                .resolve(ResolveScope::Device(&site_id, &zone_id, id), t, context)
        });

        let device = Device {
            id: id.clone(),
            name,
            category,
            site,
            zone,
            last_connection,
            software_version: doc.software_version,
            series,
            ideals,
        };
        if generation.push_device(device).is_none() {
            warn!("Build: duplicate device {} ignored", id.0);
        }
    }
}

/// Flatten the device index in category declaration order. Unknown categories
/// are ignored; an id listed twice keeps its first category.
fn device_ids_in_category_order(index: &BTreeMap<String, Vec<DeviceId>>) -> Vec<(DeviceCategory, DeviceId)> {
    for label in index.keys() {
        if !DeviceCategory::ALL.iter().any(|c| c.label() == label) {
            debug!("Build: ignoring unknown device category {:?}", label);
        }
    }
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for category in DeviceCategory::ALL {
        for id in index.get(category.label()).into_iter().flatten() {
            if seen.insert(id.clone()) {
                ids.push((category, id.clone()));
            } else {
                warn!("Build: device {} listed more than once; keeping first", id.0);
            }
        }
    }
    ids
}

fn resolve_all<'r>(resolve: impl Fn(DataType) -> Option<&'r Ideal>) -> BTreeMap<DataType, Ideal> {
    DataType::ALL
        .into_iter()
        .filter_map(|t| resolve(t).map(|ideal| (t, ideal.clone())))
        .collect()
}

/// Every data type the document carries becomes one series, even when all of
/// its records were dropped; the device still serves that type.
fn series_from_doc(id: &DeviceId, resolution: Resolution, doc: &SeriesDoc) -> Vec<Series> {
    let mut out = Vec::new();
    for data_type in DataType::ALL {
        let (Some(points), Some(scale)) = (doc.points(data_type), doc.scale(data_type)) else {
            continue;
        };
        if data_type == DataType::Temperature && TemperatureScale::from_declared(scale) == TemperatureScale::Felsius {
            warn!(
                "Build: device {} declares unknown temperature scale {:?}; assuming Felsius",
                id.0, scale
            );
        }

        let mut seen = HashSet::new();
        let mut readings = Vec::with_capacity(points.len());
        let mut dropped = 0usize;
        for point in points {
            let (timestamp, raw) = match parse_point(point) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Build: device {} {} record skipped: {}", id.0, data_type.label(), e);
                    dropped += 1;
                    continue;
                }
            };
            match normalize_value(data_type, scale, raw) {
                Ok(raw) if seen.insert(timestamp) => readings.push(Reading {
                    timestamp,
                    raw,
                    data_type,
                }),
                Ok(_) => dropped += 1,
                Err(Rejected::Missing) => {}
                Err(reason) => {
                    debug!("Build: device {} {} value dropped: {:?}", id.0, data_type.label(), reason);
                    dropped += 1;
                }
            }
        }
        readings.sort_by_key(|r| r.timestamp);
        if dropped > 0 {
            debug!(
                "Build: device {} {} {}: dropped {} record(s)",
                id.0,
                data_type.label(),
                resolution.label(),
                dropped
            );
        }
        out.push(Series {
            data_type,
            resolution,
            scale: scale.to_string(),
            readings,
        });
    }
    out
}
