//! The in-memory Site → Zone → Device graph for one refresh generation.
//!
//! Every entity lives in an arena owned by its [`Generation`]; back-references
//! are arena indices, so a generation is dropped as a unit and a device can only
//! ever point at a zone and site of its own generation.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::ideal::{DayContext, Ideal};
use crate::models::shed::{DataType, DeviceCategory, DeviceId, Resolution, SiteId, ZoneId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteRef(usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneRef(usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceRef(usize);

/// Any entity of a generation that statistics can be asked about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Site(SiteRef),
    Zone(ZoneRef),
    Device(DeviceRef),
}

/// A single normalized reading. Temperatures are stored in Kelvin.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub raw: f64,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub data_type: DataType,
    pub resolution: Resolution,
    /// Scale string exactly as declared by the source.
    pub scale: String,
    pub readings: Vec<Reading>,
}

impl Series {
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.iter().max_by_key(|r| r.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub country_code: Option<String>,
    pub time_zone: Option<String>,
    pub zones: Vec<ZoneRef>,
    pub devices: Vec<DeviceRef>,
    pub ideals: BTreeMap<DataType, Ideal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub site: SiteRef,
    pub devices: Vec<DeviceRef>,
    pub ideals: BTreeMap<DataType, Ideal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub category: DeviceCategory,
    pub site: SiteRef,
    pub zone: ZoneRef,
    pub last_connection: Option<DateTime<Utc>>,
    pub software_version: Option<String>,
    /// Ordered by resolution, then data type.
    pub series: Vec<Series>,
    pub ideals: BTreeMap<DataType, Ideal>,
}

impl Device {
    pub fn serves(&self, data_type: DataType) -> bool {
        self.series.iter().any(|s| s.data_type == data_type)
    }

    pub fn data_types(&self) -> Vec<DataType> {
        DataType::ALL.into_iter().filter(|t| self.serves(*t)).collect()
    }

    pub fn series_for(&self, data_type: DataType, resolution: Resolution) -> Option<&Series> {
        self.series
            .iter()
            .find(|s| s.data_type == data_type && s.resolution == resolution)
    }

    /// All readings of a type across resolutions, one per timestamp. Series are
    /// stored in resolution order, so the finest resolution wins a collision.
    pub fn all_readings(&self, data_type: DataType) -> Vec<&Reading> {
        let mut seen = HashSet::new();
        self.series
            .iter()
            .filter(|s| s.data_type == data_type)
            .flat_map(|s| s.readings.iter())
            .filter(|r| seen.insert(r.timestamp))
            .collect()
    }

    /// Newest reading across resolutions; on a timestamp tie the finer
    /// resolution wins, as in [`Device::all_readings`].
    pub fn latest_reading(&self, data_type: DataType) -> Option<&Reading> {
        self.series
            .iter()
            .filter(|s| s.data_type == data_type)
            .filter_map(Series::latest)
            .fold(None, |best: Option<&Reading>, r| match best {
                Some(b) if b.timestamp >= r.timestamp => Some(b),
                _ => Some(r),
            })
    }

    pub fn time_of_last_reading(&self, data_type: DataType) -> Option<DateTime<Utc>> {
        self.latest_reading(data_type).map(|r| r.timestamp)
    }
}

/// One complete build of the graph. Mutation is crate-private and only used
/// while a builder still owns the value exclusively.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub built_at: DateTime<Utc>,
    pub context: DayContext,
    /// Device ids announced by the device index, including ones that failed to load.
    pub expected_devices: usize,
    sites: Vec<Site>,
    zones: Vec<Zone>,
    devices: Vec<Device>,
    site_ids: HashMap<SiteId, SiteRef>,
    zone_ids: HashMap<(SiteId, ZoneId), ZoneRef>,
    device_ids: HashMap<DeviceId, DeviceRef>,
}

impl Generation {
    pub(crate) fn new(built_at: DateTime<Utc>, context: DayContext) -> Self {
        Generation {
            built_at,
            context,
            expected_devices: 0,
            sites: Vec::new(),
            zones: Vec::new(),
            devices: Vec::new(),
            site_ids: HashMap::new(),
            zone_ids: HashMap::new(),
            device_ids: HashMap::new(),
        }
    }

    /// Returns `None` when a site with the same id is already present.
    pub(crate) fn push_site(&mut self, site: Site) -> Option<SiteRef> {
        if self.site_ids.contains_key(&site.id) {
            return None;
        }
        let r = SiteRef(self.sites.len());
        self.site_ids.insert(site.id.clone(), r);
        self.sites.push(site);
        Some(r)
    }

    /// Attaches the zone to its site; `None` on a duplicate id within the site.
    pub(crate) fn push_zone(&mut self, zone: Zone) -> Option<ZoneRef> {
        let key = (self.sites[zone.site.0].id.clone(), zone.id.clone());
        if self.zone_ids.contains_key(&key) {
            return None;
        }
        let r = ZoneRef(self.zones.len());
        self.sites[zone.site.0].zones.push(r);
        self.zone_ids.insert(key, r);
        self.zones.push(zone);
        Some(r)
    }

    /// Attaches the device to its site and zone; `None` on a duplicate id.
    pub(crate) fn push_device(&mut self, device: Device) -> Option<DeviceRef> {
        if self.device_ids.contains_key(&device.id) {
            return None;
        }
        let r = DeviceRef(self.devices.len());
        self.sites[device.site.0].devices.push(r);
        self.zones[device.zone.0].devices.push(r);
        self.device_ids.insert(device.id.clone(), r);
        self.devices.push(device);
        Some(r)
    }

    pub fn site(&self, r: SiteRef) -> &Site {
        &self.sites[r.0]
    }

    pub fn zone(&self, r: ZoneRef) -> &Zone {
        &self.zones[r.0]
    }

    pub fn device(&self, r: DeviceRef) -> &Device {
        &self.devices[r.0]
    }

    pub fn site_refs(&self) -> impl Iterator<Item = SiteRef> + '_ {
        (0..self.sites.len()).map(SiteRef)
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn site_by_id(&self, id: &SiteId) -> Option<SiteRef> {
        self.site_ids.get(id).copied()
    }

    pub fn zone_by_id(&self, site: &SiteId, zone: &ZoneId) -> Option<ZoneRef> {
        self.zone_ids.get(&(site.clone(), zone.clone())).copied()
    }

    pub fn device_by_id(&self, id: &DeviceId) -> Option<DeviceRef> {
        self.device_ids.get(id).copied()
    }

    /// Devices contributing to a scope, in attachment order.
    pub fn devices_under(&self, scope: Scope) -> Vec<DeviceRef> {
        match scope {
            Scope::Site(r) => self.site(r).devices.clone(),
            Scope::Zone(r) => self.zone(r).devices.clone(),
            Scope::Device(r) => vec![r],
        }
    }

    pub fn name_of(&self, scope: Scope) -> &str {
        match scope {
            Scope::Site(r) => &self.site(r).name,
            Scope::Zone(r) => &self.zone(r).name,
            Scope::Device(r) => &self.device(r).name,
        }
    }

    pub fn ideals_of(&self, scope: Scope) -> &BTreeMap<DataType, Ideal> {
        match scope {
            Scope::Site(r) => &self.site(r).ideals,
            Scope::Zone(r) => &self.zone(r).ideals,
            Scope::Device(r) => &self.device(r).ideals,
        }
    }
}
