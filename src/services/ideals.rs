//! Ideal rule table and the first-match resolver over it.
//!
//! Rules are scanned in declaration order and the first one whose scope, data
//! type and day/season conditions all match wins. A context-qualified rule must
//! therefore be declared before a general rule for the same scope and type.

use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;

use crate::models::ideal::{DayContext, Ideal, IdealScope, SeasonCondition, TimeCondition};
use crate::models::shed::{DataType, DeviceId, SiteId, ZoneId};
use crate::utils::decode_json;

#[derive(Debug)]
pub enum IdealsError {
    Io(std::io::Error),
    Decode { path: String, message: String },
    /// A rule whose `min` exceeds its `max`; index into the file's rule list.
    InvertedRange(usize),
}

impl Display for IdealsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IdealsError::Io(e) => write!(f, "io error: {}", e),
            IdealsError::Decode { path, message } => write!(f, "decode error at {}: {}", path, message),
            IdealsError::InvertedRange(i) => write!(f, "rule {} has min greater than max", i),
        }
    }
}

impl Error for IdealsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            IdealsError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for IdealsError {
    fn from(value: std::io::Error) -> Self {
        IdealsError::Io(value)
    }
}

/// Immutable, ordered list of ideal rules.
#[derive(Debug, Clone, PartialEq)]
pub struct IdealTable {
    rules: Vec<Ideal>,
}

impl IdealTable {
    pub fn new(rules: Vec<Ideal>) -> Self {
        IdealTable { rules }
    }

    pub fn rules(&self) -> &[Ideal] {
        &self.rules
    }

    /// Parse a JSON array of rules, keeping file order.
    pub fn from_json(body: &str) -> Result<Self, IdealsError> {
        let rules: Vec<Ideal> = decode_json(body).map_err(|e| IdealsError::Decode {
            path: e.path().to_string(),
            message: e.inner().to_string(),
        })?;
        if let Some(i) = rules.iter().position(|r| r.min > r.max) {
            return Err(IdealsError::InvertedRange(i));
        }
        Ok(IdealTable::new(rules))
    }

    pub fn load(path: &Path) -> Result<Self, IdealsError> {
        let body = std::fs::read_to_string(path)?;
        Self::from_json(&body)
    }

    /// The rules the greenhouse network was deployed with. Temperatures in Kelvin.
    pub fn greenhouse() -> Self {
        use DataType::*;
        use SeasonCondition as S;
        use TimeCondition as T;

        IdealTable::new(vec![
            Ideal::site("gh1", Gas, 0.0, 1.0),
            Ideal::site("gh1", Humidity, 30.0, 40.0),
            Ideal::site("gh1", Temperature, 280.15, 302.15).when(T::DontCare, S::Summer),
            Ideal::site("gh1", Temperature, 280.15, 302.15).when(T::Day, S::Winter),
            Ideal::site("gh1", Temperature, 281.15, 283.15).when(T::Night, S::Winter),
            Ideal::site("gh1", Moisture, 10.0, 60.0),
            Ideal::site("gh1", Light, 0.0, 350.0),
            Ideal::site("gh2", Gas, 0.0, 1.0),
            Ideal::site("gh2", Humidity, 30.0, 40.0),
            Ideal::site("gh2", Temperature, 280.15, 291.15),
            Ideal::site("gh2", Moisture, 8.0, 53.0),
            Ideal::site("gh2", Light, 0.0, 350.0),
            Ideal::site("gh3", Gas, 0.0, 1.0),
            Ideal::site("gh3", Humidity, 30.0, 40.0),
            Ideal::site("gh3", Temperature, 285.15, 300.15),
            Ideal::site("gh3", Moisture, 10.0, 60.0),
            Ideal::site("gh3", Light, 0.0, 200.0),
            Ideal::zone("house", "store", Temperature, 283.0, 295.0),
            Ideal::zone("house", "store", Light, 0.0, 195.0).when(T::Day, S::DontCare),
            Ideal::zone("house", "store", Light, 0.0, 5.0).when(T::Night, S::DontCare),
            Ideal::zone("outside", "heap", Temperature, 290.0, 320.0),
            Ideal::zone("outside", "field", Temperature, 268.0, 305.0),
            Ideal::zone("outside", "field", Moisture, 65.0, 73.0),
        ])
    }
}

/// The entity an ideal is being resolved for, with the ancestry needed to fall back.
#[derive(Debug, Copy, Clone)]
pub enum ResolveScope<'a> {
    Site(&'a SiteId),
    Zone(&'a SiteId, &'a ZoneId),
    Device(&'a SiteId, &'a ZoneId, &'a DeviceId),
}

#[derive(Debug, Clone)]
pub struct IdealResolver {
    table: Arc<IdealTable>,
}

impl IdealResolver {
    pub fn new(table: Arc<IdealTable>) -> Self {
        IdealResolver { table }
    }

    /// First matching rule for the scope, falling back device → zone → site.
    pub fn resolve(&self, scope: ResolveScope<'_>, data_type: DataType, context: DayContext) -> Option<&Ideal> {
        match scope {
            ResolveScope::Site(site) => self.first_match(data_type, context, |s| {
                matches!(s, IdealScope::Site { site: rule_site } if rule_site == site)
            }),
            ResolveScope::Zone(site, zone) => self
                .first_match(data_type, context, |s| {
                    matches!(s, IdealScope::Zone { site: rule_site, zone: rule_zone }
                        if rule_site == site && rule_zone == zone)
                })
                .or_else(|| self.resolve(ResolveScope::Site(site), data_type, context)),
            ResolveScope::Device(site, zone, device) => self
                .first_match(data_type, context, |s| {
                    matches!(s, IdealScope::Device { device: rule_device } if rule_device == device)
                })
                .or_else(|| self.resolve(ResolveScope::Zone(site, zone), data_type, context)),
        }
    }

    fn first_match(
        &self,
        data_type: DataType,
        context: DayContext,
        scope_matches: impl Fn(&IdealScope) -> bool,
    ) -> Option<&Ideal> {
        self.table
            .rules
            .iter()
            .find(|rule| rule.data_type == data_type && scope_matches(&rule.scope) && rule.requirements_match(context))
    }
}
