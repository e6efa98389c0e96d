//! Expected value ranges and the day/season context they are qualified by.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::models::shed::{DataType, DeviceId, SiteId, ZoneId};

const HOUR_DAY_START: u32 = 7;
const HOUR_DAY_END: u32 = 19;
const MONTH_SUMMER_START: u32 = 5;
const MONTH_SUMMER_END: u32 = 10;

/// Which entity an ideal rule is declared for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdealScope {
    Site { site: SiteId },
    Zone { site: SiteId, zone: ZoneId },
    Device { device: DeviceId },
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeCondition {
    #[default]
    DontCare,
    Day,
    Night,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonCondition {
    #[default]
    DontCare,
    Summer,
    Winter,
}

/// Time of day and season a generation was built under.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayContext {
    pub is_day: bool,
    pub is_summer: bool,
}

impl DayContext {
    /// Both bounds are exclusive: 07:xx is still night, 19:xx is night again,
    /// May and October are winter.
    pub fn at(hour: u32, month: u32) -> Self {
        DayContext {
            is_day: hour > HOUR_DAY_START && hour < HOUR_DAY_END,
            is_summer: month > MONTH_SUMMER_START && month < MONTH_SUMMER_END,
        }
    }

    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self::at(dt.hour(), dt.month())
    }

    pub fn local_now() -> Self {
        Self::from_datetime(&Local::now())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ideal {
    pub scope: IdealScope,
    pub data_type: DataType,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub time: TimeCondition,
    #[serde(default)]
    pub season: SeasonCondition,
}

impl Ideal {
    pub fn site(site: &str, data_type: DataType, min: f64, max: f64) -> Self {
        Ideal {
            scope: IdealScope::Site {
                site: SiteId(site.to_string()),
            },
            data_type,
            min,
            max,
            time: TimeCondition::DontCare,
            season: SeasonCondition::DontCare,
        }
    }

    pub fn zone(site: &str, zone: &str, data_type: DataType, min: f64, max: f64) -> Self {
        Ideal {
            scope: IdealScope::Zone {
                site: SiteId(site.to_string()),
                zone: ZoneId(zone.to_string()),
            },
            ..Self::site(site, data_type, min, max)
        }
    }

    pub fn device(device: &str, data_type: DataType, min: f64, max: f64) -> Self {
        Ideal {
            scope: IdealScope::Device {
                device: DeviceId(device.to_string()),
            },
            data_type,
            min,
            max,
            time: TimeCondition::DontCare,
            season: SeasonCondition::DontCare,
        }
    }

    pub fn when(mut self, time: TimeCondition, season: SeasonCondition) -> Self {
        self.time = time;
        self.season = season;
        self
    }

    pub fn requirements_match(&self, context: DayContext) -> bool {
        let time_ok = match self.time {
            TimeCondition::DontCare => true,
            TimeCondition::Day => context.is_day,
            TimeCondition::Night => !context.is_day,
        };
        let season_ok = match self.season {
            SeasonCondition::DontCare => true,
            SeasonCondition::Summer => context.is_summer,
            SeasonCondition::Winter => !context.is_summer,
        };
        time_ok && season_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn day_and_summer_bounds_are_exclusive() {
        assert!(!DayContext::at(7, 1).is_day);
        assert!(DayContext::at(8, 1).is_day);
        assert!(DayContext::at(18, 1).is_day);
        assert!(!DayContext::at(19, 1).is_day);

        assert!(!DayContext::at(12, 5).is_summer);
        assert!(DayContext::at(12, 6).is_summer);
        assert!(DayContext::at(12, 9).is_summer);
        assert!(!DayContext::at(12, 10).is_summer);
    }

    #[test]
    fn context_from_datetime_uses_its_own_clock() {
        let dt = Utc.with_ymd_and_hms(2024, 7, 3, 22, 15, 0).unwrap();
        assert_eq!(
            DayContext::from_datetime(&dt),
            DayContext {
                is_day: false,
                is_summer: true
            }
        );
    }

    #[test]
    fn conditions_filter_on_both_axes() {
        let rule = Ideal::site("gh1", DataType::Temperature, 281.15, 283.15)
            .when(TimeCondition::Night, SeasonCondition::Winter);
        assert!(rule.requirements_match(DayContext::at(2, 1)));
        assert!(!rule.requirements_match(DayContext::at(12, 1)));
        assert!(!rule.requirements_match(DayContext::at(2, 7)));

        let unconditional = Ideal::site("gh1", DataType::Gas, 0.0, 1.0);
        assert!(unconditional.requirements_match(DayContext::at(12, 7)));
    }

    #[test]
    fn ideal_rules_deserialize_with_default_conditions() {
        let json = r#"{"scope":{"kind":"zone","site":"house","zone":"store"},
            "data_type":"TEMPERATURE","min":283,"max":295}"#;
        let rule: Ideal = serde_json::from_str(json).expect("parse rule");
        assert_eq!(rule, Ideal::zone("house", "store", DataType::Temperature, 283.0, 295.0));
    }
}
