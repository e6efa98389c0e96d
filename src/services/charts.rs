//! Chart read models: one table per resolution, one column per data type.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::graph::{Device, Generation, Scope};
use crate::models::shed::{DataType, Resolution};
use crate::services::units::{TemperatureUnit, display_value};
use crate::utils::round_to_nearest_minute;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub timestamp: DateTime<Utc>,
    /// Parallel to [`Chart::types`]; `None` where nothing was read near this time.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub name: String,
    pub resolution: Resolution,
    pub types: Vec<DataType>,
    /// Newest first.
    pub rows: Vec<ChartRow>,
}

impl Generation {
    pub fn charts(&self, scope: Scope, unit: TemperatureUnit) -> BTreeMap<Resolution, Chart> {
        Resolution::ALL
            .into_iter()
            .map(|resolution| (resolution, self.chart(scope, resolution, unit)))
            .collect()
    }

    pub fn chart(&self, scope: Scope, resolution: Resolution, unit: TemperatureUnit) -> Chart {
        let types = self.scope_data_types(scope);
        let devices: Vec<&Device> = self
            .devices_under(scope)
            .into_iter()
            .map(|d| self.device(d))
            .collect();

        let timestamps: BTreeSet<DateTime<Utc>> = devices
            .iter()
            .flat_map(|d| d.series.iter().filter(|s| s.resolution == resolution))
            .flat_map(|s| s.readings.iter().map(|r| round_to_nearest_minute(r.timestamp)))
            .collect();

        let rows = timestamps
            .into_iter()
            .rev()
            .filter_map(|ts| {
                let values: Vec<Option<f64>> = types
                    .iter()
                    .map(|t| {
                        let per_device = devices.iter().filter_map(|d| reading_near(d, *t, resolution, ts));
                        mean(per_device).map(|raw| display_value(*t, raw, unit))
                    })
                    .collect();
                values.iter().any(Option::is_some).then_some(ChartRow { timestamp: ts, values })
            })
            .collect();

        Chart {
            name: self.name_of(scope).to_string(),
            resolution,
            types,
            rows,
        }
    }
}

/// First reading strictly within the resolution's margin of `ts`.
fn reading_near(device: &Device, data_type: DataType, resolution: Resolution, ts: DateTime<Utc>) -> Option<f64> {
    let margin = resolution.margin();
    device
        .series_for(data_type, resolution)?
        .readings
        .iter()
        .find(|r| r.timestamp > ts - margin && r.timestamp < ts + margin)
        .map(|r| r.raw)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{GenerationFixture, noon};
    use chrono::TimeDelta;

    #[test]
    fn zone_chart_averages_devices_newest_first() {
        let mut fx = GenerationFixture::new();
        let site = fx.site("gh1", &[]);
        let zone = fx.zone(site, "1", &[]);
        fx.device(
            zone,
            "a",
            Some(0),
            &[(DataType::Humidity, &[(0, 30.0), (1, 32.0)]), (DataType::Temperature, &[(1, 293.15)])],
        );
        fx.device(zone, "b", Some(0), &[(DataType::Humidity, &[(0, 40.0)])]);
        let g = fx.generation;

        let chart = g.chart(Scope::Zone(zone), Resolution::EveryMinute, TemperatureUnit::Celsius);
        assert_eq!(chart.name, "Zone 1");
        assert_eq!(chart.types, vec![DataType::Temperature, DataType::Humidity]);
        assert_eq!(chart.rows.len(), 2);

        assert_eq!(chart.rows[0].timestamp, noon());
        assert_eq!(chart.rows[0].values, vec![None, Some(35.0)]);

        let older = &chart.rows[1];
        assert_eq!(older.timestamp, noon() - TimeDelta::minutes(1));
        assert!((older.values[0].unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(older.values[1], Some(32.0));

        let charts = g.charts(Scope::Site(site), TemperatureUnit::Kelvin);
        assert_eq!(charts.len(), 3);
        assert!(charts[&Resolution::EveryHour].rows.is_empty());
    }
}
