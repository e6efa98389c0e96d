//! Derived statistics over a built generation.
//!
//! Everything here is a pure function of the generation and an explicit `now`,
//! so the same generation can be re-evaluated later without drifting.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::models::graph::{Generation, Scope};
use crate::models::ideal::Ideal;
use crate::models::problem::IdealStatus;
use crate::models::shed::DataType;

const LIVENESS_WINDOW_SECS: i64 = 5 * 60;

/// Readings and connections older than this are stale.
pub fn liveness_window() -> TimeDelta {
    TimeDelta::seconds(LIVENESS_WINDOW_SECS)
}

pub fn is_fresh(ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    ts >= now - liveness_window()
}

/// Population mean and standard deviation of a reading pool.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub sd: f64,
    pub count: usize,
}

impl Stats {
    pub fn of(values: &[f64]) -> Option<Stats> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Some(Stats {
            mean,
            sd: variance.sqrt(),
            count: values.len(),
        })
    }

    pub fn is_extreme(&self, value: f64, data_type: DataType) -> bool {
        let band = data_type.sd_multiplier() * self.sd;
        value > self.mean + band || value < self.mean - band
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct IdealRange {
    pub min: f64,
    pub max: f64,
}

/// One line of an entity's overview table. Values are normalized (Kelvin for
/// temperature); convert with [`crate::services::units`] for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub data_type: DataType,
    pub current: Option<f64>,
    pub mean: Option<f64>,
    pub sd: Option<f64>,
    pub ideal: Option<IdealRange>,
    pub status: IdealStatus,
    pub last_reading: Option<DateTime<Utc>>,
}

impl Generation {
    pub fn scope_serves(&self, scope: Scope, data_type: DataType) -> bool {
        self.devices_under(scope)
            .into_iter()
            .any(|d| self.device(d).serves(data_type))
    }

    pub fn scope_data_types(&self, scope: Scope) -> Vec<DataType> {
        DataType::ALL
            .into_iter()
            .filter(|t| self.scope_serves(scope, *t))
            .collect()
    }

    /// Average of the contributing children's fresh values. A site averages its
    /// zones, a zone its devices; children without a fresh reading are left out.
    pub fn current_value(&self, scope: Scope, data_type: DataType, now: DateTime<Utc>) -> Option<f64> {
        match scope {
            Scope::Device(r) => self
                .device(r)
                .latest_reading(data_type)
                .filter(|reading| is_fresh(reading.timestamp, now))
                .map(|reading| reading.raw),
            Scope::Zone(r) => average(
                self.zone(r)
                    .devices
                    .iter()
                    .filter_map(|d| self.current_value(Scope::Device(*d), data_type, now)),
            ),
            Scope::Site(r) => average(
                self.site(r)
                    .zones
                    .iter()
                    .filter_map(|z| self.current_value(Scope::Zone(*z), data_type, now)),
            ),
        }
    }

    /// Pooled over every device's de-duplicated readings under the scope.
    pub fn historical_stats(&self, scope: Scope, data_type: DataType) -> Option<Stats> {
        let pool: Vec<f64> = self
            .devices_under(scope)
            .into_iter()
            .flat_map(|d| self.device(d).all_readings(data_type))
            .map(|r| r.raw)
            .collect();
        Stats::of(&pool)
    }

    pub fn last_reading_time(&self, scope: Scope, data_type: DataType) -> Option<DateTime<Utc>> {
        self.devices_under(scope)
            .into_iter()
            .filter_map(|d| self.device(d).time_of_last_reading(data_type))
            .max()
    }

    pub fn ideal(&self, scope: Scope, data_type: DataType) -> Option<&Ideal> {
        self.ideals_of(scope).get(&data_type)
    }

    pub fn status(&self, scope: Scope, data_type: DataType, now: DateTime<Utc>) -> IdealStatus {
        if !self.scope_serves(scope, data_type) {
            return IdealStatus::DoesNotServe;
        }
        let Some(current) = self.current_value(scope, data_type, now) else {
            return IdealStatus::Late;
        };
        if let Some(stats) = self.historical_stats(scope, data_type)
            && stats.is_extreme(current, data_type)
        {
            return IdealStatus::Extreme;
        }
        match self.ideal(scope, data_type) {
            None => IdealStatus::Unknown,
            Some(ideal) if current > ideal.max => IdealStatus::Over,
            Some(ideal) if current < ideal.min => IdealStatus::Under,
            Some(_) => IdealStatus::Okay,
        }
    }

    pub fn is_okay(&self, scope: Scope, now: DateTime<Utc>) -> bool {
        DataType::ALL
            .into_iter()
            .all(|t| !self.status(scope, t, now).breaks_okay())
    }

    /// Rows for every data type the scope serves, in declaration order.
    pub fn summary(&self, scope: Scope, now: DateTime<Utc>) -> Vec<SummaryRow> {
        self.scope_data_types(scope)
            .into_iter()
            .map(|data_type| {
                let stats = self.historical_stats(scope, data_type);
                SummaryRow {
                    data_type,
                    current: self.current_value(scope, data_type, now),
                    mean: stats.map(|s| s.mean),
                    sd: stats.map(|s| s.sd),
                    ideal: self.ideal(scope, data_type).map(|i| IdealRange { min: i.min, max: i.max }),
                    status: self.status(scope, data_type, now),
                    last_reading: self.last_reading_time(scope, data_type),
                }
            })
            .collect()
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { None } else { Some(sum / n as f64) }
}
