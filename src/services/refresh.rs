use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::num::NonZeroUsize;
use std::thread;
use std::time::{Duration, Instant};

use crate::models::ideal::DayContext;
use crate::services::builder::{BuildError, SnapshotBuilder};
use crate::services::ideals::IdealResolver;
use crate::services::problems::detect;
use crate::services::store::{Snapshot, SnapshotStore};
use crate::source::TelemetrySource;

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub sites: usize,
    pub zones: usize,
    pub devices: usize,
    pub expected_devices: usize,
    pub problems: usize,
    pub elapsed: Duration,
}

/// One build → detect → publish pipeline over shared collaborators.
pub struct Refresher<'a> {
    source: &'a dyn TelemetrySource,
    resolver: &'a IdealResolver,
    store: &'a SnapshotStore,
    workers: NonZeroUsize,
}

impl<'a> Refresher<'a> {
    pub fn new(
        source: &'a dyn TelemetrySource,
        resolver: &'a IdealResolver,
        store: &'a SnapshotStore,
        workers: NonZeroUsize,
    ) -> Self {
        Refresher {
            source,
            resolver,
            store,
            workers,
        }
    }

    pub fn run_cycle(&self) -> Result<CycleReport, BuildError> {
        self.run_cycle_at(Utc::now(), DayContext::local_now())
    }

    /// A failed build leaves the published snapshot untouched. The store reports
    /// `updating` until the new snapshot is published or the cycle has failed.
    pub fn run_cycle_at(&self, now: DateTime<Utc>, context: DayContext) -> Result<CycleReport, BuildError> {
        self.store.set_updating(true);
        let result = self.build_and_publish(now, context);
        self.store.set_updating(false);
        result
    }

    fn build_and_publish(&self, now: DateTime<Utc>, context: DayContext) -> Result<CycleReport, BuildError> {
        let started = Instant::now();
        let generation = SnapshotBuilder::new(self.source, self.resolver, self.workers).build_at(now, context)?;

        let problems = detect(&generation, now);
        let report = CycleReport {
            sites: generation.sites().len(),
            zones: generation.zones().len(),
            devices: generation.devices().len(),
            expected_devices: generation.expected_devices,
            problems: problems.len(),
            elapsed: started.elapsed(),
        };
        if report.devices < report.expected_devices {
            warn!(
                "Refresh: publishing with {} of {} device(s)",
                report.devices, report.expected_devices
            );
        }
        self.store.publish(Snapshot {
            generation,
            problems,
            published_at: Utc::now(),
        });
        Ok(report)
    }

    pub fn run_loop(&self, interval: Duration) -> Result<(), String> {
        loop {
            let tick_start = Instant::now();

            match self.run_cycle() {
                Ok(report) => info!(
                    "Refresh: published {} site(s), {}/{} device(s), {} problem(s) in {:.2?}",
                    report.sites, report.devices, report.expected_devices, report.problems, report.elapsed
                ),
                Err(e) => error!("Refresh: cycle failed, keeping previous snapshot: {}", e),
            }

            // Maintain steady cadence; an overrun starts the next cycle immediately.
            let elapsed = tick_start.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            } else {
                warn!("Refresh: cycle overran the {}s interval", interval.as_secs());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ideals::IdealTable;
    use crate::models::shed::{DeviceDoc, DeviceId, DeviceIndexDoc, Resolution, SeriesDoc, SiteDoc};
    use crate::services::testing::{StaticSource, noon, noon_context};
    use crate::source::SourceError;
    use std::sync::{Arc, Mutex};

    #[test]
    fn failed_cycle_keeps_previous_snapshot() {
        let resolver = IdealResolver::new(Arc::new(IdealTable::greenhouse()));
        let store = SnapshotStore::new();
        let mut source = StaticSource::load("tests/data/network.json");
        let workers = NonZeroUsize::new(2).unwrap();

        let report = Refresher::new(&source, &resolver, &store, workers)
            .run_cycle_at(noon(), noon_context())
            .expect("first cycle");
        assert_eq!(report.devices, 4);
        assert_eq!(report.expected_devices, 6);
        let first = store.current().expect("published");
        assert_eq!(first.problems.len(), report.problems);
        assert!(!store.is_updating());

        source.fail_index = true;
        let failed = Refresher::new(&source, &resolver, &store, workers).run_cycle_at(noon(), noon_context());
        assert!(matches!(failed, Err(BuildError::DeviceIndex(_))));
        assert!(Arc::ptr_eq(&first, &store.current().unwrap()));
        assert!(!store.is_updating());
    }

    /// Records the store's `updating` flag whenever the builder asks for sites.
    struct ObservingSource<'s> {
        inner: StaticSource,
        store: &'s SnapshotStore,
        seen: Mutex<Vec<bool>>,
    }

    impl TelemetrySource for ObservingSource<'_> {
        fn list_sites(&self) -> Result<Vec<SiteDoc>, SourceError> {
            self.seen.lock().unwrap().push(self.store.is_updating());
            self.inner.list_sites()
        }

        fn list_device_ids_by_category(&self) -> Result<DeviceIndexDoc, SourceError> {
            self.inner.list_device_ids_by_category()
        }

        fn get_device(&self, id: &DeviceId) -> Result<DeviceDoc, SourceError> {
            self.inner.get_device(id)
        }

        fn get_device_series(&self, id: &DeviceId, resolution: Resolution) -> Result<SeriesDoc, SourceError> {
            self.inner.get_device_series(id, resolution)
        }
    }

    #[test]
    fn updating_spans_the_whole_cycle() {
        let resolver = IdealResolver::new(Arc::new(IdealTable::greenhouse()));
        let store = SnapshotStore::new();
        let mut source = ObservingSource {
            inner: StaticSource::load("tests/data/network.json"),
            store: &store,
            seen: Mutex::new(Vec::new()),
        };
        let workers = NonZeroUsize::new(2).unwrap();

        Refresher::new(&source, &resolver, &store, workers)
            .run_cycle_at(noon(), noon_context())
            .expect("cycle");
        assert!(!store.is_updating());

        source.inner.fail_index = true;
        let failed = Refresher::new(&source, &resolver, &store, workers).run_cycle_at(noon(), noon_context());
        assert!(failed.is_err());
        assert!(!store.is_updating());
        assert_eq!(*source.seen.lock().unwrap(), vec![true, true]);
    }

    #[test]
    fn fixture_network_problems() {
        let resolver = IdealResolver::new(Arc::new(IdealTable::greenhouse()));
        let store = SnapshotStore::new();
        let source = StaticSource::load("tests/data/network.json");
        Refresher::new(&source, &resolver, &store, NonZeroUsize::new(4).unwrap())
            .run_cycle_at(noon(), noon_context())
            .expect("cycle");

        let snapshot = store.current().unwrap();
        let messages: Vec<String> = snapshot.problems.iter().map(|p| p.message()).collect();
        assert_eq!(
            messages,
            vec![
                "Greenhouse 1 is not receiving valid moisture data.",
                "The Peppers in Greenhouse 1 is too cold.",
                "The device hasn't connected for at least five minutes.",
                "The device hasn't connected for at least five minutes.",
            ]
        );
    }
}
