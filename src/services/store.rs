//! The single published snapshot.
//!
//! Writers swap an `Arc` under a write lock held only for the assignment;
//! readers clone the `Arc` and never block each other or a build in progress.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::models::graph::Generation;
use crate::models::problem::Problem;

#[derive(Debug)]
pub struct Snapshot {
    pub generation: Generation,
    pub problems: Vec<Problem>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<Snapshot>>>,
    updating: AtomicBool,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest published snapshot, if any cycle has succeeded yet.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    /// Replace the published snapshot; returns the one it displaced.
    pub fn publish(&self, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.replace(next)
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    pub(crate) fn set_updating(&self, updating: bool) {
        self.updating.store(updating, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{GenerationFixture, noon};

    fn snapshot(site: &str) -> Snapshot {
        let mut fx = GenerationFixture::new();
        fx.site(site, &[]);
        Snapshot {
            generation: fx.generation,
            problems: Vec::new(),
            published_at: noon(),
        }
    }

    #[test]
    fn readers_keep_their_snapshot_across_publish() {
        let store = SnapshotStore::new();
        assert!(store.current().is_none());

        assert!(store.publish(snapshot("gh1")).is_none());
        let held = store.current().expect("published");

        let displaced = store.publish(snapshot("gh2")).expect("previous snapshot");
        assert!(Arc::ptr_eq(&held, &displaced));
        assert_eq!(held.generation.sites()[0].id.0, "gh1");
        assert_eq!(store.current().unwrap().generation.sites()[0].id.0, "gh2");
    }

    #[test]
    fn updating_flag() {
        let store = SnapshotStore::new();
        assert!(!store.is_updating());
        store.set_updating(true);
        assert!(store.is_updating());
    }
}
