use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::dashboard::stats::DashboardStats;
use crate::models::Equipment;

/// Keeps the last computed stats until the equipment list changes.
#[derive(Debug, Default)]
pub struct DashboardMemo {
    last: Option<(u64, Arc<DashboardStats>)>,
}

impl DashboardMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&mut self, records: &[Equipment]) -> Arc<DashboardStats> {
        let key = fingerprint(records);
        if let Some((cached_key, stats)) = &self.last {
            if *cached_key == key {
                return Arc::clone(stats);
            }
        }

        tracing::debug!(records = records.len(), "Recomputing dashboard stats");
        let stats = Arc::new(DashboardStats::from_records(records));
        self.last = Some((key, Arc::clone(&stats)));
        stats
    }

    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

fn fingerprint(records: &[Equipment]) -> u64 {
    let mut hasher = DefaultHasher::new();
    records.hash(&mut hasher);
    hasher.finish()
}
