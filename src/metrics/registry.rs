use std::sync::Arc;

use dashmap::DashMap;

use crate::error::MetricsError;

use super::counter::{IntervalCounter, Stats};

/// Creates and indexes interval counters by name.
///
/// All operations are safe under arbitrary concurrency; get-or-create
/// relies on the map's entry API so exactly one counter is ever
/// constructed per name, no matter how many first-time callers race.
#[derive(Default)]
pub struct CounterRegistry {
    counters: DashMap<String, Arc<IntervalCounter>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter registered under `name`, creating it on
    /// first request. Concurrent first-time callers all receive the
    /// same instance.
    pub fn get_or_create(&self, name: &str) -> Arc<IntervalCounter> {
        self.counters
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(IntervalCounter::new(name)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<IntervalCounter>> {
        self.counters.get(name).map(|entry| entry.clone())
    }

    /// Names currently registered. A loose snapshot: inserts and
    /// removals racing with the enumeration may or may not be visible.
    pub fn names(&self) -> Vec<String> {
        self.counters.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drops `name` from the registry. Removing an unknown (or already
    /// removed) name is harmless; disposal races are expected.
    pub fn remove(&self, name: &str) {
        if self.counters.remove(name).is_none() {
            tracing::debug!(name, "remove of unregistered counter ignored");
        }
    }

    /// Pulls an interval snapshot from the counter registered under
    /// `name`.
    pub fn stats(&self, name: &str) -> Result<Stats, MetricsError> {
        match self.counters.get(name) {
            Some(counter) => Ok(counter.snapshot()),
            None => Err(MetricsError::NotFound(name.to_owned())),
        }
    }
}
