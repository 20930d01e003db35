//! Timing and statistics for graph discovery

use crate::model::ProvenanceCollection;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Named timers plus summary statistics for one discovery run.
///
/// Timers accumulate: start/stop pairs for the same name add up, so a
/// timer can track time spent inside a loop.
#[derive(Debug, Default)]
pub struct Fingerprint {
    running: HashMap<String, Instant>,
    totals: HashMap<String, Duration>,
    node_count: usize,
    edge_count: usize,
    npe_count: usize,
    actor_count: usize,
}

impl Fingerprint {
    pub fn new() -> Self {
        Fingerprint::default()
    }

    /// Start (or restart) a named timer.
    pub fn start_timer(&mut self, name: &str) {
        self.running.insert(name.to_string(), Instant::now());
    }

    /// Stop a named timer, accumulating its elapsed time. Stopping a timer
    /// that is not running is a no-op.
    pub fn stop_timer(&mut self, name: &str) {
        if let Some(started) = self.running.remove(name) {
            *self.totals.entry(name.to_string()).or_default() += started.elapsed();
        }
    }

    /// Total accumulated time for a named timer.
    pub fn total(&self, name: &str) -> Duration {
        self.totals.get(name).copied().unwrap_or_default()
    }

    /// Record the final shape of the discovered collection.
    pub fn finished(&mut self, col: &ProvenanceCollection) {
        self.node_count = col.count_nodes();
        self.edge_count = col.count_edges();
        self.npe_count = col.count_npes();
        self.actor_count = col.count_actors();
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn npe_count(&self) -> usize {
        self.npe_count
    }

    pub fn actor_count(&self) -> usize {
        self.actor_count
    }
}
