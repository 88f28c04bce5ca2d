use crate::stores::registry::Registry;
use crate::utils::time::current_timestamp;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Metrics {
    pub registrations: AtomicU64,
    pub rejected_registrations: AtomicU64,
    pub queries: AtomicU64,
    pub query_misses: AtomicU64,
    pub start_time: i64,
}

#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub registrations: u64,
    pub rejected_registrations: u64,
    pub queries: u64,
    pub query_misses: u64,
    pub query_hit_rate: f64,
    pub tracked_files: usize,
    pub tracked_peers: usize,
    pub uptime_seconds: i64,
    pub requests_per_second: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            registrations: AtomicU64::new(0),
            rejected_registrations: AtomicU64::new(0),
            queries: AtomicU64::new(0),
            query_misses: AtomicU64::new(0),
            start_time: current_timestamp(),
        }
    }

    pub fn increment_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.rejected_registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_query_misses(&self) {
        self.query_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Collects counters plus registry sizes and derives hit rate,
    /// uptime and requests per second.
    pub fn get_snapshot(&self, registry: &Registry) -> MetricsSnapshot {
        let registrations = self.registrations.load(Ordering::Relaxed);
        let rejected_registrations = self.rejected_registrations.load(Ordering::Relaxed);
        let queries = self.queries.load(Ordering::Relaxed);
        let query_misses = self.query_misses.load(Ordering::Relaxed);

        let query_hit_rate = if queries > 0 {
            (queries.saturating_sub(query_misses) as f64 / queries as f64) * 100.0
        } else {
            0.0
        };

        let uptime_seconds = current_timestamp() - self.start_time;

        let total_requests = registrations + rejected_registrations + queries;
        let requests_per_second = if uptime_seconds > 0 {
            total_requests as f64 / uptime_seconds as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            registrations,
            rejected_registrations,
            queries,
            query_misses,
            query_hit_rate,
            tracked_files: registry.file_count(),
            tracked_peers: registry.total_peers(),
            uptime_seconds,
            requests_per_second,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    #[test]
    fn test_new_metrics() {
        let metrics = Metrics::new();

        assert_eq!(metrics.registrations.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.queries.load(Ordering::Relaxed), 0);
        assert!(metrics.start_time > 0);
    }

    #[test]
    fn test_get_snapshot_empty() {
        let metrics = Metrics::new();
        let registry = Registry::new();

        let snapshot = metrics.get_snapshot(&registry);

        assert_eq!(snapshot.registrations, 0);
        assert_eq!(snapshot.query_hit_rate, 0.0);
        assert_eq!(snapshot.tracked_files, 0);
        assert_eq!(snapshot.tracked_peers, 0);
        assert!(snapshot.uptime_seconds >= 0);
    }

    #[test]
    fn test_get_snapshot_with_data() {
        let metrics = Metrics::new();
        let registry = Registry::new();
        registry.register(HASH, "10.0.0.1:5001", 10, 4).unwrap();
        registry.register(HASH, "10.0.0.2:5001", 10, 4).unwrap();

        metrics.increment_registrations();
        metrics.increment_registrations();
        metrics.increment_rejected();
        for _ in 0..4 {
            metrics.increment_queries();
        }
        metrics.increment_query_misses();

        let snapshot = metrics.get_snapshot(&registry);

        assert_eq!(snapshot.registrations, 2);
        assert_eq!(snapshot.rejected_registrations, 1);
        assert_eq!(snapshot.queries, 4);
        assert_eq!(snapshot.query_misses, 1);
        assert_eq!(snapshot.query_hit_rate, 75.0);
        assert_eq!(snapshot.tracked_files, 1);
        assert_eq!(snapshot.tracked_peers, 2);
    }
}
