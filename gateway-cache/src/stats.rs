//! Hit/miss telemetry (`§4.2` "Telemetry").

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

const RESPONSE_TIME_SAMPLE_CAP: usize = 1000;

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    errors: u64,
}

/// Accumulates cache telemetry across the process lifetime. Every field
/// is behind its own lock so a `get` on one key never contends with a
/// `stats()` read of another's counters.
#[derive(Default)]
pub struct CacheStats {
    totals: Mutex<Counters>,
    by_endpoint: Mutex<HashMap<String, Counters>>,
    by_model: Mutex<HashMap<String, Counters>>,
    errors_by_type: Mutex<HashMap<String, u64>>,
    response_times: Mutex<VecDeque<Duration>>,
    started_at: std::time::Instant,
}

/// A point-in-time snapshot, the shape returned by `stats()`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub error_rate: f64,
    pub avg_response_time_ms: f64,
    pub requests_per_second: f64,
    pub top_endpoints: Vec<(String, u64)>,
    pub top_models: Vec<(String, u64)>,
    pub errors_by_type: HashMap<String, u64>,
}

impl CacheStats {
    pub fn new() -> Self {
        Self { started_at: std::time::Instant::now(), ..Default::default() }
    }

    pub fn record_hit(&self, endpoint: &str, model: Option<&str>, elapsed: Duration) {
        self.totals.lock().hits += 1;
        self.record_bucket(&self.by_endpoint, endpoint, |c| c.hits += 1);
        if let Some(model) = model {
            self.record_bucket(&self.by_model, model, |c| c.hits += 1);
        }
        self.record_response_time(elapsed);
    }

    pub fn record_miss(&self, endpoint: &str, model: Option<&str>, elapsed: Duration) {
        self.totals.lock().misses += 1;
        self.record_bucket(&self.by_endpoint, endpoint, |c| c.misses += 1);
        if let Some(model) = model {
            self.record_bucket(&self.by_model, model, |c| c.misses += 1);
        }
        self.record_response_time(elapsed);
    }

    pub fn record_error(&self, operation: &str, error_name: &str) {
        self.totals.lock().errors += 1;
        let mut by_type = self.errors_by_type.lock();
        *by_type.entry(format!("{operation}:{error_name}")).or_insert(0) += 1;
    }

    fn record_bucket(&self, table: &Mutex<HashMap<String, Counters>>, key: &str, f: impl FnOnce(&mut Counters)) {
        let mut table = table.lock();
        let entry = table.entry(key.to_string()).or_default();
        f(entry);
    }

    fn record_response_time(&self, elapsed: Duration) {
        let mut samples = self.response_times.lock();
        if samples.len() >= RESPONSE_TIME_SAMPLE_CAP {
            samples.pop_front();
        }
        samples.push_back(elapsed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let totals = self.totals.lock();
        let total_ops = totals.hits + totals.misses;
        let hit_rate = if total_ops > 0 { totals.hits as f64 / total_ops as f64 } else { 0.0 };
        let miss_rate = if total_ops > 0 { totals.misses as f64 / total_ops as f64 } else { 0.0 };
        let error_rate = if total_ops > 0 { totals.errors as f64 / total_ops as f64 } else { 0.0 };

        let samples = self.response_times.lock();
        let avg_response_time_ms = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|d| d.as_secs_f64() * 1000.0).sum::<f64>() / samples.len() as f64
        };

        let elapsed_secs = self.started_at.elapsed().as_secs_f64().max(1e-6);
        let requests_per_second = total_ops as f64 / elapsed_secs;

        StatsSnapshot {
            hits: totals.hits,
            misses: totals.misses,
            errors: totals.errors,
            hit_rate,
            miss_rate,
            error_rate,
            avg_response_time_ms,
            requests_per_second,
            top_endpoints: top_n(&self.by_endpoint.lock(), 10),
            top_models: top_n(&self.by_model.lock(), 10),
            errors_by_type: self.errors_by_type.lock().clone(),
        }
    }
}

fn top_n(table: &HashMap<String, Counters>, n: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> =
        table.iter().map(|(k, c)| (k.clone(), c.hits + c.misses)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_reflects_recorded_operations() {
        let stats = CacheStats::new();
        stats.record_hit("chat", Some("gpt-4o"), Duration::from_millis(5));
        stats.record_hit("chat", Some("gpt-4o"), Duration::from_millis(5));
        stats.record_miss("chat", Some("gpt-4o"), Duration::from_millis(5));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
        assert!((snapshot.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn errors_by_type_are_namespaced_by_operation() {
        let stats = CacheStats::new();
        stats.record_error("get", "BackendUnavailable");
        stats.record_error("get", "BackendUnavailable");
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.errors_by_type.get("get:BackendUnavailable"), Some(&2));
    }

    #[test]
    fn top_endpoints_ranks_by_total_traffic() {
        let stats = CacheStats::new();
        for _ in 0..5 {
            stats.record_hit("chat", None, Duration::from_millis(1));
        }
        stats.record_hit("embeddings", None, Duration::from_millis(1));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.top_endpoints[0].0, "chat");
    }
}
