//! Metrics port and in-memory registry
//!
//! The recovery engine only talks to `RecoveryMetrics`. `MetricsRegistry`
//! is the in-process implementation: counters, gauges and long-task timers
//! keyed by name plus tags, safe to read while a run is in progress.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Number of recovery runs executed
pub const RECOVERY_RUNS: &str = "recovery.runs";
/// Elements recovered across all runs
pub const RECOVERED_TOTAL: &str = "recovery.recovered.total";
/// Elements recovered by the most recent run
pub const RECOVERED_LAST: &str = "recovery.recovered.last";
/// Candidates discovered by the most recent run
pub const CANDIDATES_LAST: &str = "recovery.candidates.last";
/// Long-task timer covering a whole run
pub const RECOVERY_DURATION: &str = "recovery.duration";

/// Handle of a started long-task timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Sink for recovery metrics
///
/// Metrics are identified by name plus tags; tag order does not matter.
pub trait RecoveryMetrics: Send + Sync {
    /// Add `amount` to a monotonic counter, creating it at zero
    fn increment_counter(&self, name: &str, tags: &[(&str, &str)], amount: u64);

    /// Overwrite a gauge with the latest value
    fn set_gauge(&self, name: &str, tags: &[(&str, &str)], value: u64);

    /// Start a long-task timer; it reports as active until stopped
    fn start_timer(&self, name: &str, tags: &[(&str, &str)]) -> TimerId;

    /// Stop a timer started by `start_timer`. Unknown ids are ignored.
    fn stop_timer(&self, id: TimerId);
}

/// Stops its long-task timer when dropped, whichever way the task ends
pub struct LongTaskGuard<'a> {
    metrics: &'a dyn RecoveryMetrics,
    id: TimerId,
}

impl<'a> LongTaskGuard<'a> {
    pub fn start(metrics: &'a dyn RecoveryMetrics, name: &str, tags: &[(&str, &str)]) -> Self {
        let id = metrics.start_timer(name, tags);
        Self { metrics, id }
    }
}

impl Drop for LongTaskGuard<'_> {
    fn drop(&mut self) {
        self.metrics.stop_timer(self.id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct MetricKey {
    name: String,
    tags: Vec<(String, String)>,
}

impl MetricKey {
    fn new(name: &str, tags: &[(&str, &str)]) -> Self {
        let mut tags: Vec<(String, String)> = tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        tags.sort();
        Self {
            name: name.to_string(),
            tags,
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.tags.is_empty() {
            let tags: Vec<String> = self.tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, "{{{}}}", tags.join(","))?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LongTasks {
    active: HashMap<TimerId, (MetricKey, Instant)>,
    completed: BTreeMap<MetricKey, (u64, Duration)>,
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<MetricKey, u64>>,
    gauges: RwLock<BTreeMap<MetricKey, u64>>,
    long_tasks: Mutex<LongTasks>,
    next_timer: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Lock poisoning is ignored
    fn long_tasks(&self) -> MutexGuard<'_, LongTasks> {
        self.long_tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current counter value, zero when never incremented
    pub fn counter(&self, name: &str, tags: &[(&str, &str)]) -> u64 {
        let key = MetricKey::new(name, tags);
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
        counters.get(&key).copied().unwrap_or(0)
    }

    /// Last value set, if any
    pub fn gauge(&self, name: &str, tags: &[(&str, &str)]) -> Option<u64> {
        let key = MetricKey::new(name, tags);
        let gauges = self.gauges.read().unwrap_or_else(|e| e.into_inner());
        gauges.get(&key).copied()
    }

    /// Number of long tasks currently running under this name and tags
    pub fn active_tasks(&self, name: &str, tags: &[(&str, &str)]) -> usize {
        let key = MetricKey::new(name, tags);
        self.long_tasks()
            .active
            .values()
            .filter(|(k, _)| *k == key)
            .count()
    }

    /// Number of long tasks that ran to completion
    pub fn completed_tasks(&self, name: &str, tags: &[(&str, &str)]) -> u64 {
        let key = MetricKey::new(name, tags);
        self.long_tasks()
            .completed
            .get(&key)
            .map(|(count, _)| *count)
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        let gauges = self
            .gauges
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();

        let tasks = self.long_tasks();
        let mut active_tasks: BTreeMap<String, usize> = BTreeMap::new();
        for (key, _) in tasks.active.values() {
            *active_tasks.entry(key.to_string()).or_default() += 1;
        }
        let completed_task_ms = tasks
            .completed
            .iter()
            .map(|(k, (_, total))| (k.to_string(), total.as_millis() as u64))
            .collect();

        MetricsSnapshot {
            counters,
            gauges,
            active_tasks,
            completed_task_ms,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl RecoveryMetrics for MetricsRegistry {
    fn increment_counter(&self, name: &str, tags: &[(&str, &str)], amount: u64) {
        let mut counters = self.counters.write().unwrap_or_else(|e| e.into_inner());
        *counters.entry(MetricKey::new(name, tags)).or_insert(0) += amount;
    }

    fn set_gauge(&self, name: &str, tags: &[(&str, &str)], value: u64) {
        let mut gauges = self.gauges.write().unwrap_or_else(|e| e.into_inner());
        gauges.insert(MetricKey::new(name, tags), value);
    }

    fn start_timer(&self, name: &str, tags: &[(&str, &str)]) -> TimerId {
        let id = TimerId(self.next_timer.fetch_add(1, Ordering::Relaxed));
        self.long_tasks()
            .active
            .insert(id, (MetricKey::new(name, tags), Instant::now()));
        id
    }

    fn stop_timer(&self, id: TimerId) {
        let mut tasks = self.long_tasks();
        if let Some((key, started)) = tasks.active.remove(&id) {
            let entry = tasks.completed.entry(key).or_insert((0, Duration::ZERO));
            entry.0 += 1;
            entry.1 += started.elapsed();
        }
    }
}

/// Point-in-time copy of every metric, keyed by `name{tag=value,...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
    pub active_tasks: BTreeMap<String, usize>,
    pub completed_task_ms: BTreeMap<String, u64>,
}
