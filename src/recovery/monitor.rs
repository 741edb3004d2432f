//! Per-run recovery bookkeeping

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::observability::{log_event, Event};

/// Counters of a single recovery run.
///
/// One monitor is started per run, mutated by the executors running in that
/// run's call stack, and summarized once at the end.
#[derive(Debug)]
pub struct RecoveryMonitor {
    run_id: Uuid,
    tenant: String,
    started_at: DateTime<Utc>,
    started: Instant,
    counters: MonitorCounters,
}

/// Raw counters, also used to roll back a batch whose transaction failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorCounters {
    pub total_candidates: usize,
    /// EXECUTE work registered
    pub executing: usize,
    /// FINISH work registered
    pub finishing: usize,
    pub not_executable: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// What a run did, as logged by `print_summary`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoverySummary {
    pub run_id: Uuid,
    pub tenant: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub counters: MonitorCounters,
}

impl RecoverySummary {
    pub fn recovered(&self) -> usize {
        self.counters.executing + self.counters.finishing
    }

    pub fn total_candidates(&self) -> usize {
        self.counters.total_candidates
    }
}

impl RecoveryMonitor {
    pub fn start(tenant: impl Into<String>, total_candidates: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tenant: tenant.into(),
            started_at: Utc::now(),
            started: Instant::now(),
            counters: MonitorCounters {
                total_candidates,
                ..MonitorCounters::default()
            },
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn total_candidates(&self) -> usize {
        self.counters.total_candidates
    }

    /// Elements for which work was registered
    pub fn recovered_count(&self) -> usize {
        self.counters.executing + self.counters.finishing
    }

    pub fn counters(&self) -> MonitorCounters {
        self.counters
    }

    pub fn increment_executing(&mut self) {
        self.counters.executing += 1;
    }

    pub fn add_executing(&mut self, count: usize) {
        self.counters.executing += count;
    }

    pub fn increment_finishing(&mut self) {
        self.counters.finishing += 1;
    }

    pub fn increment_not_executable(&mut self) {
        self.counters.not_executable += 1;
    }

    pub fn increment_not_found(&mut self) {
        self.counters.not_found += 1;
    }

    pub fn increment_failed(&mut self) {
        self.counters.failed += 1;
    }

    /// Discard what a rolled back batch counted and mark its elements failed
    pub fn rollback_batch(&mut self, checkpoint: MonitorCounters, batch_len: usize) {
        self.counters = checkpoint;
        self.counters.failed += batch_len;
    }

    pub fn summary(&self) -> RecoverySummary {
        RecoverySummary {
            run_id: self.run_id,
            tenant: self.tenant.clone(),
            started_at: self.started_at,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            counters: self.counters,
        }
    }

    pub fn print_summary(&self) -> RecoverySummary {
        let summary = self.summary();
        let c = &summary.counters;
        let run_id = summary.run_id.to_string();
        let candidates = c.total_candidates.to_string();
        let recovered = summary.recovered().to_string();
        let executing = c.executing.to_string();
        let finishing = c.finishing.to_string();
        let not_executable = c.not_executable.to_string();
        let not_found = c.not_found.to_string();
        let failed = c.failed.to_string();
        let elapsed_ms = summary.elapsed_ms.to_string();

        log_event(
            Event::Summary,
            &[
                ("tenant", summary.tenant.as_str()),
                ("run_id", run_id.as_str()),
                ("candidates", candidates.as_str()),
                ("recovered", recovered.as_str()),
                ("executing", executing.as_str()),
                ("finishing", finishing.as_str()),
                ("not_executable", not_executable.as_str()),
                ("not_found", not_found.as_str()),
                ("failed", failed.as_str()),
                ("elapsed_ms", elapsed_ms.as_str()),
            ],
        );
        summary
    }
}

/// Creates the monitor of each run
pub trait RecoveryMonitorFactory: Send + Sync {
    fn start(&self, total_candidates: usize) -> RecoveryMonitor;
}

/// Stamps every monitor with the configured tenant
#[derive(Debug, Clone)]
pub struct TenantMonitorFactory {
    tenant: String,
}

impl TenantMonitorFactory {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
        }
    }
}

impl RecoveryMonitorFactory for TenantMonitorFactory {
    fn start(&self, total_candidates: usize) -> RecoveryMonitor {
        RecoveryMonitor::start(self.tenant.clone(), total_candidates)
    }
}
