//! Recovery orchestration
//!
//! A run discovers candidates, splits them by kind, and recovers them in
//! consecutive batches of `batch_restart_size`, one transaction per batch.
//! Flow node batches run first, then process batches, each kind in
//! discovery order. A failed batch is logged and abandoned; the next batch
//! is still attempted and nothing is retried before the next run.

use std::sync::Arc;

use crate::config::RecoveryConfig;
use crate::model::{ElementId, ElementKind, ElementToRecover};
use crate::observability::metrics::{
    CANDIDATES_LAST, RECOVERED_LAST, RECOVERED_TOTAL, RECOVERY_DURATION, RECOVERY_RUNS,
};
use crate::observability::{log_event, Event, LongTaskGuard, ObservationScope, RecoveryMetrics};
use crate::ports::TransactionRunner;

use super::discovery::CandidateDiscovery;
use super::errors::RecoveryResult;
use super::flow_node::FlowNodeRecoveryExecutor;
use super::monitor::{RecoveryMonitor, RecoveryMonitorFactory, RecoverySummary};
use super::process::ProcessRecoveryExecutor;

/// Greppable message logged when a flow node batch transaction fails
pub const FLOW_NODE_BATCH_FAILED: &str = "Some flow nodes failed to recover";
/// Greppable message logged when a process batch transaction fails
pub const PROCESS_BATCH_FAILED: &str = "Some processes failed to recover";

/// One complete recovery run; the seam the scheduler triggers
pub trait RecoveryRun: Send + Sync {
    fn recover_all_elements(&self) -> RecoveryResult<RecoverySummary>;
}

pub struct RecoveryOrchestrator {
    config: RecoveryConfig,
    discovery: CandidateDiscovery,
    flow_nodes: Arc<FlowNodeRecoveryExecutor>,
    processes: Arc<ProcessRecoveryExecutor>,
    transactions: Arc<dyn TransactionRunner>,
    monitors: Arc<dyn RecoveryMonitorFactory>,
    metrics: Arc<dyn RecoveryMetrics>,
}

impl RecoveryOrchestrator {
    pub fn new(
        config: RecoveryConfig,
        discovery: CandidateDiscovery,
        flow_nodes: Arc<FlowNodeRecoveryExecutor>,
        processes: Arc<ProcessRecoveryExecutor>,
        transactions: Arc<dyn TransactionRunner>,
        monitors: Arc<dyn RecoveryMonitorFactory>,
        metrics: Arc<dyn RecoveryMetrics>,
    ) -> Self {
        Self {
            config,
            discovery,
            flow_nodes,
            processes,
            transactions,
            monitors,
            metrics,
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Recover `elements` with a single monitor, then print its summary
    pub fn recover(&self, elements: &[ElementToRecover]) -> RecoverySummary {
        let (flow_nodes, processes): (Vec<ElementToRecover>, Vec<ElementToRecover>) = elements
            .iter()
            .partition(|element| element.kind == ElementKind::FlowNode);
        let flow_nodes: Vec<ElementId> = flow_nodes.iter().map(|e| e.id).collect();
        let processes: Vec<ElementId> = processes.iter().map(|e| e.id).collect();

        let mut monitor = self.monitors.start(elements.len());
        self.recover_batches(&mut monitor, ElementKind::FlowNode, &flow_nodes);
        self.recover_batches(&mut monitor, ElementKind::Process, &processes);
        monitor.print_summary()
    }

    fn recover_batches(&self, monitor: &mut RecoveryMonitor, kind: ElementKind, ids: &[ElementId]) {
        let batch_size = self.config.batch_restart_size.max(1);

        for (index, batch) in ids.chunks(batch_size).enumerate() {
            let checkpoint = monitor.counters();
            let result = self
                .transactions
                .execute_in_transaction(&mut || match kind {
                    ElementKind::FlowNode => self.flow_nodes.execute(monitor, batch),
                    ElementKind::Process => self.processes.execute(monitor, batch),
                });

            if let Err(e) = result {
                monitor.rollback_batch(checkpoint, batch.len());

                let message = match kind {
                    ElementKind::FlowNode => FLOW_NODE_BATCH_FAILED,
                    ElementKind::Process => PROCESS_BATCH_FAILED,
                };
                let index = index.to_string();
                let ids = batch
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                let reason = e.to_string();
                log_event(
                    Event::BatchFailed,
                    &[
                        ("message", message),
                        ("tenant", self.config.tenant.as_str()),
                        ("kind", kind.as_str()),
                        ("batch", index.as_str()),
                        ("ids", ids.as_str()),
                        ("code", e.code()),
                        ("reason", reason.as_str()),
                    ],
                );
            }
        }
    }

    fn publish_metrics(&self, summary: &RecoverySummary) {
        let tags = self.config.tags();
        self.metrics.increment_counter(RECOVERY_RUNS, &tags, 1);
        self.metrics
            .increment_counter(RECOVERED_TOTAL, &tags, summary.recovered() as u64);
        self.metrics
            .set_gauge(RECOVERED_LAST, &tags, summary.recovered() as u64);
        self.metrics
            .set_gauge(CANDIDATES_LAST, &tags, summary.total_candidates() as u64);
    }
}

impl RecoveryRun for RecoveryOrchestrator {
    /// Discover, recover and publish metrics.
    ///
    /// The duration timer is active for the whole call, discovery included,
    /// and is stopped however the call ends.
    fn recover_all_elements(&self) -> RecoveryResult<RecoverySummary> {
        let tags = self.config.tags();
        let _timer = LongTaskGuard::start(self.metrics.as_ref(), RECOVERY_DURATION, &tags);
        let scope = ObservationScope::with_fields("RECOVERY_RUN", &tags);

        let candidates = match self
            .discovery
            .discover(self.config.age_threshold(), self.config.discovery_page_size)
        {
            Ok(candidates) => candidates,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e);
            }
        };

        let summary = self.recover(&candidates);
        self.publish_metrics(&summary);

        let candidates = summary.total_candidates().to_string();
        let recovered = summary.recovered().to_string();
        scope.complete_with_fields(&[
            ("candidates", candidates.as_str()),
            ("recovered", recovered.as_str()),
        ]);
        Ok(summary)
    }
}
