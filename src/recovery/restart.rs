//! Tenant restart sequence
//!
//! # Sequence (strict order)
//!
//! 1. Every handler's `before_services_start`, in registration order
//! 2. Engine services start (outside this module)
//! 3. Every handler's `after_services_start`, each in its own transaction
//!
//! A before-phase failure aborts the restart. An after-phase failure is
//! logged and the remaining handlers still run; whatever is left behind is
//! picked up by the periodic recovery.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::model::{ElementId, ElementKind, ElementToRecover};
use crate::observability::{log_event, Event, ObservationScope};
use crate::ports::{MessageInstanceStore, TransactionRunner};

use super::discovery::CandidateDiscovery;
use super::errors::{RecoveryError, RecoveryResult};
use super::flow_node::FlowNodeRecoveryExecutor;
use super::monitor::{MonitorCounters, RecoveryMonitor, RecoveryMonitorFactory};
use super::process::ProcessRecoveryExecutor;

/// A participant in the tenant restart
pub trait TenantRestartHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Runs before engine services start, outside any restart transaction
    fn before_services_start(&self) -> RecoveryResult<()>;

    /// Runs once services are up, inside a transaction of its own
    fn after_services_start(&self) -> RecoveryResult<()>;

    /// Runs after the after-phase transaction committed (`None`) or rolled
    /// back (`Some`). Not called when the after-phase never ran.
    fn after_transaction(&self, _failure: Option<&RecoveryError>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPhase {
    Stopped,
    ServicesStarting,
    Started,
}

/// Handlers whose after-phase committed or failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartReport {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
}

pub struct TenantRestarter {
    tenant: String,
    transactions: Arc<dyn TransactionRunner>,
    handlers: Vec<Arc<dyn TenantRestartHandler>>,
    phase: Mutex<RestartPhase>,
}

impl TenantRestarter {
    pub fn new(tenant: impl Into<String>, transactions: Arc<dyn TransactionRunner>) -> Self {
        Self {
            tenant: tenant.into(),
            transactions,
            handlers: Vec::new(),
            phase: Mutex::new(RestartPhase::Stopped),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn TenantRestartHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn phase(&self) -> RestartPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, phase: RestartPhase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    pub fn before_services_start(&self) -> RecoveryResult<()> {
        let scope = ObservationScope::with_fields(
            "TENANT_RESTART_PREPARE",
            &[("tenant", self.tenant.as_str())],
        );

        for handler in &self.handlers {
            if let Err(e) = handler.before_services_start() {
                let reason = e.to_string();
                self.log_handler_failure(handler.name(), "before_services_start", &e);
                scope.fail(&reason);
                return Err(RecoveryError::restart(handler.name(), reason));
            }
        }

        self.set_phase(RestartPhase::ServicesStarting);
        scope.complete();
        Ok(())
    }

    /// Run every after-phase, isolating failures per handler
    pub fn after_services_start(&self) -> RecoveryResult<RestartReport> {
        if self.phase() != RestartPhase::ServicesStarting {
            return Err(RecoveryError::restart(
                "tenant",
                "after_services_start requires a completed before_services_start",
            ));
        }

        let scope = ObservationScope::with_fields(
            "TENANT_RESTART",
            &[("tenant", self.tenant.as_str())],
        );
        let mut report = RestartReport::default();

        for handler in &self.handlers {
            let result = self
                .transactions
                .execute_in_transaction(&mut || handler.after_services_start());
            handler.after_transaction(result.as_ref().err());
            match result {
                Ok(()) => report.completed.push(handler.name().to_string()),
                Err(e) => {
                    self.log_handler_failure(handler.name(), "after_services_start", &e);
                    report.failed.push(handler.name().to_string());
                }
            }
        }

        self.set_phase(RestartPhase::Started);
        let failed = report.failed.len().to_string();
        scope.complete_with_fields(&[("failed_handlers", failed.as_str())]);
        Ok(report)
    }

    fn log_handler_failure(&self, handler: &str, phase: &str, err: &RecoveryError) {
        let reason = err.to_string();
        log_event(
            Event::RestartHandlerFailed,
            &[
                ("tenant", self.tenant.as_str()),
                ("handler", handler),
                ("phase", phase),
                ("code", err.code()),
                ("reason", reason.as_str()),
            ],
        );
    }
}

/// Puts message instances a crashed node was handling back in the pool
pub struct ResetMessageInstancesHandler {
    tenant: String,
    messages: Arc<dyn MessageInstanceStore>,
}

impl ResetMessageInstancesHandler {
    pub fn new(tenant: impl Into<String>, messages: Arc<dyn MessageInstanceStore>) -> Self {
        Self {
            tenant: tenant.into(),
            messages,
        }
    }
}

impl TenantRestartHandler for ResetMessageInstancesHandler {
    fn name(&self) -> &str {
        "reset_message_instances"
    }

    fn before_services_start(&self) -> RecoveryResult<()> {
        let reset = self.messages.reset_in_progress()?.to_string();
        log_event(
            Event::MessagesReset,
            &[("tenant", self.tenant.as_str()), ("count", reset.as_str())],
        );
        Ok(())
    }

    fn after_services_start(&self) -> RecoveryResult<()> {
        Ok(())
    }
}

/// Re-drives everything left pending when the tenant stopped.
///
/// Candidates are collected before services start, regardless of age, and
/// recovered once services are up. The list is consumed by the first
/// after-phase. The summary is printed once the transaction outcome is
/// known; a rollback counts every candidate as failed.
pub struct RecoverStaleElementsHandler {
    discovery: CandidateDiscovery,
    flow_nodes: Arc<FlowNodeRecoveryExecutor>,
    processes: Arc<ProcessRecoveryExecutor>,
    monitors: Arc<dyn RecoveryMonitorFactory>,
    page_size: usize,
    pending: Mutex<Option<Vec<ElementToRecover>>>,
    in_flight: Mutex<Option<InFlightRun>>,
}

struct InFlightRun {
    monitor: RecoveryMonitor,
    checkpoint: MonitorCounters,
    candidates: usize,
}

impl RecoverStaleElementsHandler {
    pub fn new(
        discovery: CandidateDiscovery,
        flow_nodes: Arc<FlowNodeRecoveryExecutor>,
        processes: Arc<ProcessRecoveryExecutor>,
        monitors: Arc<dyn RecoveryMonitorFactory>,
        page_size: usize,
    ) -> Self {
        Self {
            discovery,
            flow_nodes,
            processes,
            monitors,
            page_size,
            pending: Mutex::new(None),
            in_flight: Mutex::new(None),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map_or(0, Vec::len)
    }
}

impl TenantRestartHandler for RecoverStaleElementsHandler {
    fn name(&self) -> &str {
        "recover_stale_elements"
    }

    fn before_services_start(&self) -> RecoveryResult<()> {
        let elements = self.discovery.discover(Duration::ZERO, self.page_size)?;
        *self.pending.lock().unwrap_or_else(|e| e.into_inner()) = Some(elements);
        Ok(())
    }

    fn after_services_start(&self) -> RecoveryResult<()> {
        let elements = match self.pending.lock().unwrap_or_else(|e| e.into_inner()).take() {
            Some(elements) => elements,
            None => return Ok(()),
        };

        let ids_of = |kind: ElementKind| -> Vec<ElementId> {
            elements
                .iter()
                .filter(|e| e.kind == kind)
                .map(|e| e.id)
                .collect()
        };
        let flow_nodes = ids_of(ElementKind::FlowNode);
        let processes = ids_of(ElementKind::Process);

        let mut monitor = self.monitors.start(elements.len());
        let checkpoint = monitor.counters();
        let result = self
            .flow_nodes
            .execute(&mut monitor, &flow_nodes)
            .and_then(|()| self.processes.execute(&mut monitor, &processes));

        *self.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = Some(InFlightRun {
            monitor,
            checkpoint,
            candidates: elements.len(),
        });
        result
    }

    fn after_transaction(&self, failure: Option<&RecoveryError>) {
        let run = match self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).take() {
            Some(run) => run,
            None => return,
        };
        let mut monitor = run.monitor;
        if failure.is_some() {
            monitor.rollback_batch(run.checkpoint, run.candidates);
        }
        monitor.print_summary();
    }
}
