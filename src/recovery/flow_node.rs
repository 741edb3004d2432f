//! Flow node recovery
//!
//! Decides for each stale flow node whether work must be re-registered:
//!
//! - terminal state: FINISH work
//! - gateway: EXECUTE when the merge was already flagged (`FINISH:` in
//!   `hit_bys`) or an abort/cancel is pending
//! - any other node: EXECUTE when its current state is not stable, or when
//!   the category of that state differs from the category persisted on the
//!   instance (an interruption was requested but not yet executed)
//! - otherwise nothing

use std::sync::Arc;

use crate::model::{ElementId, ElementKind, FlowNodeInstance, FlowNodeState, WorkDescriptor};
use crate::observability::{log_event, Event};
use crate::ports::{FlowNodeStateOracle, InstanceStore, WorkQueue};

use super::errors::{RecoveryError, RecoveryResult};
use super::monitor::RecoveryMonitor;

/// Outcome of inspecting one flow node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recoverability {
    /// Terminal: its completion must be (re)driven
    Finish,
    /// Mid-flight: its execution must be (re)driven
    Execute,
    /// Resting in a stable state, nothing pending
    NotExecutable,
    /// Gateway still waiting on branches; only a merge check can tell
    AwaitingMerge,
}

/// Generic rule for non-gateway flow nodes in a non-terminal state
pub fn should_be_recovered(instance: &FlowNodeInstance, state: &FlowNodeState) -> bool {
    !state.is_stable() || state.state_category() != instance.state_category
}

/// Classify `instance` against the current descriptor of its state
pub fn assess(instance: &FlowNodeInstance, state: &FlowNodeState) -> Recoverability {
    if state.is_terminal() {
        return Recoverability::Finish;
    }
    match instance.gateway() {
        Some(gateway) => {
            if gateway.is_flagged_finished() || instance.state_category.is_interrupting() {
                Recoverability::Execute
            } else {
                Recoverability::AwaitingMerge
            }
        }
        None if should_be_recovered(instance, state) => Recoverability::Execute,
        None => Recoverability::NotExecutable,
    }
}

/// Work to register for a decided flow node, if any
pub(crate) fn work_for(id: ElementId, decision: Recoverability) -> Option<WorkDescriptor> {
    match decision {
        Recoverability::Finish => Some(WorkDescriptor::finish_flow_node(id)),
        Recoverability::Execute => Some(WorkDescriptor::execute_flow_node(id)),
        Recoverability::NotExecutable | Recoverability::AwaitingMerge => None,
    }
}

pub(crate) fn log_element_failure(tenant: &str, kind: ElementKind, id: ElementId, err: &RecoveryError) {
    let id = id.to_string();
    let reason = err.to_string();
    log_event(
        Event::ElementFailed,
        &[
            ("tenant", tenant),
            ("kind", kind.as_str()),
            ("id", id.as_str()),
            ("code", err.code()),
            ("reason", reason.as_str()),
        ],
    );
}

pub(crate) fn log_element_not_found(tenant: &str, kind: ElementKind, id: ElementId) {
    let id = id.to_string();
    log_event(
        Event::ElementNotFound,
        &[("tenant", tenant), ("kind", kind.as_str()), ("id", id.as_str())],
    );
}

/// Re-registers work for stale flow nodes during a recovery run
pub struct FlowNodeRecoveryExecutor {
    store: Arc<dyn InstanceStore>,
    states: Arc<dyn FlowNodeStateOracle>,
    work_queue: Arc<dyn WorkQueue>,
}

impl FlowNodeRecoveryExecutor {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        states: Arc<dyn FlowNodeStateOracle>,
        work_queue: Arc<dyn WorkQueue>,
    ) -> Self {
        Self {
            store,
            states,
            work_queue,
        }
    }

    /// Recover every id of one batch.
    ///
    /// Failures are isolated per id: they are logged, counted as failed on
    /// the monitor, and the next id is processed.
    pub fn execute(&self, monitor: &mut RecoveryMonitor, ids: &[ElementId]) -> RecoveryResult<()> {
        for &id in ids {
            match self.recover_one(id) {
                Ok(Some(Recoverability::Finish)) => monitor.increment_finishing(),
                Ok(Some(Recoverability::Execute)) => monitor.increment_executing(),
                Ok(Some(_)) => monitor.increment_not_executable(),
                Ok(None) => {
                    log_element_not_found(monitor.tenant(), ElementKind::FlowNode, id);
                    monitor.increment_not_found();
                }
                Err(e) => {
                    log_element_failure(monitor.tenant(), ElementKind::FlowNode, id, &e);
                    monitor.increment_failed();
                }
            }
        }
        Ok(())
    }

    /// `Ok(None)` when the flow node no longer exists
    fn recover_one(&self, id: ElementId) -> RecoveryResult<Option<Recoverability>> {
        let instance = match self.store.hydrate_flow_node(id)? {
            Some(instance) => instance,
            None => return Ok(None),
        };
        // Always a fresh lookup: the state may have moved since discovery
        let state = self.states.lookup(instance.state_id)?;
        let decision = assess(&instance, &state);

        if let Some(work) = work_for(instance.id, decision) {
            self.work_queue.register_work(work)?;
        }
        Ok(Some(decision))
    }
}
