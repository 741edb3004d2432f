//! Process recovery
//!
//! For each stale process instance:
//! - a sub-process re-drives its caller call-activity, unless the caller
//!   failed (the sub-process then waits for manual intervention and is
//!   skipped entirely)
//! - an INITIALIZING process re-registers its ON_ENTER connectors
//! - a COMPLETING process re-registers its ON_FINISH connectors

use std::sync::Arc;

use crate::model::{
    ConnectorEvent, ElementId, ElementKind, ProcessInstance, ProcessState, WorkDescriptor,
    FAILED_ACTIVITY_STATE_ID,
};
use crate::observability::{log_event, Event};
use crate::ports::{ConnectorRegistrar, InstanceStore, WorkQueue};

use super::errors::RecoveryResult;
use super::flow_node::{log_element_failure, log_element_not_found};
use super::monitor::RecoveryMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessOutcome {
    /// Number of work items and connector registrations made
    Recovered(usize),
    NothingToDo,
    CallerFailed(ElementId),
    NotFound,
}

pub struct ProcessRecoveryExecutor {
    store: Arc<dyn InstanceStore>,
    work_queue: Arc<dyn WorkQueue>,
    connectors: Arc<dyn ConnectorRegistrar>,
    failed_activity_state_id: i32,
}

impl ProcessRecoveryExecutor {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        work_queue: Arc<dyn WorkQueue>,
        connectors: Arc<dyn ConnectorRegistrar>,
    ) -> Self {
        Self {
            store,
            work_queue,
            connectors,
            failed_activity_state_id: FAILED_ACTIVITY_STATE_ID,
        }
    }

    /// Override the state id that marks a caller activity as failed
    pub fn with_failed_activity_state_id(mut self, state_id: i32) -> Self {
        self.failed_activity_state_id = state_id;
        self
    }

    /// Recover every id of one batch, isolating failures per id
    pub fn execute(&self, monitor: &mut RecoveryMonitor, ids: &[ElementId]) -> RecoveryResult<()> {
        for &id in ids {
            match self.recover_one(monitor.tenant(), id) {
                Ok(ProcessOutcome::Recovered(count)) => monitor.add_executing(count),
                Ok(ProcessOutcome::NothingToDo) => monitor.increment_not_executable(),
                Ok(ProcessOutcome::CallerFailed(caller_id)) => {
                    let id = id.to_string();
                    let caller_id = caller_id.to_string();
                    log_event(
                        Event::CallerFailed,
                        &[
                            ("tenant", monitor.tenant()),
                            ("id", id.as_str()),
                            ("caller_id", caller_id.as_str()),
                        ],
                    );
                    monitor.increment_not_executable();
                }
                Ok(ProcessOutcome::NotFound) => {
                    log_element_not_found(monitor.tenant(), ElementKind::Process, id);
                    monitor.increment_not_found();
                }
                Err(e) => {
                    log_element_failure(monitor.tenant(), ElementKind::Process, id, &e);
                    monitor.increment_failed();
                }
            }
        }
        Ok(())
    }

    fn recover_one(&self, tenant: &str, id: ElementId) -> RecoveryResult<ProcessOutcome> {
        let process = match self.store.hydrate_process_instance(id)? {
            Some(process) => process,
            None => return Ok(ProcessOutcome::NotFound),
        };

        let mut registered = 0;

        if process.has_caller() {
            match self.store.hydrate_activity(process.caller_id)? {
                Some(caller) if caller.state_id == self.failed_activity_state_id => {
                    return Ok(ProcessOutcome::CallerFailed(caller.id));
                }
                Some(caller) => {
                    self.work_queue
                        .register_work(WorkDescriptor::execute_flow_node(caller.id))?;
                    registered += 1;
                }
                None => log_element_not_found(tenant, ElementKind::FlowNode, process.caller_id),
            }
        }

        if let Some(event) = connector_event_for(&process) {
            self.connectors
                .register_connectors_to_execute(&process, event)?;
            registered += 1;
        }

        if registered == 0 {
            Ok(ProcessOutcome::NothingToDo)
        } else {
            Ok(ProcessOutcome::Recovered(registered))
        }
    }
}

/// Connectors left pending by a process stuck in a transitional state
fn connector_event_for(process: &ProcessInstance) -> Option<ConnectorEvent> {
    match process.state() {
        ProcessState::Initializing => Some(ConnectorEvent::OnEnter),
        ProcessState::Completing => Some(ConnectorEvent::OnFinish),
        _ => None,
    }
}
