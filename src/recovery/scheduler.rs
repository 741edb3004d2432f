//! Periodic recovery trigger
//!
//! Each tick first asks the cluster whether this node owns recovery, then
//! runs a full recovery. A tick never propagates a failure: errors and
//! panics are logged and the next tick starts from scratch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::observability::{log_event, Event};
use crate::ports::ResponsibilityOracle;

use super::monitor::RecoverySummary;
use super::orchestrator::RecoveryRun;

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Recovered(RecoverySummary),
    NotResponsible,
    ResponsibilityUnknown,
    Failed(String),
}

pub struct RecoveryScheduler {
    tenant: String,
    responsibility: Arc<dyn ResponsibilityOracle>,
    run: Arc<dyn RecoveryRun>,
}

impl RecoveryScheduler {
    pub fn new(
        tenant: impl Into<String>,
        responsibility: Arc<dyn ResponsibilityOracle>,
        run: Arc<dyn RecoveryRun>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            responsibility,
            run,
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn trigger_recovery_all_elements(&self) -> TickOutcome {
        match panic::catch_unwind(AssertUnwindSafe(|| self.tick())) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = format!("panicked: {}", panic_message(payload.as_ref()));
                self.log_tick_failure("RECOVERY_PANIC", &reason);
                TickOutcome::Failed(reason)
            }
        }
    }

    fn tick(&self) -> TickOutcome {
        match self.responsibility.is_responsible_for_recovery() {
            Ok(true) => {}
            Ok(false) => {
                log_event(Event::NotResponsible, &[("tenant", self.tenant.as_str())]);
                return TickOutcome::NotResponsible;
            }
            Err(e) => {
                let reason = e.to_string();
                log_event(
                    Event::ResponsibilityCheckFailed,
                    &[
                        ("tenant", self.tenant.as_str()),
                        ("code", e.code()),
                        ("reason", reason.as_str()),
                    ],
                );
                return TickOutcome::ResponsibilityUnknown;
            }
        }

        match self.run.recover_all_elements() {
            Ok(summary) => TickOutcome::Recovered(summary),
            Err(e) => {
                let reason = e.to_string();
                self.log_tick_failure(e.code(), &reason);
                TickOutcome::Failed(reason)
            }
        }
    }

    fn log_tick_failure(&self, code: &str, reason: &str) {
        log_event(
            Event::TickFailed,
            &[
                ("tenant", self.tenant.as_str()),
                ("code", code),
                ("reason", reason),
            ],
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
