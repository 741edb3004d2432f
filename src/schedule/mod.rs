//! Periodic recovery timer
//!
//! Fires the recovery scheduler on a cron schedule. Each tick runs on the
//! blocking pool and is awaited before the next occurrence is computed, so
//! ticks never overlap.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::config::{ConfigError, ConfigResult};
use crate::observability::{log_event, Event};
use crate::recovery::RecoveryScheduler;

/// A parsed recovery cron expression (5 or 6 fields, seconds optional)
pub struct RecoverySchedule {
    expression: String,
    cron: Cron,
}

impl RecoverySchedule {
    pub fn parse(expression: &str) -> ConfigResult<Self> {
        let cron = Cron::new(expression)
            .with_seconds_optional()
            .parse()
            .map_err(|e| {
                ConfigError::invalid(format!("recovery_cron '{}': {}", expression, e))
            })?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `after`
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.find_next_occurrence(after, false).ok()
    }
}

impl fmt::Debug for RecoverySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoverySchedule")
            .field("expression", &self.expression)
            .finish()
    }
}

/// Handle on the running timer task
pub struct RecoveryTimer {
    tenant: String,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RecoveryTimer {
    /// Spawn the timer on the current tokio runtime
    pub fn spawn(scheduler: Arc<RecoveryScheduler>, schedule: RecoverySchedule) -> Self {
        let tenant = scheduler.tenant().to_string();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_timer(scheduler, schedule, shutdown_rx));
        Self {
            tenant,
            shutdown_tx,
            handle,
        }
    }

    /// Stop the timer, waiting for an in-flight tick to finish.
    ///
    /// Returns false when the timer task itself panicked or was cancelled.
    pub async fn shutdown(self) -> bool {
        let _ = self.shutdown_tx.send(true);
        match self.handle.await {
            Ok(()) => true,
            Err(e) => {
                log_aborted(&self.tenant, "RECOVERY_TIMER_ABORTED", &e);
                false
            }
        }
    }
}

async fn run_timer(
    scheduler: Arc<RecoveryScheduler>,
    schedule: RecoverySchedule,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let tenant = scheduler.tenant().to_string();
    log_event(
        Event::TimerStarted,
        &[
            ("tenant", tenant.as_str()),
            ("cron", schedule.expression()),
        ],
    );

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let now = Utc::now();
        let next = match schedule.next_after(&now) {
            Some(next) => next,
            None => break,
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        }

        let tick = scheduler.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || tick.trigger_recovery_all_elements()).await {
            log_aborted(&tenant, "RECOVERY_TICK_ABORTED", &e);
        }
    }

    log_event(Event::TimerStopped, &[("tenant", tenant.as_str())]);
}

fn log_aborted(tenant: &str, code: &str, err: &JoinError) {
    let reason = err.to_string();
    log_event(
        Event::TickFailed,
        &[
            ("tenant", tenant),
            ("code", code),
            ("reason", reason.as_str()),
        ],
    );
}
