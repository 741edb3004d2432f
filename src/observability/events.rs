//! Observable recovery events
//!
//! Events are explicit and typed; the string form is what appears in the
//! `event` field of a log line.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Periodic recovery
    DiscoveryComplete,
    BatchFailed,
    Summary,

    // Per element
    ElementFailed,
    ElementNotFound,
    CallerFailed,

    // Scheduler
    NotResponsible,
    ResponsibilityCheckFailed,
    TickFailed,
    TimerStarted,
    TimerStopped,

    // Tenant restart
    RestartHandlerFailed,
    MessagesReset,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "RECOVERY_CONFIG_LOADED",
            Event::DiscoveryComplete => "RECOVERY_DISCOVERY_COMPLETE",
            Event::BatchFailed => "RECOVERY_BATCH_FAILED",
            Event::Summary => "RECOVERY_SUMMARY",

            Event::ElementFailed => "RECOVERY_ELEMENT_FAILED",
            Event::ElementNotFound => "RECOVERY_ELEMENT_NOT_FOUND",
            Event::CallerFailed => "RECOVERY_CALLER_FAILED",

            Event::NotResponsible => "RECOVERY_SKIPPED_NOT_RESPONSIBLE",
            Event::ResponsibilityCheckFailed => "RECOVERY_RESPONSIBILITY_CHECK_FAILED",
            Event::TickFailed => "RECOVERY_TICK_FAILED",
            Event::TimerStarted => "RECOVERY_TIMER_STARTED",
            Event::TimerStopped => "RECOVERY_TIMER_STOPPED",
            Event::RestartHandlerFailed => "TENANT_RESTART_HANDLER_FAILED",
            Event::MessagesReset => "MESSAGE_INSTANCES_RESET",
        }
    }

    /// Severity the event is logged at unless the caller overrides it
    pub fn severity(&self) -> Severity {
        match self {
            Event::BatchFailed
            | Event::ElementFailed
            | Event::ResponsibilityCheckFailed
            | Event::TickFailed
            | Event::RestartHandlerFailed => Severity::Error,
            Event::ElementNotFound | Event::CallerFailed => Severity::Warn,
            Event::NotResponsible => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
