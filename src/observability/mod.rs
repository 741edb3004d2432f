//! Observability for the recovery engine
//!
//! - Structured logging (JSON, one line per event)
//! - Metrics behind the `RecoveryMetrics` port
//! - Begin/complete scopes for long operations
//!
//! Observability never changes recovery outcomes: logging swallows I/O
//! errors and metrics ignore lock poisoning.

mod events;
mod logger;
pub mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{LongTaskGuard, MetricsRegistry, MetricsSnapshot, RecoveryMetrics, TimerId};
pub use scope::ObservationScope;

#[cfg(test)]
pub(crate) use logger::capture;

/// Log an event at its default severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
