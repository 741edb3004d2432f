//! ObservationScope for start/complete logging of long operations
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed
//! - Logs `{name}_INCOMPLETE` if dropped while still open

use std::time::Instant;

use super::logger::Logger;

/// ```ignore
/// let scope = ObservationScope::with_fields("RECOVERY_RUN", &[("tenant", "t1")]);
/// // ... do work ...
/// scope.complete_with_fields(&[("recovered", "4")]);
/// ```
///
/// Fields given at creation are repeated on every line the scope logs, and
/// closing lines carry an `elapsed_ms` field.
pub struct ObservationScope {
    name: String,
    fields: Vec<(String, String)>,
    started: Instant,
    closed: bool,
}

impl ObservationScope {
    pub fn new(name: &str) -> Self {
        Self::with_fields(name, &[])
    }

    pub fn with_fields(name: &str, fields: &[(&str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);

        Self {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            started: Instant::now(),
            closed: false,
        }
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.closed = true;
        let elapsed = self.elapsed_ms();
        let mut fields = self.field_refs();
        fields.extend(extra_fields.iter().copied());
        fields.push(("elapsed_ms", elapsed.as_str()));
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    /// Logs `{name}_FAILED` at ERROR level
    pub fn fail(mut self, reason: &str) {
        self.closed = true;
        let elapsed = self.elapsed_ms();
        let mut fields = self.field_refs();
        fields.push(("reason", reason));
        fields.push(("elapsed_ms", elapsed.as_str()));
        Logger::error(&format!("{}_FAILED", self.name), &fields);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    fn field_refs(&self) -> Vec<(&str, &str)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.closed {
            let mut fields = self.field_refs();
            fields.push(("reason", "scope dropped without completion"));
            Logger::warn(&format!("{}_INCOMPLETE", self.name), &fields);
        }
    }
}
