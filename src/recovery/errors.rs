//! Recovery error types
//!
//! Error codes follow the `RECOVERY_*` naming used in log lines:
//! - per-element errors (hydration, state lookup, work registration) are
//!   logged and the element is skipped
//! - per-batch errors (transaction) abandon the batch only
//! - per-run errors (discovery) abort the run before any batch starts

use thiserror::Error;

use crate::model::{ElementId, ElementKind};

/// Result type for recovery operations
pub type RecoveryResult<T> = Result<T, RecoveryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveryError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ElementKind, id: ElementId },

    #[error("Unable to hydrate {kind} {id}: {reason}")]
    Hydration {
        kind: ElementKind,
        id: ElementId,
        reason: String,
    },

    #[error("Unknown flow node state {0}")]
    StateLookup(i32),

    #[error("Unable to register work for flow node {id}: {reason}")]
    WorkRegistration { id: ElementId, reason: String },

    #[error("Unable to register connectors for process {id}: {reason}")]
    ConnectorRegistration { id: ElementId, reason: String },

    #[error("Discovery of {kind} candidates failed: {reason}")]
    Discovery { kind: ElementKind, reason: String },

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Responsibility check failed: {0}")]
    Responsibility(String),

    #[error("Restart handler '{handler}' failed: {reason}")]
    Restart { handler: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecoveryError {
    pub fn hydration(kind: ElementKind, id: ElementId, reason: impl Into<String>) -> Self {
        RecoveryError::Hydration {
            kind,
            id,
            reason: reason.into(),
        }
    }

    pub fn work_registration(id: ElementId, reason: impl Into<String>) -> Self {
        RecoveryError::WorkRegistration {
            id,
            reason: reason.into(),
        }
    }

    pub fn discovery(kind: ElementKind, reason: impl Into<String>) -> Self {
        RecoveryError::Discovery {
            kind,
            reason: reason.into(),
        }
    }

    pub fn transaction(reason: impl Into<String>) -> Self {
        RecoveryError::Transaction(reason.into())
    }

    pub fn restart(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        RecoveryError::Restart {
            handler: handler.into(),
            reason: reason.into(),
        }
    }

    /// Stable code used in log lines
    pub fn code(&self) -> &'static str {
        match self {
            RecoveryError::NotFound { .. } => "RECOVERY_ELEMENT_NOT_FOUND",
            RecoveryError::Hydration { .. } => "RECOVERY_HYDRATION_FAILED",
            RecoveryError::StateLookup(_) => "RECOVERY_STATE_UNKNOWN",
            RecoveryError::WorkRegistration { .. } => "RECOVERY_WORK_REGISTRATION_FAILED",
            RecoveryError::ConnectorRegistration { .. } => {
                "RECOVERY_CONNECTOR_REGISTRATION_FAILED"
            }
            RecoveryError::Discovery { .. } => "RECOVERY_DISCOVERY_FAILED",
            RecoveryError::Transaction(_) => "RECOVERY_TRANSACTION_FAILED",
            RecoveryError::Responsibility(_) => "RECOVERY_RESPONSIBILITY_CHECK_FAILED",
            RecoveryError::Restart { .. } => "RECOVERY_RESTART_FAILED",
            RecoveryError::Internal(_) => "RECOVERY_INTERNAL",
        }
    }

    /// Errors scoped to a single element; the rest of the batch proceeds
    pub fn is_element_level(&self) -> bool {
        matches!(
            self,
            RecoveryError::NotFound { .. }
                | RecoveryError::Hydration { .. }
                | RecoveryError::StateLookup(_)
                | RecoveryError::WorkRegistration { .. }
                | RecoveryError::ConnectorRegistration { .. }
        )
    }
}
