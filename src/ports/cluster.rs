//! Cluster coordination

use crate::recovery::RecoveryResult;

/// Best-effort leader election answer for the periodic recovery.
///
/// At most one node should answer `true` at a time, but nothing here
/// enforces it; downstream execution tolerates duplicate work.
pub trait ResponsibilityOracle: Send + Sync {
    fn is_responsible_for_recovery(&self) -> RecoveryResult<bool>;
}
