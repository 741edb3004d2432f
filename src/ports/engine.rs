//! Engine services the recovery engine drives

use crate::model::{
    ConnectorEvent, FlowNodeInstance, FlowNodeState, ProcessDefinition, ProcessInstance,
    WorkDescriptor,
};
use crate::recovery::RecoveryResult;

/// Maps a persisted state id to its descriptor
pub trait FlowNodeStateOracle: Send + Sync {
    fn lookup(&self, state_id: i32) -> RecoveryResult<FlowNodeState>;
}

pub trait GatewayMergeOracle: Send + Sync {
    /// Whether enough incoming branches arrived for `gateway` to proceed
    fn check_merging_condition(
        &self,
        definition: &ProcessDefinition,
        gateway: &FlowNodeInstance,
    ) -> RecoveryResult<bool>;
}

pub trait WorkQueue: Send + Sync {
    fn register_work(&self, work: WorkDescriptor) -> RecoveryResult<()>;
}

pub trait ConnectorRegistrar: Send + Sync {
    fn register_connectors_to_execute(
        &self,
        process: &ProcessInstance,
        event: ConnectorEvent,
    ) -> RecoveryResult<()>;
}

/// Runs `work` in a transaction: committed when it returns `Ok`, rolled back otherwise.
///
/// A commit failure is reported as an error just like a failure of `work`.
pub trait TransactionRunner: Send + Sync {
    fn execute_in_transaction(
        &self,
        work: &mut dyn FnMut() -> RecoveryResult<()>,
    ) -> RecoveryResult<()>;
}
