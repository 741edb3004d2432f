//! Interfaces the surrounding engine provides to the recovery engine
//!
//! Every collaborator is injected as `Arc<dyn Trait>` so executors and the
//! orchestrator can be exercised against in-memory fakes.

mod cluster;
mod engine;
mod persistence;

pub use cluster::ResponsibilityOracle;
pub use engine::{
    ConnectorRegistrar, FlowNodeStateOracle, GatewayMergeOracle, TransactionRunner, WorkQueue,
};
pub use persistence::{
    InstanceStore, MessageInstanceStore, PageRequest, ProcessDefinitionStore,
    RecoveryCandidateSource,
};
