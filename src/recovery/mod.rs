//! Crash and stall recovery
//!
//! Finds flow nodes and processes that stopped making progress (a node
//! crashed mid-work, a work item was lost) and re-registers the work that
//! drives them forward.
//!
//! # Run sequence (strict order)
//!
//! 1. Ask the cluster whether this node owns recovery
//! 2. Discover candidates older than the age threshold
//! 3. Recover flow node batches, then process batches, one transaction each
//! 4. Print the run summary and publish metrics
//!
//! # Guarantees
//!
//! - A failing element never stops its batch
//! - A failing batch never stops the run
//! - A failing run never stops the scheduler

mod discovery;
mod errors;
mod flow_node;
mod monitor;
mod on_demand;
mod orchestrator;
mod process;
mod restart;
mod scheduler;

#[cfg(test)]
pub(crate) mod fakes;

pub use discovery::CandidateDiscovery;
pub use errors::{RecoveryError, RecoveryResult};
pub use flow_node::{assess, should_be_recovered, FlowNodeRecoveryExecutor, Recoverability};
pub use monitor::{
    MonitorCounters, RecoveryMonitor, RecoveryMonitorFactory, RecoverySummary,
    TenantMonitorFactory,
};
pub use on_demand::{FlowNodeRedriver, RedriveReport};
pub use orchestrator::{
    RecoveryOrchestrator, RecoveryRun, FLOW_NODE_BATCH_FAILED, PROCESS_BATCH_FAILED,
};
pub use process::ProcessRecoveryExecutor;
pub use restart::{
    RecoverStaleElementsHandler, ResetMessageInstancesHandler, RestartPhase, RestartReport,
    TenantRestartHandler, TenantRestarter,
};
pub use scheduler::{RecoveryScheduler, TickOutcome};
