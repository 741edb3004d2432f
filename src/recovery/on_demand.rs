//! On-demand re-drive of flow nodes
//!
//! Used to push specific flow nodes forward immediately rather than waiting
//! for the periodic recovery. Runs inside the caller's transaction and
//! hydrates ids in its own sub-batches. Unlike the periodic recovery, a
//! gateway still waiting on branches is checked against its merge condition.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::RecoveryConfig;
use crate::model::{ElementId, ElementKind, FlowNodeInstance, ProcessDefinition};
use crate::ports::{
    FlowNodeStateOracle, GatewayMergeOracle, InstanceStore, ProcessDefinitionStore, WorkQueue,
};

use super::errors::RecoveryResult;
use super::flow_node::{assess, log_element_failure, work_for, Recoverability};

/// What an on-demand re-drive did with each id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedriveReport {
    pub executed: Vec<ElementId>,
    pub finished: Vec<ElementId>,
    pub not_executable: Vec<ElementId>,
    pub not_found: Vec<ElementId>,
    pub failed: Vec<ElementId>,
}

impl RedriveReport {
    pub fn registered(&self) -> usize {
        self.executed.len() + self.finished.len()
    }
}

pub struct FlowNodeRedriver {
    store: Arc<dyn InstanceStore>,
    states: Arc<dyn FlowNodeStateOracle>,
    definitions: Arc<dyn ProcessDefinitionStore>,
    merges: Arc<dyn GatewayMergeOracle>,
    work_queue: Arc<dyn WorkQueue>,
    batch_size: usize,
    tenant: String,
}

impl FlowNodeRedriver {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        states: Arc<dyn FlowNodeStateOracle>,
        definitions: Arc<dyn ProcessDefinitionStore>,
        merges: Arc<dyn GatewayMergeOracle>,
        work_queue: Arc<dyn WorkQueue>,
    ) -> Self {
        Self {
            store,
            states,
            definitions,
            merges,
            work_queue,
            batch_size: 100,
            tenant: "default".to_string(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    /// Tenant and sub-batch size from the recovery configuration
    pub fn with_config(self, config: &RecoveryConfig) -> Self {
        self.with_tenant(config.tenant.as_str())
            .with_batch_size(config.on_demand_batch_size)
    }

    /// Re-drive `ids`.
    ///
    /// A failing bulk hydration aborts the call; anything failing for a
    /// single flow node is logged and reported in `failed`.
    pub fn execute_flow_nodes(&self, ids: &[ElementId]) -> RecoveryResult<RedriveReport> {
        let mut report = RedriveReport::default();
        let mut definitions: HashMap<i64, ProcessDefinition> = HashMap::new();

        for chunk in ids.chunks(self.batch_size) {
            let instances = self.store.hydrate_flow_nodes(chunk)?;
            let found: HashSet<ElementId> = instances.iter().map(|i| i.id).collect();
            report
                .not_found
                .extend(chunk.iter().copied().filter(|id| !found.contains(id)));

            for instance in &instances {
                match self.redrive_one(instance, &mut definitions) {
                    Ok(Recoverability::Execute) => report.executed.push(instance.id),
                    Ok(Recoverability::Finish) => report.finished.push(instance.id),
                    Ok(_) => report.not_executable.push(instance.id),
                    Err(e) => {
                        log_element_failure(&self.tenant, ElementKind::FlowNode, instance.id, &e);
                        report.failed.push(instance.id);
                    }
                }
            }
        }

        Ok(report)
    }

    fn redrive_one(
        &self,
        instance: &FlowNodeInstance,
        definitions: &mut HashMap<i64, ProcessDefinition>,
    ) -> RecoveryResult<Recoverability> {
        let state = self.states.lookup(instance.state_id)?;
        let mut decision = assess(instance, &state);

        if decision == Recoverability::AwaitingMerge {
            let definition = match definitions.get(&instance.process_definition_id) {
                Some(definition) => definition.clone(),
                None => {
                    let loaded = self
                        .definitions
                        .process_definition(instance.process_definition_id)?;
                    definitions.insert(instance.process_definition_id, loaded.clone());
                    loaded
                }
            };
            decision = if self.merges.check_merging_condition(&definition, instance)? {
                Recoverability::Execute
            } else {
                Recoverability::NotExecutable
            };
        }

        if let Some(work) = work_for(instance.id, decision) {
            self.work_queue.register_work(work)?;
        }
        Ok(decision)
    }
}
