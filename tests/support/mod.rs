//! In-memory process engine shared by the integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use flow_recovery::config::RecoveryConfig;
use flow_recovery::model::{
    ConnectorEvent, ElementId, FlowNodeInstance, FlowNodeState, ProcessDefinition,
    ProcessInstance, StateCategory, WorkDescriptor,
};
use flow_recovery::observability::MetricsRegistry;
use flow_recovery::ports::{
    ConnectorRegistrar, FlowNodeStateOracle, GatewayMergeOracle, InstanceStore,
    MessageInstanceStore, PageRequest, ProcessDefinitionStore, RecoveryCandidateSource,
    ResponsibilityOracle, TransactionRunner, WorkQueue,
};
use flow_recovery::recovery::{
    CandidateDiscovery, FlowNodeRecoveryExecutor, ProcessRecoveryExecutor, RecoveryError,
    RecoveryOrchestrator, RecoveryResult, TenantMonitorFactory,
};

pub const INITIALIZING: i32 = 0;
pub const READY: i32 = 1;
pub const COMPLETED: i32 = 2;
pub const FAILED: i32 = 3;
pub const WAITING_GATEWAY: i32 = 61;

#[derive(Default)]
struct Tables {
    flow_nodes: BTreeMap<ElementId, FlowNodeInstance>,
    processes: BTreeMap<ElementId, ProcessInstance>,
    stale_flow_nodes: Vec<ElementId>,
    stale_processes: Vec<ElementId>,
    in_progress_messages: usize,
    merge_ready: HashSet<ElementId>,

    responsible: bool,
    failing_commits: HashSet<usize>,
    transactions: usize,

    in_transaction: bool,
    staged_work: Vec<WorkDescriptor>,
    staged_connectors: Vec<(ElementId, ConnectorEvent)>,
    work: Vec<WorkDescriptor>,
    connectors: Vec<(ElementId, ConnectorEvent)>,
}

/// Stores, queues and transactions of one engine node
pub struct InMemoryEngine {
    tables: Mutex<Tables>,
}

impl InMemoryEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tables: Mutex::new(Tables {
                responsible: true,
                ..Tables::default()
            }),
        })
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    /// A flow node the crashed node left behind
    pub fn leave_flow_node(&self, instance: FlowNodeInstance) {
        let mut tables = self.tables();
        tables.stale_flow_nodes.push(instance.id);
        tables.flow_nodes.insert(instance.id, instance);
    }

    /// A flow node that exists but is not stale
    pub fn store_flow_node(&self, instance: FlowNodeInstance) {
        self.tables().flow_nodes.insert(instance.id, instance);
    }

    pub fn leave_process(&self, process: ProcessInstance) {
        let mut tables = self.tables();
        tables.stale_processes.push(process.id);
        tables.processes.insert(process.id, process);
    }

    pub fn set_in_progress_messages(&self, count: usize) {
        self.tables().in_progress_messages = count;
    }

    pub fn set_merge_ready(&self, gateway: ElementId) {
        self.tables().merge_ready.insert(gateway);
    }

    pub fn set_responsible(&self, responsible: bool) {
        self.tables().responsible = responsible;
    }

    /// Make the commit of the `call`-th transaction (1-based) fail
    pub fn fail_commit(&self, call: usize) {
        self.tables().failing_commits.insert(call);
    }

    pub fn transactions(&self) -> usize {
        self.tables().transactions
    }

    pub fn in_progress_messages(&self) -> usize {
        self.tables().in_progress_messages
    }

    pub fn work(&self) -> Vec<WorkDescriptor> {
        self.tables().work.clone()
    }

    pub fn connectors(&self) -> Vec<(ElementId, ConnectorEvent)> {
        self.tables().connectors.clone()
    }
}

impl RecoveryCandidateSource for InMemoryEngine {
    fn flow_node_ids_to_recover(&self, _older_than: Duration, page: PageRequest) -> RecoveryResult<Vec<ElementId>> {
        let tables = self.tables();
        Ok(tables.stale_flow_nodes.iter().skip(page.offset()).take(page.size).copied().collect())
    }

    fn process_ids_to_recover(&self, _older_than: Duration, page: PageRequest) -> RecoveryResult<Vec<ElementId>> {
        let tables = self.tables();
        Ok(tables.stale_processes.iter().skip(page.offset()).take(page.size).copied().collect())
    }
}

impl InstanceStore for InMemoryEngine {
    fn hydrate_flow_node(&self, id: ElementId) -> RecoveryResult<Option<FlowNodeInstance>> {
        Ok(self.tables().flow_nodes.get(&id).cloned())
    }

    fn hydrate_process_instance(&self, id: ElementId) -> RecoveryResult<Option<ProcessInstance>> {
        Ok(self.tables().processes.get(&id).cloned())
    }

    fn hydrate_activity(&self, id: ElementId) -> RecoveryResult<Option<FlowNodeInstance>> {
        Ok(self.tables().flow_nodes.get(&id).cloned())
    }
}

impl ProcessDefinitionStore for InMemoryEngine {
    fn process_definition(&self, id: i64) -> RecoveryResult<ProcessDefinition> {
        Ok(ProcessDefinition {
            id,
            name: "order-fulfilment".to_string(),
            version: "3".to_string(),
        })
    }
}

impl FlowNodeStateOracle for InMemoryEngine {
    fn lookup(&self, state_id: i32) -> RecoveryResult<FlowNodeState> {
        let state = match state_id {
            INITIALIZING => FlowNodeState::new(state_id, "initializing", false, false, StateCategory::Normal),
            READY => FlowNodeState::new(state_id, "ready", true, false, StateCategory::Normal),
            COMPLETED => FlowNodeState::new(state_id, "completed", true, true, StateCategory::Normal),
            FAILED => FlowNodeState::new(state_id, "failed", true, false, StateCategory::Normal),
            WAITING_GATEWAY => FlowNodeState::new(state_id, "waiting", true, false, StateCategory::Normal),
            other => return Err(RecoveryError::StateLookup(other)),
        };
        Ok(state)
    }
}

impl GatewayMergeOracle for InMemoryEngine {
    fn check_merging_condition(&self, _definition: &ProcessDefinition, gateway: &FlowNodeInstance) -> RecoveryResult<bool> {
        Ok(self.tables().merge_ready.contains(&gateway.id))
    }
}

impl WorkQueue for InMemoryEngine {
    fn register_work(&self, work: WorkDescriptor) -> RecoveryResult<()> {
        let mut tables = self.tables();
        if tables.in_transaction {
            tables.staged_work.push(work);
        } else {
            tables.work.push(work);
        }
        Ok(())
    }
}

impl ConnectorRegistrar for InMemoryEngine {
    fn register_connectors_to_execute(&self, process: &ProcessInstance, event: ConnectorEvent) -> RecoveryResult<()> {
        let mut tables = self.tables();
        if tables.in_transaction {
            tables.staged_connectors.push((process.id, event));
        } else {
            tables.connectors.push((process.id, event));
        }
        Ok(())
    }
}

impl TransactionRunner for InMemoryEngine {
    fn execute_in_transaction(&self, work: &mut dyn FnMut() -> RecoveryResult<()>) -> RecoveryResult<()> {
        let call = {
            let mut tables = self.tables();
            tables.transactions += 1;
            tables.in_transaction = true;
            tables.transactions
        };

        let result = work();

        let mut tables = self.tables();
        tables.in_transaction = false;
        let staged_work = std::mem::take(&mut tables.staged_work);
        let staged_connectors = std::mem::take(&mut tables.staged_connectors);
        result?;
        if tables.failing_commits.contains(&call) {
            return Err(RecoveryError::transaction("serialization failure"));
        }
        tables.work.extend(staged_work);
        tables.connectors.extend(staged_connectors);
        Ok(())
    }
}

impl ResponsibilityOracle for InMemoryEngine {
    fn is_responsible_for_recovery(&self) -> RecoveryResult<bool> {
        Ok(self.tables().responsible)
    }
}

impl MessageInstanceStore for InMemoryEngine {
    fn reset_in_progress(&self) -> RecoveryResult<usize> {
        Ok(std::mem::take(&mut self.tables().in_progress_messages))
    }
}

pub fn flow_node_executor(engine: &Arc<InMemoryEngine>) -> Arc<FlowNodeRecoveryExecutor> {
    Arc::new(FlowNodeRecoveryExecutor::new(engine.clone(), engine.clone(), engine.clone()))
}

pub fn process_executor(engine: &Arc<InMemoryEngine>) -> Arc<ProcessRecoveryExecutor> {
    Arc::new(ProcessRecoveryExecutor::new(engine.clone(), engine.clone(), engine.clone()))
}

/// Wire an orchestrator over `engine` the way a tenant would at startup
pub fn orchestrator(
    engine: &Arc<InMemoryEngine>,
    config: RecoveryConfig,
    metrics: &Arc<MetricsRegistry>,
) -> RecoveryOrchestrator {
    let tenant = config.tenant.clone();
    RecoveryOrchestrator::new(
        config,
        CandidateDiscovery::new(engine.clone(), tenant.as_str()),
        flow_node_executor(engine),
        process_executor(engine),
        engine.clone(),
        Arc::new(TenantMonitorFactory::new(tenant)),
        metrics.clone(),
    )
}
