//! In-memory engine backing the recovery unit tests
//!
//! Implements every port over one shared state. Work and connector
//! registrations made inside `execute_in_transaction` stay pending until
//! the transaction commits and are dropped on rollback.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::model::{
    ConnectorEvent, ElementId, ElementKind, FlowNodeInstance, FlowNodeState, ProcessDefinition,
    ProcessInstance, StateCategory, WorkDescriptor,
};
use crate::ports::{
    ConnectorRegistrar, FlowNodeStateOracle, GatewayMergeOracle, InstanceStore,
    MessageInstanceStore, PageRequest, ProcessDefinitionStore, RecoveryCandidateSource,
    ResponsibilityOracle, TransactionRunner, WorkQueue,
};

use super::errors::{RecoveryError, RecoveryResult};
use super::monitor::{RecoveryMonitor, RecoveryMonitorFactory};

pub const INITIALIZING: i32 = 0;
pub const COMPLETED: i32 = 2;
pub const FAILED: i32 = 3;
pub const READY: i32 = 4;
pub const WAITING_GATEWAY: i32 = 61;

/// How a scripted transaction fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxFailure {
    /// Cannot begin: the work never runs
    BeforeWork,
    /// The work runs, then the commit fails
    OnCommit,
}

type TransactionHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct EngineState {
    states: HashMap<i32, FlowNodeState>,
    flow_nodes: BTreeMap<ElementId, FlowNodeInstance>,
    processes: BTreeMap<ElementId, ProcessInstance>,
    stale_flow_nodes: Vec<ElementId>,
    stale_processes: Vec<ElementId>,

    failing_hydrations: HashSet<ElementId>,
    failing_work: HashSet<ElementId>,
    failing_discovery: Option<ElementKind>,
    ready_merges: HashSet<ElementId>,
    failing_transactions: HashMap<usize, TxFailure>,

    in_transaction: bool,
    pending_work: Vec<WorkDescriptor>,
    pending_connectors: Vec<(ElementId, ConnectorEvent)>,
    work: Vec<WorkDescriptor>,
    connectors: Vec<(ElementId, ConnectorEvent)>,
    committed_batches: Vec<Vec<ElementId>>,

    transactions: usize,
    hydrated_flow_nodes: Vec<ElementId>,
    bulk_hydrations: Vec<Vec<ElementId>>,
    activity_hydrations: usize,
    merge_checks: usize,
    definition_loads: usize,
    served_definition_id: Option<i64>,
    discovery_calls: Vec<(ElementKind, usize)>,
    last_older_than: Option<Duration>,

    responsible: bool,
    responsibility_fails: bool,
    in_progress_messages: usize,
    message_reset_fails: bool,
    message_resets: usize,
}

pub struct FakeEngine {
    state: Mutex<EngineState>,
    on_transaction: Mutex<Option<TransactionHook>>,
}

impl FakeEngine {
    pub fn shared() -> Arc<Self> {
        let mut state = EngineState {
            responsible: true,
            ..EngineState::default()
        };
        for (id, name, stable, terminal) in [
            (INITIALIZING, "initializing", false, false),
            (COMPLETED, "completed", true, true),
            (FAILED, "failed", true, false),
            (READY, "ready", true, false),
            (WAITING_GATEWAY, "gateway waiting", true, false),
        ] {
            state.states.insert(
                id,
                FlowNodeState::new(id, name, stable, terminal, StateCategory::Normal),
            );
        }
        Arc::new(Self {
            state: Mutex::new(state),
            on_transaction: Mutex::new(None),
        })
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap()
    }

    pub fn add_flow_node(&self, instance: FlowNodeInstance) {
        self.lock().flow_nodes.insert(instance.id, instance);
    }

    pub fn add_process(&self, process: ProcessInstance) {
        self.lock().processes.insert(process.id, process);
    }

    pub fn add_state(&self, state: FlowNodeState) {
        self.lock().states.insert(state.id, state);
    }

    pub fn redefine_state(&self, id: i32, stable: bool) {
        let mut state = self.lock();
        let (name, terminal, category) = match state.states.get(&id) {
            Some(s) => (s.name.clone(), s.is_terminal(), s.state_category()),
            None => (format!("state {}", id), false, StateCategory::Normal),
        };
        state
            .states
            .insert(id, FlowNodeState::new(id, name, stable, terminal, category));
    }

    /// Every loaded definition carries `id`, whatever was asked for
    pub fn serve_definitions_as(&self, id: i64) {
        self.lock().served_definition_id = Some(id);
    }

    pub fn fail_hydration_of(&self, id: ElementId) {
        self.lock().failing_hydrations.insert(id);
    }

    pub fn fail_work_for(&self, id: ElementId) {
        self.lock().failing_work.insert(id);
    }

    pub fn merge_ready(&self, id: ElementId) {
        self.lock().ready_merges.insert(id);
    }

    pub fn set_stale_flow_nodes(&self, ids: Vec<ElementId>) {
        self.lock().stale_flow_nodes = ids;
    }

    pub fn set_stale_processes(&self, ids: Vec<ElementId>) {
        self.lock().stale_processes = ids;
    }

    pub fn fail_discovery_of(&self, kind: ElementKind) {
        self.lock().failing_discovery = Some(kind);
    }

    /// Fail the `call`-th transaction (1-based)
    pub fn fail_transaction(&self, call: usize, failure: TxFailure) {
        self.lock().failing_transactions.insert(call, failure);
    }

    /// Run `hook` at the start of every transaction
    pub fn on_transaction(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_transaction.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn set_responsible(&self, responsible: bool) {
        self.lock().responsible = responsible;
    }

    pub fn fail_responsibility_check(&self) {
        self.lock().responsibility_fails = true;
    }

    pub fn set_in_progress_messages(&self, count: usize) {
        self.lock().in_progress_messages = count;
    }

    pub fn fail_message_reset(&self) {
        self.lock().message_reset_fails = true;
    }

    pub fn registered_work(&self) -> Vec<WorkDescriptor> {
        self.lock().work.clone()
    }

    pub fn registered_connectors(&self) -> Vec<(ElementId, ConnectorEvent)> {
        self.lock().connectors.clone()
    }

    /// Flow node ids of the work committed by each transaction
    pub fn committed_batches(&self) -> Vec<Vec<ElementId>> {
        self.lock().committed_batches.clone()
    }

    pub fn transactions(&self) -> usize {
        self.lock().transactions
    }

    pub fn hydrated_flow_nodes(&self) -> Vec<ElementId> {
        self.lock().hydrated_flow_nodes.clone()
    }

    pub fn bulk_hydrations(&self) -> Vec<Vec<ElementId>> {
        self.lock().bulk_hydrations.clone()
    }

    pub fn activity_hydrations(&self) -> usize {
        self.lock().activity_hydrations
    }

    pub fn merge_checks(&self) -> usize {
        self.lock().merge_checks
    }

    pub fn definition_loads(&self) -> usize {
        self.lock().definition_loads
    }

    pub fn discovery_calls(&self) -> Vec<(ElementKind, usize)> {
        self.lock().discovery_calls.clone()
    }

    pub fn last_older_than(&self) -> Option<Duration> {
        self.lock().last_older_than
    }

    pub fn message_resets(&self) -> usize {
        self.lock().message_resets
    }

    fn page_of(&self, kind: ElementKind, older_than: Duration, page: PageRequest) -> RecoveryResult<Vec<ElementId>> {
        let mut state = self.lock();
        state.discovery_calls.push((kind, page.page));
        state.last_older_than = Some(older_than);
        if state.failing_discovery == Some(kind) {
            return Err(RecoveryError::Internal("database unavailable".to_string()));
        }
        let ids = match kind {
            ElementKind::FlowNode => &state.stale_flow_nodes,
            ElementKind::Process => &state.stale_processes,
        };
        Ok(ids.iter().skip(page.offset()).take(page.size).copied().collect())
    }

    fn check_hydration(state: &EngineState, kind: ElementKind, id: ElementId) -> RecoveryResult<()> {
        if state.failing_hydrations.contains(&id) {
            return Err(RecoveryError::hydration(kind, id, "corrupted row"));
        }
        Ok(())
    }
}

impl RecoveryCandidateSource for FakeEngine {
    fn flow_node_ids_to_recover(&self, older_than: Duration, page: PageRequest) -> RecoveryResult<Vec<ElementId>> {
        self.page_of(ElementKind::FlowNode, older_than, page)
    }

    fn process_ids_to_recover(&self, older_than: Duration, page: PageRequest) -> RecoveryResult<Vec<ElementId>> {
        self.page_of(ElementKind::Process, older_than, page)
    }
}

impl InstanceStore for FakeEngine {
    fn hydrate_flow_node(&self, id: ElementId) -> RecoveryResult<Option<FlowNodeInstance>> {
        let mut state = self.lock();
        state.hydrated_flow_nodes.push(id);
        Self::check_hydration(&state, ElementKind::FlowNode, id)?;
        Ok(state.flow_nodes.get(&id).cloned())
    }

    fn hydrate_process_instance(&self, id: ElementId) -> RecoveryResult<Option<ProcessInstance>> {
        let state = self.lock();
        Self::check_hydration(&state, ElementKind::Process, id)?;
        Ok(state.processes.get(&id).cloned())
    }

    fn hydrate_activity(&self, id: ElementId) -> RecoveryResult<Option<FlowNodeInstance>> {
        let mut state = self.lock();
        state.activity_hydrations += 1;
        Self::check_hydration(&state, ElementKind::FlowNode, id)?;
        Ok(state.flow_nodes.get(&id).cloned())
    }

    fn hydrate_flow_nodes(&self, ids: &[ElementId]) -> RecoveryResult<Vec<FlowNodeInstance>> {
        let mut state = self.lock();
        state.bulk_hydrations.push(ids.to_vec());
        Ok(ids
            .iter()
            .filter_map(|id| state.flow_nodes.get(id).cloned())
            .collect())
    }
}

impl ProcessDefinitionStore for FakeEngine {
    fn process_definition(&self, id: i64) -> RecoveryResult<ProcessDefinition> {
        let mut state = self.lock();
        state.definition_loads += 1;
        Ok(ProcessDefinition {
            id: state.served_definition_id.unwrap_or(id),
            name: format!("process-{}", id),
            version: "1.0".to_string(),
        })
    }
}

impl FlowNodeStateOracle for FakeEngine {
    fn lookup(&self, state_id: i32) -> RecoveryResult<FlowNodeState> {
        self.lock()
            .states
            .get(&state_id)
            .cloned()
            .ok_or(RecoveryError::StateLookup(state_id))
    }
}

impl GatewayMergeOracle for FakeEngine {
    fn check_merging_condition(
        &self,
        _definition: &ProcessDefinition,
        gateway: &FlowNodeInstance,
    ) -> RecoveryResult<bool> {
        let mut state = self.lock();
        state.merge_checks += 1;
        Ok(state.ready_merges.contains(&gateway.id))
    }
}

impl WorkQueue for FakeEngine {
    fn register_work(&self, work: WorkDescriptor) -> RecoveryResult<()> {
        let mut state = self.lock();
        if let Some(id) = work.flow_node_instance_id() {
            if state.failing_work.contains(&id) {
                return Err(RecoveryError::work_registration(id, "queue full"));
            }
        }
        if state.in_transaction {
            state.pending_work.push(work);
        } else {
            state.work.push(work);
        }
        Ok(())
    }
}

impl ConnectorRegistrar for FakeEngine {
    fn register_connectors_to_execute(
        &self,
        process: &ProcessInstance,
        event: ConnectorEvent,
    ) -> RecoveryResult<()> {
        let mut state = self.lock();
        if state.in_transaction {
            state.pending_connectors.push((process.id, event));
        } else {
            state.connectors.push((process.id, event));
        }
        Ok(())
    }
}

impl TransactionRunner for FakeEngine {
    fn execute_in_transaction(
        &self,
        work: &mut dyn FnMut() -> RecoveryResult<()>,
    ) -> RecoveryResult<()> {
        let failure = {
            let mut state = self.lock();
            state.transactions += 1;
            let call = state.transactions;
            state.failing_transactions.get(&call).copied()
        };
        if failure == Some(TxFailure::BeforeWork) {
            return Err(RecoveryError::transaction("cannot begin transaction"));
        }

        let hook = self.on_transaction.lock().unwrap().clone();
        if let Some(hook) = hook {
            (*hook)();
        }

        self.lock().in_transaction = true;
        let result = work();

        let mut state = self.lock();
        state.in_transaction = false;
        let pending_work = std::mem::take(&mut state.pending_work);
        let pending_connectors = std::mem::take(&mut state.pending_connectors);

        result?;
        if failure == Some(TxFailure::OnCommit) {
            return Err(RecoveryError::transaction("commit failed"));
        }

        state
            .committed_batches
            .push(pending_work.iter().filter_map(|w| w.flow_node_instance_id()).collect());
        state.work.extend(pending_work);
        state.connectors.extend(pending_connectors);
        Ok(())
    }
}

impl ResponsibilityOracle for FakeEngine {
    fn is_responsible_for_recovery(&self) -> RecoveryResult<bool> {
        let state = self.lock();
        if state.responsibility_fails {
            return Err(RecoveryError::Responsibility("cluster unreachable".to_string()));
        }
        Ok(state.responsible)
    }
}

impl MessageInstanceStore for FakeEngine {
    fn reset_in_progress(&self) -> RecoveryResult<usize> {
        let mut state = self.lock();
        if state.message_reset_fails {
            return Err(RecoveryError::Internal("message table locked".to_string()));
        }
        state.message_resets += 1;
        Ok(std::mem::take(&mut state.in_progress_messages))
    }
}

/// Counts the monitors handed out
pub struct CountingMonitorFactory {
    tenant: String,
    pub started: AtomicUsize,
    pub totals: Mutex<Vec<usize>>,
}

impl CountingMonitorFactory {
    pub fn new(tenant: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            started: AtomicUsize::new(0),
            totals: Mutex::new(Vec::new()),
        }
    }
}

impl RecoveryMonitorFactory for CountingMonitorFactory {
    fn start(&self, total_candidates: usize) -> RecoveryMonitor {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.totals.lock().unwrap().push(total_candidates);
        RecoveryMonitor::start(self.tenant.clone(), total_candidates)
    }
}
