//! Flow node instances and the state descriptors they point to

use std::fmt;

use serde::{Deserialize, Serialize};

use super::element::ElementId;

/// Marker written into a gateway's `hit_bys` once all branches are merged
const GATEWAY_FINISH_MARKER: &str = "FINISH:";

/// Interruption request layered over a flow node's base state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StateCategory {
    #[default]
    Normal,
    Aborting,
    Cancelling,
}

impl StateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateCategory::Normal => "NORMAL",
            StateCategory::Aborting => "ABORTING",
            StateCategory::Cancelling => "CANCELLING",
        }
    }

    /// True when an abort or cancel has been requested
    pub fn is_interrupting(&self) -> bool {
        !matches!(self, StateCategory::Normal)
    }
}

impl fmt::Display for StateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Descriptor of one flow node state, as returned by the state oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowNodeState {
    pub id: i32,
    pub name: String,
    stable: bool,
    terminal: bool,
    category: StateCategory,
}

impl FlowNodeState {
    pub fn new(
        id: i32,
        name: impl Into<String>,
        stable: bool,
        terminal: bool,
        category: StateCategory,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            stable,
            terminal,
            category,
        }
    }

    /// Whether the engine rests in this state rather than passing through it
    pub fn is_stable(&self) -> bool {
        self.stable
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn state_category(&self) -> StateCategory {
        self.category
    }
}

/// Gateway-only payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GatewayState {
    /// Comma separated incoming branches already hit, or `FINISH:<n>` once merged
    pub hit_bys: String,
}

impl GatewayState {
    pub fn new(hit_bys: impl Into<String>) -> Self {
        Self {
            hit_bys: hit_bys.into(),
        }
    }

    /// Merge was already decided; only the execution is pending
    pub fn is_flagged_finished(&self) -> bool {
        self.hit_bys.contains(GATEWAY_FINISH_MARKER)
    }
}

/// Flow node variants the recovery engine distinguishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowNodeKind {
    Activity,
    CallActivity,
    BoundaryEvent,
    IntermediateEvent,
    Gateway(GatewayState),
}

impl FlowNodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowNodeKind::Activity => "activity",
            FlowNodeKind::CallActivity => "call_activity",
            FlowNodeKind::BoundaryEvent => "boundary_event",
            FlowNodeKind::IntermediateEvent => "intermediate_event",
            FlowNodeKind::Gateway(_) => "gateway",
        }
    }
}

/// A hydrated flow node instance.
///
/// Stability and terminality are deliberately absent: they belong to the
/// state identified by `state_id` and must be looked up on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowNodeInstance {
    pub id: ElementId,
    pub name: String,
    pub state_id: i32,
    /// Category persisted on the instance when an interruption was requested
    pub state_category: StateCategory,
    pub process_definition_id: i64,
    pub process_instance_id: ElementId,
    pub kind: FlowNodeKind,
}

impl FlowNodeInstance {
    pub fn new(id: ElementId, state_id: i32, kind: FlowNodeKind) -> Self {
        Self {
            id,
            name: String::new(),
            state_id,
            state_category: StateCategory::Normal,
            process_definition_id: 0,
            process_instance_id: 0,
            kind,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_category(mut self, category: StateCategory) -> Self {
        self.state_category = category;
        self
    }

    pub fn with_process(mut self, process_definition_id: i64, process_instance_id: ElementId) -> Self {
        self.process_definition_id = process_definition_id;
        self.process_instance_id = process_instance_id;
        self
    }

    pub fn is_gateway(&self) -> bool {
        matches!(self.kind, FlowNodeKind::Gateway(_))
    }

    pub fn gateway(&self) -> Option<&GatewayState> {
        match &self.kind {
            FlowNodeKind::Gateway(state) => Some(state),
            _ => None,
        }
    }
}
