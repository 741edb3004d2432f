//! Units of asynchronous work handed to the work queue

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::element::ElementId;

/// Parameter key carrying the target flow node
pub const FLOW_NODE_INSTANCE_ID: &str = "flowNodeInstanceId";

/// What a work item asks the engine to do with its flow node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkType {
    /// Run the node's current state again
    ExecuteFlownode,
    /// Complete a node already in a terminal state
    FinishFlownode,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::ExecuteFlownode => "EXECUTE_FLOWNODE",
            WorkType::FinishFlownode => "FINISH_FLOWNODE",
        }
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connector phase to re-register on a process instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectorEvent {
    /// Connectors bound to process start (initializing instances)
    OnEnter,
    /// Connectors bound to process end (completing instances)
    OnFinish,
}

impl ConnectorEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorEvent::OnEnter => "ON_ENTER",
            ConnectorEvent::OnFinish => "ON_FINISH",
        }
    }
}

/// A work item as registered with the work queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkDescriptor {
    pub work_type: WorkType,
    pub parameters: BTreeMap<String, Value>,
}

impl WorkDescriptor {
    /// Work that re-executes the flow node
    pub fn execute_flow_node(flow_node_instance_id: ElementId) -> Self {
        Self::for_flow_node(WorkType::ExecuteFlownode, flow_node_instance_id)
    }

    /// Work that finishes a terminal flow node
    pub fn finish_flow_node(flow_node_instance_id: ElementId) -> Self {
        Self::for_flow_node(WorkType::FinishFlownode, flow_node_instance_id)
    }

    fn for_flow_node(work_type: WorkType, flow_node_instance_id: ElementId) -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert(
            FLOW_NODE_INSTANCE_ID.to_string(),
            Value::from(flow_node_instance_id),
        );
        Self {
            work_type,
            parameters,
        }
    }

    /// Target flow node, if the descriptor carries one
    pub fn flow_node_instance_id(&self) -> Option<ElementId> {
        self.parameters
            .get(FLOW_NODE_INSTANCE_ID)
            .and_then(Value::as_i64)
    }
}
