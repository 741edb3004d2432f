//! Recovery candidates produced by discovery

use std::fmt;

use serde::{Deserialize, Serialize};

/// Persistent identifier of a process or flow node instance
pub type ElementId = i64;

/// Which executor a candidate belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElementKind {
    /// A process instance, re-driven through its connectors
    Process,
    /// A flow node instance, re-driven by registering work
    FlowNode,
}

impl ElementKind {
    /// Name used in log fields and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Process => "PROCESS",
            ElementKind::FlowNode => "FLOWNODE",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stale element found by discovery, consumed once by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementToRecover {
    pub id: ElementId,
    pub kind: ElementKind,
}

impl ElementToRecover {
    pub fn process(id: ElementId) -> Self {
        Self {
            id,
            kind: ElementKind::Process,
        }
    }

    pub fn flow_node(id: ElementId) -> Self {
        Self {
            id,
            kind: ElementKind::FlowNode,
        }
    }
}
