//! Persisted-state views consumed by the recovery engine
//!
//! The recovery engine never mutates these values. Instances are hydrated
//! from the persistence layer through `ports::InstanceStore`, inspected, and
//! turned into `WorkDescriptor`s for the asynchronous work queue.

mod element;
mod flow_node;
mod process;
mod work;

pub use element::{ElementId, ElementKind, ElementToRecover};
pub use flow_node::{FlowNodeInstance, FlowNodeKind, FlowNodeState, GatewayState, StateCategory};
pub use process::{ProcessDefinition, ProcessInstance, ProcessState, FAILED_ACTIVITY_STATE_ID};
pub use work::{ConnectorEvent, WorkDescriptor, WorkType, FLOW_NODE_INSTANCE_ID};
