//! Read access to persisted instances

use std::time::Duration;

use crate::model::{ElementId, FlowNodeInstance, ProcessDefinition, ProcessInstance};
use crate::recovery::RecoveryResult;

/// Zero-based page cursor for candidate queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn first(size: usize) -> Self {
        Self { page: 0, size }
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page + 1,
            size: self.size,
        }
    }

    /// Offset of the first row of this page
    pub fn offset(&self) -> usize {
        self.page * self.size
    }
}

/// Source of stale element ids
pub trait RecoveryCandidateSource: Send + Sync {
    /// Flow nodes last updated more than `older_than` ago
    fn flow_node_ids_to_recover(
        &self,
        older_than: Duration,
        page: PageRequest,
    ) -> RecoveryResult<Vec<ElementId>>;

    /// Processes last updated more than `older_than` ago
    fn process_ids_to_recover(
        &self,
        older_than: Duration,
        page: PageRequest,
    ) -> RecoveryResult<Vec<ElementId>>;
}

/// Hydration of persisted instances. `Ok(None)` means the row is gone.
pub trait InstanceStore: Send + Sync {
    fn hydrate_flow_node(&self, id: ElementId) -> RecoveryResult<Option<FlowNodeInstance>>;

    fn hydrate_process_instance(&self, id: ElementId) -> RecoveryResult<Option<ProcessInstance>>;

    /// Caller call-activity of a sub-process
    fn hydrate_activity(&self, id: ElementId) -> RecoveryResult<Option<FlowNodeInstance>>;

    /// Bulk hydration; ids with no row are simply absent from the result
    fn hydrate_flow_nodes(&self, ids: &[ElementId]) -> RecoveryResult<Vec<FlowNodeInstance>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(instance) = self.hydrate_flow_node(*id)? {
                found.push(instance);
            }
        }
        Ok(found)
    }
}

pub trait ProcessDefinitionStore: Send + Sync {
    fn process_definition(&self, id: i64) -> RecoveryResult<ProcessDefinition>;
}

/// Message instances left flagged as "being handled" by a dead node
pub trait MessageInstanceStore: Send + Sync {
    /// Returns the number of message instances reset
    fn reset_in_progress(&self) -> RecoveryResult<usize>;
}
