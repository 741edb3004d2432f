//! Process instances and definitions

use std::fmt;

use serde::{Deserialize, Serialize};

use super::element::ElementId;

/// Flow node state id the engine assigns to failed activities
pub const FAILED_ACTIVITY_STATE_ID: i32 = 3;

/// Lifecycle state of a process instance, mapped from its persisted id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    Initializing,
    Started,
    Suspended,
    Cancelled,
    Aborted,
    Completing,
    Completed,
    Error,
    Aborting,
    Unknown(i32),
}

impl ProcessState {
    pub fn from_id(id: i32) -> Self {
        match id {
            0 => ProcessState::Initializing,
            1 => ProcessState::Started,
            2 => ProcessState::Suspended,
            3 => ProcessState::Cancelled,
            4 => ProcessState::Aborted,
            5 => ProcessState::Completing,
            6 => ProcessState::Completed,
            7 => ProcessState::Error,
            11 => ProcessState::Aborting,
            other => ProcessState::Unknown(other),
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            ProcessState::Initializing => 0,
            ProcessState::Started => 1,
            ProcessState::Suspended => 2,
            ProcessState::Cancelled => 3,
            ProcessState::Aborted => 4,
            ProcessState::Completing => 5,
            ProcessState::Completed => 6,
            ProcessState::Error => 7,
            ProcessState::Aborting => 11,
            ProcessState::Unknown(id) => *id,
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Initializing => write!(f, "INITIALIZING"),
            ProcessState::Started => write!(f, "STARTED"),
            ProcessState::Suspended => write!(f, "SUSPENDED"),
            ProcessState::Cancelled => write!(f, "CANCELLED"),
            ProcessState::Aborted => write!(f, "ABORTED"),
            ProcessState::Completing => write!(f, "COMPLETING"),
            ProcessState::Completed => write!(f, "COMPLETED"),
            ProcessState::Error => write!(f, "ERROR"),
            ProcessState::Aborting => write!(f, "ABORTING"),
            ProcessState::Unknown(id) => write!(f, "UNKNOWN({})", id),
        }
    }
}

/// A hydrated process instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub id: ElementId,
    pub state_id: i32,
    pub process_definition_id: i64,
    /// Call activity that started this instance; `<= 0` means none
    pub caller_id: ElementId,
}

impl ProcessInstance {
    pub fn new(id: ElementId, state_id: i32) -> Self {
        Self {
            id,
            state_id,
            process_definition_id: 0,
            caller_id: -1,
        }
    }

    pub fn with_caller(mut self, caller_id: ElementId) -> Self {
        self.caller_id = caller_id;
        self
    }

    pub fn with_definition(mut self, process_definition_id: i64) -> Self {
        self.process_definition_id = process_definition_id;
        self
    }

    pub fn state(&self) -> ProcessState {
        ProcessState::from_id(self.state_id)
    }

    pub fn has_caller(&self) -> bool {
        self.caller_id > 0
    }
}

/// The deployed definition a gateway merge check is evaluated against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub id: i64,
    pub name: String,
    pub version: String,
}
