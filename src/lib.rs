//! flow-recovery - Crash and stall recovery for a business-process engine
//!
//! Periodically finds flow nodes and processes left pending by a crashed
//! node or a lost work item, and re-registers the work that moves them on.

pub mod config;
pub mod model;
pub mod observability;
pub mod ports;
pub mod recovery;
pub mod schedule;
