//! Candidate discovery
//!
//! Pages through the stale flow nodes and the stale processes
//! independently, each until a page comes back shorter than the page size.
//! Discovery is all-or-nothing: a failing query aborts it with no partial
//! result.

use std::sync::Arc;
use std::time::Duration;

use crate::model::{ElementId, ElementKind, ElementToRecover};
use crate::observability::{log_event, Event};
use crate::ports::{PageRequest, RecoveryCandidateSource};

use super::errors::{RecoveryError, RecoveryResult};

pub struct CandidateDiscovery {
    source: Arc<dyn RecoveryCandidateSource>,
    tenant: String,
}

impl CandidateDiscovery {
    pub fn new(source: Arc<dyn RecoveryCandidateSource>, tenant: impl Into<String>) -> Self {
        Self {
            source,
            tenant: tenant.into(),
        }
    }

    /// Flow nodes then processes, in the order the source returned them
    pub fn discover(
        &self,
        older_than: Duration,
        page_size: usize,
    ) -> RecoveryResult<Vec<ElementToRecover>> {
        let page_size = page_size.max(1);
        let mut elements = Vec::new();

        let flow_nodes = Self::page_through(ElementKind::FlowNode, page_size, &mut elements, |page| {
            self.source.flow_node_ids_to_recover(older_than, page)
        })?;
        let processes = Self::page_through(ElementKind::Process, page_size, &mut elements, |page| {
            self.source.process_ids_to_recover(older_than, page)
        })?;

        let flow_nodes = flow_nodes.to_string();
        let processes = processes.to_string();
        let older_than_ms = older_than.as_millis().to_string();
        log_event(
            Event::DiscoveryComplete,
            &[
                ("tenant", self.tenant.as_str()),
                ("flow_nodes", flow_nodes.as_str()),
                ("processes", processes.as_str()),
                ("older_than_ms", older_than_ms.as_str()),
            ],
        );

        Ok(elements)
    }

    /// Returns how many ids of `kind` were collected
    fn page_through<F>(
        kind: ElementKind,
        page_size: usize,
        elements: &mut Vec<ElementToRecover>,
        mut fetch: F,
    ) -> RecoveryResult<usize>
    where
        F: FnMut(PageRequest) -> RecoveryResult<Vec<ElementId>>,
    {
        let mut page = PageRequest::first(page_size);
        let mut collected = 0;

        loop {
            let ids = fetch(page).map_err(|e| match e {
                RecoveryError::Discovery { .. } => e,
                other => RecoveryError::discovery(kind, other.to_string()),
            })?;

            let returned = ids.len();
            collected += returned;
            elements.extend(ids.into_iter().map(|id| ElementToRecover { id, kind }));

            if returned < page_size {
                return Ok(collected);
            }
            page = page.next();
        }
    }
}
