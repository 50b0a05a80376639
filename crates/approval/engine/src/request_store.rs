//! Request store: the in-memory collection of approval requests
//!
//! Requests are never physically deleted by the engine; archival is a
//! store-level concern outside it.

use approval_types::{ApprovalRequest, ChainId, RequestId};
use std::collections::HashMap;

/// All approval requests, keyed by id
#[derive(Clone, Debug, Default)]
pub struct RequestStore {
    requests: HashMap<RequestId, ApprovalRequest>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted requests
    pub fn from_requests(requests: Vec<ApprovalRequest>) -> Self {
        Self {
            requests: requests.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn insert(&mut self, request: ApprovalRequest) {
        self.requests.insert(request.id.clone(), request);
    }

    pub fn get(&self, id: &RequestId) -> Option<&ApprovalRequest> {
        self.requests.get(id)
    }

    pub fn get_mut(&mut self, id: &RequestId) -> Option<&mut ApprovalRequest> {
        self.requests.get_mut(id)
    }

    pub fn all(&self) -> Vec<&ApprovalRequest> {
        self.requests.values().collect()
    }

    pub fn count(&self) -> usize {
        self.requests.len()
    }

    /// All requests for one resource instance, any status
    pub fn by_resource(&self, resource_type: &str, resource_id: &str) -> Vec<&ApprovalRequest> {
        self.requests
            .values()
            .filter(|r| r.resource_type == resource_type && r.resource_id == resource_id)
            .collect()
    }

    /// Whether any open request still runs through the given chain
    pub fn has_open_for_chain(&self, chain_id: &ChainId) -> bool {
        self.requests
            .values()
            .any(|r| &r.chain_id == chain_id && r.is_open())
    }
}
