//! The snapshot shape the engine persists.
//!
//! The engine treats its two collections as one opaque blob: every
//! save replaces the previous snapshot wholesale. Adapters never
//! interpret the contents beyond (de)serialization.

use approval_types::{ApprovalChain, ApprovalRequest};
use serde::{Deserialize, Serialize};

/// Both engine collections, saved and loaded together.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineSnapshot {
    #[serde(default)]
    pub chains: Vec<ApprovalChain>,
    #[serde(default)]
    pub requests: Vec<ApprovalRequest>,
}

impl EngineSnapshot {
    pub fn new(chains: Vec<ApprovalChain>, requests: Vec<ApprovalRequest>) -> Self {
        Self { chains, requests }
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty() && self.requests.is_empty()
    }
}
