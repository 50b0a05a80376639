//! Approval workflow engine for Signoff
//!
//! The engine gates state-changing actions behind configurable,
//! multi-level sign-off. It advances requests through their chain as
//! quorums are met, finalizes on veto, escalates overdue requests from
//! a background scan, and answers progress queries.
//!
//! # Architecture
//!
//! [`ApprovalEngine`] composes specialized components:
//!
//! - [`ChainRegistry`] — validated chain definitions plus the three
//!   built-in chains (ticket, prd, release)
//! - [`RequestStore`] — the in-memory request collection
//! - [`StateMachine`] — the lifecycle transition rules
//! - [`TimeoutChecker`] — decides which pending requests are due for
//!   escalation
//!
//! Snapshots of both collections persist through the `approval-store`
//! crate's `SnapshotStore` contract after every mutation.
//!
//! # Example
//!
//! ```rust
//! use approval_engine::ApprovalEngine;
//! use approval_store::MemoryStore;
//! use approval_types::{ChainId, RequestSpec, UserId, Vote};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let engine = ApprovalEngine::new(Arc::new(MemoryStore::new()));
//!
//! // The single-level "ticket" chain ships built in.
//! let request = engine
//!     .create_request(RequestSpec::new(
//!         ChainId::new("ticket"),
//!         "ticket",
//!         "TCK-42",
//!         UserId::new("alice"),
//!     ))
//!     .await
//!     .unwrap();
//!
//! let approved = engine
//!     .approve(&request.id, Vote::new(UserId::new("bob")))
//!     .await
//!     .unwrap();
//! assert!(approved.status.is_terminal());
//! # });
//! ```

#![deny(unsafe_code)]

pub mod chain_registry;
pub mod config;
pub mod engine;
pub mod request_store;
pub mod state_machine;
pub mod timeout_checker;

// Re-export main types
pub use chain_registry::ChainRegistry;
pub use config::EngineConfig;
pub use engine::ApprovalEngine;
pub use request_store::RequestStore;
pub use state_machine::StateMachine;
pub use timeout_checker::{EscalationDue, TimeoutChecker};
