//! Approval domain types for Signoff
//!
//! State-changing actions — publishing a ticket, approving a PRD,
//! authorizing a release — are gated behind a configurable, multi-level
//! sign-off process. This crate holds the vocabulary:
//!
//! - [`ApprovalChain`] / [`ApprovalLevel`] — the blueprint: an ordered
//!   sequence of levels, each with its own approver set, quorum, and
//!   timeout
//! - [`ApprovalRequest`] — one resource instance moving through a chain,
//!   with its append-only vote and escalation history
//! - [`ApprovalProgress`] — a read-only projection of how far a request
//!   has advanced
//! - [`ChainSpec`] / [`ChainUpdate`] / [`RequestSpec`] / [`Vote`] —
//!   command structs naming exactly what a caller may set
//!
//! The lifecycle rules that mutate these types live in the
//! `approval-engine` crate; persistence adapters live in
//! `approval-store`.

#![deny(unsafe_code)]

pub mod chain;
pub mod errors;
pub mod request;

pub use chain::{
    ApprovalChain, ApprovalLevel, ChainId, ChainSpec, ChainUpdate, EscalationRule,
    EscalationTarget, NotificationSettings, RoleId, UserId,
};
pub use errors::{ApprovalError, ApprovalResult};
pub use request::{
    ApprovalEntry, ApprovalProgress, ApprovalRequest, Decision, EscalationRecord, RequestId,
    RequestSpec, RequestStatus, Vote,
};
