//! Approval requests: one in-flight or completed sign-off process
//!
//! An ApprovalRequest tracks a single resource instance through its
//! chain: which level it sits at, every vote cast, every escalation,
//! and the deadline governing timeout escalation. Votes and escalation
//! records are append-only; nothing is ever removed or rewritten.

use crate::{ApprovalChain, ApprovalLevel, ChainId, EscalationTarget, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifier ───────────────────────────────────────────────────────

/// Unique identifier for an approval request
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// The lifecycle state of an approval request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RequestStatus {
    /// Awaiting votes at the current level
    #[default]
    Pending,
    /// Flagged for heightened visibility; still accepts votes
    Escalated,
    /// Quorum met at every level
    Approved,
    /// Vetoed by a single rejection
    Rejected,
    /// Withdrawn before completion
    Cancelled,
}

impl RequestStatus {
    /// Terminal states admit no further mutation
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }

    /// Open states accept votes
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Escalated)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Escalated => "escalated",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

// ── Votes ────────────────────────────────────────────────────────────

/// A vote's direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Rejected,
}

/// One recorded vote. `level_order` is the level the vote counted
/// toward at the time it was cast and is never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalEntry {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub level_order: u32,
}

/// A vote as submitted by a caller
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vote {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Vote {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            user_email: None,
            comment: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

// ── Escalation history ───────────────────────────────────────────────

/// One escalation event. `to_level` equals `from_level` when the
/// escalation did not move the request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub from_level: u32,
    pub to_level: u32,
    pub target: EscalationTarget,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

// ── Request ──────────────────────────────────────────────────────────

/// A single approval process for one resource instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique identifier
    pub id: RequestId,
    /// The chain this request runs through
    pub chain_id: ChainId,
    /// What kind of resource is gated
    pub resource_type: String,
    /// Which resource instance is gated
    pub resource_id: String,
    /// Optional display name for the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    /// The order of the active level; always a valid order in the chain
    pub current_level: u32,
    /// Every vote cast, append-only
    pub approvals: Vec<ApprovalEntry>,
    /// Current lifecycle state
    pub status: RequestStatus,
    /// Who opened the request
    pub requested_by: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by_email: Option<String>,
    /// When the active level times out; `None` when the level has no
    /// timeout. Recomputed on every level change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    /// Every escalation event, append-only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub escalation_history: Vec<EscalationRecord>,
    /// When the request was opened
    pub created_at: DateTime<Utc>,
    /// Set exactly once, on the terminal transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    /// Open a request at the chain's first level. The deadline comes
    /// from that level's timeout, when it has one.
    pub fn open(spec: RequestSpec, first_level: &ApprovalLevel) -> Self {
        let now = Utc::now();
        Self {
            id: RequestId::generate(),
            chain_id: spec.chain_id,
            resource_type: spec.resource_type,
            resource_id: spec.resource_id,
            resource_name: spec.resource_name,
            current_level: first_level.order,
            approvals: Vec::new(),
            status: RequestStatus::Pending,
            requested_by: spec.requested_by,
            requested_by_email: spec.requested_by_email,
            deadline: deadline_from(first_level, now),
            escalation_history: Vec::new(),
            created_at: now,
            completed_at: None,
        }
    }

    /// Append an approving vote at the given level
    pub fn record_approval(&mut self, vote: Vote, level_order: u32) {
        self.approvals.push(ApprovalEntry {
            user_id: vote.user_id,
            user_email: vote.user_email,
            decision: Decision::Approved,
            comment: vote.comment,
            timestamp: Utc::now(),
            level_order,
        });
    }

    /// Append a rejecting vote at the given level
    pub fn record_rejection(&mut self, vote: Vote, level_order: u32) {
        self.approvals.push(ApprovalEntry {
            user_id: vote.user_id,
            user_email: vote.user_email,
            decision: Decision::Rejected,
            comment: vote.comment,
            timestamp: Utc::now(),
            level_order,
        });
    }

    /// Move the request to a new level: sets the level, recomputes the
    /// deadline from the new level's timeout, and returns to Pending
    pub fn advance_to(&mut self, level: &ApprovalLevel) {
        self.current_level = level.order;
        self.deadline = deadline_from(level, Utc::now());
        self.status = RequestStatus::Pending;
    }

    /// Append an escalation record and flag the request as escalated
    pub fn record_escalation(&mut self, record: EscalationRecord) {
        self.escalation_history.push(record);
        self.status = RequestStatus::Escalated;
    }

    /// Enter a terminal state
    pub fn finalize(&mut self, status: RequestStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    // ── Query methods ────────────────────────────────────────────────

    /// Count of approving votes at a level
    pub fn approvals_at_level(&self, level_order: u32) -> u32 {
        self.approvals
            .iter()
            .filter(|e| e.level_order == level_order && e.decision == Decision::Approved)
            .count() as u32
    }

    /// Whether a user has an approving vote recorded at a level
    pub fn has_approved_at(&self, user: &UserId, level_order: u32) -> bool {
        self.approvals.iter().any(|e| {
            e.level_order == level_order
                && e.decision == Decision::Approved
                && &e.user_id == user
        })
    }

    /// Whether a user has any vote recorded at a level
    pub fn has_voted_at(&self, user: &UserId, level_order: u32) -> bool {
        self.approvals
            .iter()
            .any(|e| e.level_order == level_order && &e.user_id == user)
    }

    /// Whether the request still accepts votes
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Whether the deadline exists and has passed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.deadline.map(|d| d <= now).unwrap_or(false)
    }

    /// Hours the request has been open
    pub fn age_hours(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.created_at).num_hours()
    }
}

fn deadline_from(level: &ApprovalLevel, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    level
        .timeout_hours
        .map(|h| from + chrono::Duration::hours(i64::from(h)))
}

// ── Command ──────────────────────────────────────────────────────────

/// Everything needed to open a request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestSpec {
    pub chain_id: ChainId,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    pub requested_by: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by_email: Option<String>,
}

impl RequestSpec {
    pub fn new(
        chain_id: ChainId,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        requested_by: UserId,
    ) -> Self {
        Self {
            chain_id,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            resource_name: None,
            requested_by,
            requested_by_email: None,
        }
    }

    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn with_requested_by_email(mut self, email: impl Into<String>) -> Self {
        self.requested_by_email = Some(email.into());
        self
    }
}

// ── Progress ─────────────────────────────────────────────────────────

/// A read-only projection of how far a request has advanced
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalProgress {
    pub current_level: u32,
    pub total_levels: u32,
    pub current_level_name: String,
    pub approvals_at_current_level: u32,
    pub required_approvals: u32,
    pub percent_complete: u8,
}

impl ApprovalProgress {
    /// Compute progress for a request against its chain. Levels fully
    /// passed count as whole units; the active level contributes its
    /// vote fraction.
    pub fn compute(request: &ApprovalRequest, chain: &ApprovalChain) -> Option<Self> {
        let level = chain.level(request.current_level)?;
        let position = chain.level_position(request.current_level)?;
        let total = chain.total_levels();

        let approvals = request.approvals_at_level(request.current_level);
        let fraction = f64::from(approvals) / f64::from(level.required_approvals);
        let percent = (((position - 1) as f64 + fraction) / total as f64 * 100.0).round();

        Some(Self {
            current_level: request.current_level,
            total_levels: total as u32,
            current_level_name: level.name.clone(),
            approvals_at_current_level: approvals,
            required_approvals: level.required_approvals,
            percent_complete: percent as u8,
        })
    }
}
