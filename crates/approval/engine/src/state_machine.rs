//! Lifecycle state machine: the transition rules for approval requests
//!
//! Valid status paths:
//!
//! ```text
//! pending   -> pending (same or next level) | escalated | approved | rejected | cancelled
//! escalated -> pending (next level) | approved | rejected | cancelled
//! approved / rejected / cancelled -> (terminal)
//! ```
//!
//! Rejection is a veto: one rejecting vote at any level finalizes the
//! whole request. Escalation is a visibility state, not a separate
//! approval track — a late-arriving approval after escalation still
//! counts, and a quorum met while escalated returns the request to
//! pending at the next level.

use approval_types::{
    ApprovalChain, ApprovalError, ApprovalRequest, ApprovalResult, EscalationRecord,
    EscalationTarget, RequestSpec, RequestStatus, Vote,
};
use chrono::Utc;

/// Applies lifecycle transitions to requests. Holds no state of its
/// own; the engine provides lookup, locking, and persistence.
#[derive(Clone, Debug, Default)]
pub struct StateMachine;

impl StateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Open a request at the chain's first level
    pub fn open_request(
        &self,
        spec: RequestSpec,
        chain: &ApprovalChain,
    ) -> ApprovalResult<ApprovalRequest> {
        let first = chain.first_level().ok_or(ApprovalError::EmptyChain)?;
        Ok(ApprovalRequest::open(spec, first))
    }

    /// Record an approving vote and advance or finalize when the
    /// current level's quorum is met
    pub fn approve(
        &self,
        request: &mut ApprovalRequest,
        chain: &ApprovalChain,
        vote: Vote,
    ) -> ApprovalResult<()> {
        self.ensure_open(request, "approve")?;
        let level = self.current_level(request, chain)?;

        if request.has_approved_at(&vote.user_id, request.current_level) {
            return Err(ApprovalError::AlreadyVoted {
                user: vote.user_id,
                level: request.current_level,
            });
        }

        request.record_approval(vote, request.current_level);

        if request.approvals_at_level(request.current_level) >= level.required_approvals {
            match chain.next_level_after(request.current_level) {
                Some(next) => {
                    request.advance_to(next);
                    tracing::info!(
                        request_id = %request.id,
                        level = request.current_level,
                        "quorum met, request advanced"
                    );
                }
                None => {
                    request.finalize(RequestStatus::Approved);
                    tracing::info!(request_id = %request.id, "request approved");
                }
            }
        }

        Ok(())
    }

    /// Record a rejecting vote. One rejection finalizes the whole
    /// request regardless of prior approvals.
    pub fn reject(
        &self,
        request: &mut ApprovalRequest,
        chain: &ApprovalChain,
        vote: Vote,
    ) -> ApprovalResult<()> {
        self.ensure_open(request, "reject")?;
        self.current_level(request, chain)?;

        request.record_rejection(vote, request.current_level);
        request.finalize(RequestStatus::Rejected);
        tracing::info!(request_id = %request.id, "request rejected");
        Ok(())
    }

    /// Escalate a pending request. The target comes from the current
    /// level's policy unless the caller overrides it (chain-wide rules
    /// do). `NextLevel` moves the request when a next level exists;
    /// other targets record the escalation in place.
    pub fn escalate(
        &self,
        request: &mut ApprovalRequest,
        chain: &ApprovalChain,
        reason: &str,
        target_override: Option<&EscalationTarget>,
    ) -> ApprovalResult<()> {
        if request.status != RequestStatus::Pending {
            return Err(ApprovalError::InvalidState {
                operation: "escalate",
                status: request.status,
            });
        }
        let level = self.current_level(request, chain)?;
        let target = target_override.unwrap_or(&level.escalate_to).clone();

        let from_level = request.current_level;
        let mut to_level = from_level;
        if matches!(target, EscalationTarget::NextLevel) {
            if let Some(next) = chain.next_level_after(from_level) {
                request.advance_to(next);
                to_level = next.order;
            }
        }

        request.record_escalation(EscalationRecord {
            from_level,
            to_level,
            target,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        tracing::info!(
            request_id = %request.id,
            from_level,
            to_level,
            reason,
            "request escalated"
        );
        Ok(())
    }

    /// Cancel an open request. Terminal requests cannot be cancelled.
    pub fn cancel(&self, request: &mut ApprovalRequest) -> ApprovalResult<()> {
        if request.status.is_terminal() {
            return Err(ApprovalError::InvalidState {
                operation: "cancel",
                status: request.status,
            });
        }
        request.finalize(RequestStatus::Cancelled);
        tracing::info!(request_id = %request.id, "request cancelled");
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn ensure_open(&self, request: &ApprovalRequest, operation: &'static str) -> ApprovalResult<()> {
        if !request.status.is_open() {
            return Err(ApprovalError::InvalidState {
                operation,
                status: request.status,
            });
        }
        Ok(())
    }

    fn current_level<'a>(
        &self,
        request: &ApprovalRequest,
        chain: &'a ApprovalChain,
    ) -> ApprovalResult<&'a approval_types::ApprovalLevel> {
        chain
            .level(request.current_level)
            .ok_or_else(|| ApprovalError::LevelNotFound {
                chain: chain.id.clone(),
                order: request.current_level,
            })
    }
}
