//! Timeout checker: decides which requests are due for escalation
//!
//! The checker only decides — it returns due escalations for the
//! engine to drive through the locked escalate path. Two triggers
//! exist: the active level's deadline, and chain-wide escalation
//! rules measured from the request's creation. A scan emits at most
//! one entry per request, so one tick never escalates a request twice.

use crate::chain_registry::ChainRegistry;
use approval_types::{ApprovalRequest, EscalationTarget, RequestId, RequestStatus};
use chrono::{DateTime, Utc};

/// One escalation the engine should perform
#[derive(Clone, Debug)]
pub struct EscalationDue {
    pub request_id: RequestId,
    pub reason: String,
    /// Chain-rule escalations carry the rule's target; deadline
    /// escalations defer to the level's own policy
    pub target_override: Option<EscalationTarget>,
}

/// Scans pending requests for lapsed deadlines and chain rules
#[derive(Clone, Debug, Default)]
pub struct TimeoutChecker;

impl TimeoutChecker {
    pub fn new() -> Self {
        Self
    }

    /// Decide which pending requests are due for escalation at `now`.
    /// The level deadline is checked first, then chain-wide rules.
    pub fn due_escalations<'a>(
        &self,
        requests: impl IntoIterator<Item = &'a ApprovalRequest>,
        chains: &ChainRegistry,
        now: DateTime<Utc>,
    ) -> Vec<EscalationDue> {
        let mut due = Vec::new();

        for request in requests {
            if request.status != RequestStatus::Pending {
                continue;
            }

            if request.is_overdue(now) {
                due.push(EscalationDue {
                    request_id: request.id.clone(),
                    reason: "Timeout exceeded".to_string(),
                    target_override: None,
                });
                continue;
            }

            let Some(chain) = chains.get(&request.chain_id) else {
                continue;
            };
            for rule in &chain.escalation_rules {
                if request.age_hours(now) >= i64::from(rule.after_hours) {
                    due.push(EscalationDue {
                        request_id: request.id.clone(),
                        reason: format!(
                            "Escalation rule triggered after {} hours",
                            rule.after_hours
                        ),
                        target_override: Some(rule.escalate_to.clone()),
                    });
                    break;
                }
            }
        }

        due
    }
}
