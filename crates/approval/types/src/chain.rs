//! Approval chains: the blueprint for multi-level sign-off
//!
//! An ApprovalChain is an ordered sequence of levels. Each level names
//! the users/roles that may sign off, the quorum of approvals required
//! to advance, and an optional timeout after which a pending request
//! becomes eligible for escalation.
//!
//! Chains are validated before registration. Administrative edits go
//! through [`ChainUpdate`], an explicit command struct naming exactly
//! which fields may change.

use crate::{ApprovalError, ApprovalResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for an approval chain
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub String);

impl ChainId {
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

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A role tag as resolved by the caller's identity layer
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque user identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Escalation ───────────────────────────────────────────────────────

/// Where a level sends a request when it escalates
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationTarget {
    /// Advance the request to the following level
    NextLevel,
    /// Route to a named role without level movement; the notification
    /// layer interprets the target
    Role { role: RoleId },
    /// Record the escalation without movement or routing
    #[default]
    None,
}

/// A chain-wide fallback rule: fires once a request has been open for
/// `after_hours`, regardless of which level it sits at
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub after_hours: u32,
    pub escalate_to: EscalationTarget,
}

impl EscalationRule {
    pub fn new(after_hours: u32) -> Self {
        Self {
            after_hours,
            escalate_to: EscalationTarget::None,
        }
    }

    pub fn with_target(mut self, target: EscalationTarget) -> Self {
        self.escalate_to = target;
        self
    }
}

// ── Notification settings ────────────────────────────────────────────

/// Delivery flags only. The engine never sends anything; the
/// notification layer reads these when it reacts to state changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub notify_on_request: bool,
    pub notify_on_approval: bool,
    pub notify_on_rejection: bool,
    pub notify_on_escalation: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            notify_on_request: true,
            notify_on_approval: true,
            notify_on_rejection: true,
            notify_on_escalation: true,
        }
    }
}

// ── Approval level ───────────────────────────────────────────────────

/// One stage of a chain with its own approver set, quorum, and timeout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLevel {
    /// Position in the chain; positive and unique within the chain
    pub order: u32,
    /// Human-readable name
    pub name: String,
    /// Roles whose holders may sign off at this level
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approver_roles: Vec<RoleId>,
    /// Explicit users who may sign off at this level
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approver_user_ids: Vec<UserId>,
    /// Distinct approving votes required to advance past this level
    pub required_approvals: u32,
    /// Hours until a pending request at this level is eligible for
    /// timeout escalation; no deadline when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_hours: Option<u32>,
    /// Where the request goes when this level escalates
    #[serde(default)]
    pub escalate_to: EscalationTarget,
}

impl ApprovalLevel {
    pub fn new(order: u32, name: impl Into<String>) -> Self {
        Self {
            order,
            name: name.into(),
            approver_roles: Vec::new(),
            approver_user_ids: Vec::new(),
            required_approvals: 1,
            timeout_hours: None,
            escalate_to: EscalationTarget::None,
        }
    }

    pub fn with_approver_role(mut self, role: RoleId) -> Self {
        self.approver_roles.push(role);
        self
    }

    pub fn with_approver_user(mut self, user: UserId) -> Self {
        self.approver_user_ids.push(user);
        self
    }

    pub fn with_required_approvals(mut self, quorum: u32) -> Self {
        self.required_approvals = quorum;
        self
    }

    pub fn with_timeout_hours(mut self, hours: u32) -> Self {
        self.timeout_hours = Some(hours);
        self
    }

    pub fn with_escalate_to(mut self, target: EscalationTarget) -> Self {
        self.escalate_to = target;
        self
    }

    /// Check whether a user (optionally carrying a role) belongs to
    /// this level's approver set
    pub fn is_approver(&self, user: &UserId, role: Option<&RoleId>) -> bool {
        if self.approver_user_ids.contains(user) {
            return true;
        }
        role.map(|r| self.approver_roles.contains(r))
            .unwrap_or(false)
    }
}

// ── Approval chain ───────────────────────────────────────────────────

/// An ordered definition of approval levels for a resource type
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalChain {
    /// Unique identifier
    pub id: ChainId,
    /// Human-readable name
    pub name: String,
    /// What this chain gates
    pub description: String,
    /// The levels, kept sorted by `order`
    pub levels: Vec<ApprovalLevel>,
    /// Chain-wide fallback escalation rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub escalation_rules: Vec<EscalationRule>,
    /// Delivery flags for the notification layer
    #[serde(default)]
    pub notification_settings: NotificationSettings,
    /// When this chain was created
    pub created_at: DateTime<Utc>,
    /// When this chain was last edited
    pub updated_at: DateTime<Utc>,
}

impl ApprovalChain {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ChainId::generate(),
            name: name.into(),
            description: String::new(),
            levels: Vec::new(),
            escalation_rules: Vec::new(),
            notification_settings: NotificationSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: ChainId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_escalation_rule(mut self, rule: EscalationRule) -> Self {
        self.escalation_rules.push(rule);
        self
    }

    pub fn with_notification_settings(mut self, settings: NotificationSettings) -> Self {
        self.notification_settings = settings;
        self
    }

    /// Add a level, keeping the list sorted by order
    pub fn add_level(&mut self, level: ApprovalLevel) -> ApprovalResult<()> {
        if self.levels.iter().any(|l| l.order == level.order) {
            return Err(ApprovalError::DuplicateLevelOrder(level.order));
        }
        self.levels.push(level);
        self.levels.sort_by_key(|l| l.order);
        Ok(())
    }

    /// Validate the chain for structural correctness
    pub fn validate(&self) -> ApprovalResult<()> {
        if self.levels.is_empty() {
            return Err(ApprovalError::EmptyChain);
        }

        let mut seen = std::collections::HashSet::new();
        for level in &self.levels {
            if level.order == 0 {
                return Err(ApprovalError::InvalidLevelOrder);
            }
            if !seen.insert(level.order) {
                return Err(ApprovalError::DuplicateLevelOrder(level.order));
            }
            if level.required_approvals == 0 {
                return Err(ApprovalError::InvalidQuorum(level.order));
            }
        }

        Ok(())
    }

    /// Get a level by its order
    pub fn level(&self, order: u32) -> Option<&ApprovalLevel> {
        self.levels.iter().find(|l| l.order == order)
    }

    /// The first level in sequence
    pub fn first_level(&self) -> Option<&ApprovalLevel> {
        self.levels.first()
    }

    /// The level following the given order, if any
    pub fn next_level_after(&self, order: u32) -> Option<&ApprovalLevel> {
        self.levels.iter().find(|l| l.order > order)
    }

    /// 1-based position of a level in the sorted sequence
    pub fn level_position(&self, order: u32) -> Option<usize> {
        self.levels.iter().position(|l| l.order == order).map(|p| p + 1)
    }

    /// Total number of levels
    pub fn total_levels(&self) -> usize {
        self.levels.len()
    }
}

// ── Commands ─────────────────────────────────────────────────────────

/// Everything needed to create a chain; the registry assigns the id
/// and timestamps
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub levels: Vec<ApprovalLevel>,
    #[serde(default)]
    pub escalation_rules: Vec<EscalationRule>,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
}

impl ChainSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            levels: Vec::new(),
            escalation_rules: Vec::new(),
            notification_settings: NotificationSettings::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_level(mut self, level: ApprovalLevel) -> Self {
        self.levels.push(level);
        self
    }

    pub fn with_escalation_rule(mut self, rule: EscalationRule) -> Self {
        self.escalation_rules.push(rule);
        self
    }

    pub fn with_notification_settings(mut self, settings: NotificationSettings) -> Self {
        self.notification_settings = settings;
        self
    }
}

/// An administrative edit. Only the named fields can change; anything
/// left as `None` is untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChainUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub levels: Option<Vec<ApprovalLevel>>,
    pub escalation_rules: Option<Vec<EscalationRule>>,
    pub notification_settings: Option<NotificationSettings>,
}

impl ChainUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn replace_levels(mut self, levels: Vec<ApprovalLevel>) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn replace_escalation_rules(mut self, rules: Vec<EscalationRule>) -> Self {
        self.escalation_rules = Some(rules);
        self
    }

    pub fn replace_notification_settings(mut self, settings: NotificationSettings) -> Self {
        self.notification_settings = Some(settings);
        self
    }
}
