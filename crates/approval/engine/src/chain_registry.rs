//! Chain registry: stores and validates approval chain definitions
//!
//! Three built-in chains ship pre-registered — ticket, prd, release —
//! so the system is usable before anyone configures anything. Built-ins
//! carry stable ids and survive snapshot reloads: loading a snapshot
//! that lacks one re-registers it.

use approval_types::{
    ApprovalChain, ApprovalError, ApprovalLevel, ApprovalResult, ChainId, ChainSpec, ChainUpdate,
    EscalationTarget, RoleId,
};
use chrono::Utc;
use std::collections::HashMap;

/// Registry of approval chains
#[derive(Clone, Debug, Default)]
pub struct ChainRegistry {
    chains: HashMap<ChainId, ApprovalChain>,
}

impl ChainRegistry {
    /// Create a registry holding only the built-in chains
    pub fn new() -> Self {
        let mut registry = Self {
            chains: HashMap::new(),
        };
        registry.ensure_builtins();
        registry
    }

    /// Rebuild from persisted chains, re-registering any missing
    /// built-ins
    pub fn from_chains(chains: Vec<ApprovalChain>) -> Self {
        let mut registry = Self {
            chains: chains.into_iter().map(|c| (c.id.clone(), c)).collect(),
        };
        registry.ensure_builtins();
        registry
    }

    /// Validate and register a new chain
    pub fn create(&mut self, spec: ChainSpec) -> ApprovalResult<ApprovalChain> {
        let mut chain = ApprovalChain::new(spec.name)
            .with_description(spec.description)
            .with_notification_settings(spec.notification_settings);
        chain.escalation_rules = spec.escalation_rules;
        for level in spec.levels {
            chain.add_level(level)?;
        }
        chain.validate()?;

        tracing::info!(chain_id = %chain.id, name = %chain.name, "approval chain registered");
        self.chains.insert(chain.id.clone(), chain.clone());
        Ok(chain)
    }

    /// Apply an administrative edit. Replacement levels are validated
    /// before anything is touched, so a bad update leaves the chain
    /// unchanged.
    pub fn update(&mut self, id: &ChainId, update: ChainUpdate) -> ApprovalResult<ApprovalChain> {
        let chain = self
            .chains
            .get_mut(id)
            .ok_or_else(|| ApprovalError::ChainNotFound(id.clone()))?;

        if let Some(levels) = update.levels {
            let mut candidate = ApprovalChain::new(chain.name.clone());
            for level in levels {
                candidate.add_level(level)?;
            }
            candidate.validate()?;
            chain.levels = candidate.levels;
        }
        if let Some(name) = update.name {
            chain.name = name;
        }
        if let Some(description) = update.description {
            chain.description = description;
        }
        if let Some(rules) = update.escalation_rules {
            chain.escalation_rules = rules;
        }
        if let Some(settings) = update.notification_settings {
            chain.notification_settings = settings;
        }
        chain.updated_at = Utc::now();

        tracing::info!(chain_id = %id, "approval chain updated");
        Ok(chain.clone())
    }

    /// Remove a chain; `None` if it was absent
    pub fn remove(&mut self, id: &ChainId) -> Option<ApprovalChain> {
        let removed = self.chains.remove(id);
        if removed.is_some() {
            tracing::info!(chain_id = %id, "approval chain removed");
        }
        removed
    }

    /// Get a chain by id
    pub fn get(&self, id: &ChainId) -> Option<&ApprovalChain> {
        self.chains.get(id)
    }

    /// List all registered chains
    pub fn all(&self) -> Vec<&ApprovalChain> {
        self.chains.values().collect()
    }

    /// Check if a chain exists
    pub fn contains(&self, id: &ChainId) -> bool {
        self.chains.contains_key(id)
    }

    /// Total number of registered chains
    pub fn count(&self) -> usize {
        self.chains.len()
    }

    fn ensure_builtins(&mut self) {
        for chain in builtin_chains() {
            self.chains.entry(chain.id.clone()).or_insert(chain);
        }
    }
}

// ── Built-in chains ──────────────────────────────────────────────────

fn builtin_chains() -> Vec<ApprovalChain> {
    let mut ticket = ApprovalChain::new("Ticket publication")
        .with_id(ChainId::new("ticket"))
        .with_description("Single sign-off before a ticket goes public");
    ticket.levels = vec![ApprovalLevel::new(1, "Lead Review")
        .with_approver_role(RoleId::new("lead"))
        .with_timeout_hours(24)
        .with_escalate_to(EscalationTarget::Role {
            role: RoleId::new("admin"),
        })];

    let mut prd = ApprovalChain::new("PRD approval")
        .with_id(ChainId::new("prd"))
        .with_description("Product then engineering sign-off for PRDs");
    prd.levels = vec![
        ApprovalLevel::new(1, "Product Review")
            .with_approver_role(RoleId::new("product-manager"))
            .with_timeout_hours(48)
            .with_escalate_to(EscalationTarget::NextLevel),
        ApprovalLevel::new(2, "Engineering Review")
            .with_approver_role(RoleId::new("eng-lead"))
            .with_timeout_hours(48)
            .with_escalate_to(EscalationTarget::Role {
                role: RoleId::new("admin"),
            }),
    ];

    let mut release = ApprovalChain::new("Release authorization")
        .with_id(ChainId::new("release"))
        .with_description("Four-stage sign-off for production releases");
    release.levels = vec![
        ApprovalLevel::new(1, "QA Signoff")
            .with_approver_role(RoleId::new("qa"))
            .with_timeout_hours(24)
            .with_escalate_to(EscalationTarget::NextLevel),
        ApprovalLevel::new(2, "Engineering Approval")
            .with_approver_role(RoleId::new("eng-lead"))
            .with_required_approvals(2)
            .with_timeout_hours(24)
            .with_escalate_to(EscalationTarget::NextLevel),
        ApprovalLevel::new(3, "Security Review")
            .with_approver_role(RoleId::new("security"))
            .with_timeout_hours(48)
            .with_escalate_to(EscalationTarget::NextLevel),
        ApprovalLevel::new(4, "Release Authorization")
            .with_approver_role(RoleId::new("release-manager"))
            .with_timeout_hours(12)
            .with_escalate_to(EscalationTarget::Role {
                role: RoleId::new("admin"),
            }),
    ];

    vec![ticket, prd, release]
}
