//! Approval engine: the main entry point for the approval workflow
//!
//! The engine composes the chain registry, the request store, the
//! lifecycle state machine, and the timeout checker behind one facade.
//! It owns the concurrency story: every request mutation runs under
//! that request's own async lock. Two approvers racing the same
//! quorum, or a vote racing the background timeout scan, serialize
//! per request without blocking unrelated requests.
//!
//! Durability trade-off: mutations update in-memory state first and
//! then write a snapshot through the [`SnapshotStore`]. A failed write
//! is logged and the mutation is kept, so a crash between the mutation
//! and a failed flush loses the last transition. Deployments that need
//! stronger guarantees should back the engine with a reliable store.

use crate::chain_registry::ChainRegistry;
use crate::config::EngineConfig;
use crate::request_store::RequestStore;
use crate::state_machine::StateMachine;
use crate::timeout_checker::TimeoutChecker;
use approval_store::{EngineSnapshot, SnapshotStore};
use approval_types::{
    ApprovalChain, ApprovalError, ApprovalProgress, ApprovalRequest, ApprovalResult, ChainId,
    ChainSpec, ChainUpdate, EscalationTarget, RequestId, RequestSpec, RoleId, UserId, Vote,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// The approval workflow engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ApprovalEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    chains: RwLock<ChainRegistry>,
    requests: RwLock<RequestStore>,
    /// Per-request mutation locks; entries are never removed since
    /// requests are never deleted
    request_locks: Mutex<HashMap<RequestId, Arc<Mutex<()>>>>,
    store: Arc<dyn SnapshotStore>,
    state_machine: StateMachine,
    timeout_checker: TimeoutChecker,
    running: RwLock<bool>,
    checker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ApprovalEngine {
    /// Create an engine with the built-in chains and nothing else
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn SnapshotStore>, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                chains: RwLock::new(ChainRegistry::new()),
                requests: RwLock::new(RequestStore::new()),
                request_locks: Mutex::new(HashMap::new()),
                store,
                state_machine: StateMachine::new(),
                timeout_checker: TimeoutChecker::new(),
                running: RwLock::new(false),
                checker_handle: Mutex::new(None),
            }),
        }
    }

    /// Restore an engine from the store's last snapshot. Built-ins
    /// missing from the snapshot are re-registered.
    pub async fn load(store: Arc<dyn SnapshotStore>, config: EngineConfig) -> ApprovalResult<Self> {
        let snapshot = store
            .load()
            .await
            .map_err(|e| ApprovalError::Store(e.to_string()))?;

        let engine = Self::with_config(store, config);
        *engine.inner.chains.write().await = ChainRegistry::from_chains(snapshot.chains);
        *engine.inner.requests.write().await = RequestStore::from_requests(snapshot.requests);
        Ok(engine)
    }

    // ── Chain management ─────────────────────────────────────────────

    /// Validate and register a new chain
    pub async fn create_chain(&self, spec: ChainSpec) -> ApprovalResult<ApprovalChain> {
        let chain = self.inner.chains.write().await.create(spec)?;
        self.persist().await;
        Ok(chain)
    }

    /// Apply an administrative edit to a chain
    pub async fn update_chain(
        &self,
        id: &ChainId,
        update: ChainUpdate,
    ) -> ApprovalResult<ApprovalChain> {
        let chain = self.inner.chains.write().await.update(id, update)?;
        self.persist().await;
        Ok(chain)
    }

    /// Delete a chain. Refuses while any open request still runs
    /// through it; returns `false` when the chain was absent.
    pub async fn delete_chain(&self, id: &ChainId) -> ApprovalResult<bool> {
        {
            let requests = self.inner.requests.read().await;
            if requests.has_open_for_chain(id) {
                return Err(ApprovalError::ChainInUse(id.clone()));
            }
        }
        let removed = self.inner.chains.write().await.remove(id).is_some();
        if removed {
            self.persist().await;
        }
        Ok(removed)
    }

    pub async fn get_chain(&self, id: &ChainId) -> Option<ApprovalChain> {
        self.inner.chains.read().await.get(id).cloned()
    }

    pub async fn all_chains(&self) -> Vec<ApprovalChain> {
        self.inner
            .chains
            .read()
            .await
            .all()
            .into_iter()
            .cloned()
            .collect()
    }

    // ── Request lifecycle ────────────────────────────────────────────

    /// Open a request against a chain. The deadline comes from the
    /// chain's first level.
    pub async fn create_request(&self, spec: RequestSpec) -> ApprovalResult<ApprovalRequest> {
        let chain = {
            let chains = self.inner.chains.read().await;
            chains
                .get(&spec.chain_id)
                .cloned()
                .ok_or_else(|| ApprovalError::ChainNotFound(spec.chain_id.clone()))?
        };

        let request = self.inner.state_machine.open_request(spec, &chain)?;
        self.inner.requests.write().await.insert(request.clone());
        tracing::info!(
            request_id = %request.id,
            chain_id = %request.chain_id,
            resource = %request.resource_id,
            "approval request created"
        );
        self.persist().await;
        Ok(request)
    }

    /// Record an approving vote
    pub async fn approve(&self, id: &RequestId, vote: Vote) -> ApprovalResult<ApprovalRequest> {
        let lock = self.request_lock(id).await;
        let _guard = lock.lock().await;

        let chain = self.chain_for_request(id).await?;
        let updated = {
            let mut requests = self.inner.requests.write().await;
            let request = requests
                .get_mut(id)
                .ok_or_else(|| ApprovalError::RequestNotFound(id.clone()))?;
            self.inner.state_machine.approve(request, &chain, vote)?;
            request.clone()
        };
        self.persist().await;
        Ok(updated)
    }

    /// Record a rejecting vote; finalizes the request (veto)
    pub async fn reject(&self, id: &RequestId, vote: Vote) -> ApprovalResult<ApprovalRequest> {
        let lock = self.request_lock(id).await;
        let _guard = lock.lock().await;

        let chain = self.chain_for_request(id).await?;
        let updated = {
            let mut requests = self.inner.requests.write().await;
            let request = requests
                .get_mut(id)
                .ok_or_else(|| ApprovalError::RequestNotFound(id.clone()))?;
            self.inner.state_machine.reject(request, &chain, vote)?;
            request.clone()
        };
        self.persist().await;
        Ok(updated)
    }

    /// Manually escalate a pending request
    pub async fn escalate(&self, id: &RequestId, reason: &str) -> ApprovalResult<ApprovalRequest> {
        self.escalate_with(id, reason, None).await
    }

    /// Cancel an open request
    pub async fn cancel(&self, id: &RequestId) -> ApprovalResult<ApprovalRequest> {
        let lock = self.request_lock(id).await;
        let _guard = lock.lock().await;

        let updated = {
            let mut requests = self.inner.requests.write().await;
            let request = requests
                .get_mut(id)
                .ok_or_else(|| ApprovalError::RequestNotFound(id.clone()))?;
            self.inner.state_machine.cancel(request)?;
            request.clone()
        };
        self.persist().await;
        Ok(updated)
    }

    pub async fn get_request(&self, id: &RequestId) -> Option<ApprovalRequest> {
        self.inner.requests.read().await.get(id).cloned()
    }

    pub async fn all_requests(&self) -> Vec<ApprovalRequest> {
        self.inner
            .requests
            .read()
            .await
            .all()
            .into_iter()
            .cloned()
            .collect()
    }

    // ── Query ────────────────────────────────────────────────────────

    /// How far a request has advanced, or `None` if it is unknown
    pub async fn progress(&self, id: &RequestId) -> Option<ApprovalProgress> {
        let chains = self.inner.chains.read().await;
        let requests = self.inner.requests.read().await;
        let request = requests.get(id)?;
        let chain = chains.get(&request.chain_id)?;
        ApprovalProgress::compute(request, chain)
    }

    /// Open requests awaiting a vote from this user (or their role) at
    /// the current level
    pub async fn pending_for_user(
        &self,
        user: &UserId,
        role: Option<&RoleId>,
    ) -> Vec<ApprovalRequest> {
        let chains = self.inner.chains.read().await;
        let requests = self.inner.requests.read().await;
        requests
            .all()
            .into_iter()
            .filter(|r| r.is_open())
            .filter(|r| {
                chains
                    .get(&r.chain_id)
                    .and_then(|c| c.level(r.current_level))
                    .map(|level| {
                        level.is_approver(user, role) && !r.has_voted_at(user, r.current_level)
                    })
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// All requests for one resource instance, any status. Callers use
    /// this to refuse duplicate open requests per resource.
    pub async fn requests_for_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Vec<ApprovalRequest> {
        self.inner
            .requests
            .read()
            .await
            .by_resource(resource_type, resource_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Whether this user could cast a vote right now. Advisory: the
    /// mutators do not call it, enforcement belongs to the caller.
    pub async fn can_user_approve(
        &self,
        id: &RequestId,
        user: &UserId,
        role: Option<&RoleId>,
    ) -> bool {
        let chains = self.inner.chains.read().await;
        let requests = self.inner.requests.read().await;
        let Some(request) = requests.get(id) else {
            return false;
        };
        if !request.is_open() {
            return false;
        }
        chains
            .get(&request.chain_id)
            .and_then(|c| c.level(request.current_level))
            .map(|level| {
                level.is_approver(user, role)
                    && !request.has_voted_at(user, request.current_level)
            })
            .unwrap_or(false)
    }

    // ── Timeout checking ─────────────────────────────────────────────

    /// One scan over pending requests: escalate everything whose
    /// deadline or chain rule has lapsed. Returns the requests
    /// escalated by this scan. Failures on one request are logged and
    /// do not stop the rest.
    pub async fn check_timeouts(&self) -> Vec<ApprovalRequest> {
        let due = {
            let chains = self.inner.chains.read().await;
            let requests = self.inner.requests.read().await;
            self.inner
                .timeout_checker
                .due_escalations(requests.all(), &chains, Utc::now())
        };

        let mut escalated = Vec::new();
        for item in due {
            match self
                .escalate_with(&item.request_id, &item.reason, item.target_override.as_ref())
                .await
            {
                Ok(request) => escalated.push(request),
                Err(e) => {
                    tracing::error!(
                        request_id = %item.request_id,
                        error = %e,
                        "timeout escalation failed"
                    );
                }
            }
        }
        escalated
    }

    /// Start the background timeout checker. No-op if already running;
    /// the first scan happens immediately.
    pub async fn start_timeout_checker(&self) {
        {
            let mut running = self.inner.running.write().await;
            if *running {
                return;
            }
            *running = true;
        }

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(
                engine.inner.config.timeout_check_interval_secs,
            ));

            loop {
                interval.tick().await;

                if !*engine.inner.running.read().await {
                    break;
                }

                let escalated = engine.check_timeouts().await;
                if !escalated.is_empty() {
                    tracing::info!(count = escalated.len(), "requests escalated on timeout");
                }
            }
        });

        *self.inner.checker_handle.lock().await = Some(handle);
        tracing::info!(
            interval_secs = self.inner.config.timeout_check_interval_secs,
            "timeout checker started"
        );
    }

    /// Stop the background timeout checker
    pub async fn stop_timeout_checker(&self) {
        *self.inner.running.write().await = false;
        if let Some(handle) = self.inner.checker_handle.lock().await.take() {
            handle.abort();
        }
        tracing::info!("timeout checker stopped");
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn escalate_with(
        &self,
        id: &RequestId,
        reason: &str,
        target_override: Option<&EscalationTarget>,
    ) -> ApprovalResult<ApprovalRequest> {
        let lock = self.request_lock(id).await;
        let _guard = lock.lock().await;

        let chain = self.chain_for_request(id).await?;
        let updated = {
            let mut requests = self.inner.requests.write().await;
            let request = requests
                .get_mut(id)
                .ok_or_else(|| ApprovalError::RequestNotFound(id.clone()))?;
            self.inner
                .state_machine
                .escalate(request, &chain, reason, target_override)?;
            request.clone()
        };
        self.persist().await;
        Ok(updated)
    }

    async fn request_lock(&self, id: &RequestId) -> Arc<Mutex<()>> {
        let mut locks = self.inner.request_locks.lock().await;
        locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn chain_for_request(&self, id: &RequestId) -> ApprovalResult<ApprovalChain> {
        let chain_id = {
            let requests = self.inner.requests.read().await;
            requests
                .get(id)
                .ok_or_else(|| ApprovalError::RequestNotFound(id.clone()))?
                .chain_id
                .clone()
        };
        let chains = self.inner.chains.read().await;
        chains
            .get(&chain_id)
            .cloned()
            .ok_or(ApprovalError::ChainNotFound(chain_id))
    }

    /// Write both collections to the store. Failures are logged, not
    /// propagated; the in-memory mutation stays applied.
    async fn persist(&self) {
        let snapshot = {
            let chains = self.inner.chains.read().await;
            let requests = self.inner.requests.read().await;
            EngineSnapshot::new(
                chains.all().into_iter().cloned().collect(),
                requests.all().into_iter().cloned().collect(),
            )
        };
        if let Err(e) = self.inner.store.save(&snapshot).await {
            tracing::error!(error = %e, "snapshot save failed, in-memory state kept");
        }
    }
}
