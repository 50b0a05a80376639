//! End-to-end flows through the engine facade: multi-level sign-off,
//! veto, timeout escalation, and snapshot reload.

use approval_engine::{ApprovalEngine, EngineConfig};
use approval_store::{JsonFileStore, MemoryStore};
use approval_types::{
    ApprovalError, ApprovalLevel, ChainSpec, EscalationRule, EscalationTarget, RequestSpec,
    RequestStatus, RoleId, UserId, Vote,
};
use std::sync::Arc;

fn engine() -> ApprovalEngine {
    ApprovalEngine::new(Arc::new(MemoryStore::new()))
}

async fn create_chain(engine: &ApprovalEngine, spec: ChainSpec) -> approval_types::ApprovalChain {
    engine.create_chain(spec).await.unwrap()
}

async fn open_request(
    engine: &ApprovalEngine,
    chain: &approval_types::ApprovalChain,
) -> approval_types::ApprovalRequest {
    engine
        .create_request(RequestSpec::new(
            chain.id.clone(),
            "doc",
            "DOC-1",
            UserId::new("author"),
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn two_level_chain_advances_then_approves() {
    // Scenario A: two levels, quorum 1 each.
    let engine = engine();
    let chain = create_chain(
        &engine,
        ChainSpec::new("Two step")
            .with_level(ApprovalLevel::new(1, "First"))
            .with_level(ApprovalLevel::new(2, "Second")),
    )
    .await;
    let request = open_request(&engine, &chain).await;
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.current_level, 1);

    let after_first = engine
        .approve(&request.id, Vote::new(UserId::new("a")))
        .await
        .unwrap();
    assert_eq!(after_first.current_level, 2);
    assert_eq!(after_first.status, RequestStatus::Pending);

    let after_second = engine
        .approve(&request.id, Vote::new(UserId::new("b")))
        .await
        .unwrap();
    assert_eq!(after_second.status, RequestStatus::Approved);
    assert!(after_second.completed_at.is_some());
}

#[tokio::test]
async fn single_level_quorum_of_two() {
    // Scenario B: one level, two distinct approvals required.
    let engine = engine();
    let chain = create_chain(
        &engine,
        ChainSpec::new("Pair").with_level(ApprovalLevel::new(1, "Review").with_required_approvals(2)),
    )
    .await;
    let request = open_request(&engine, &chain).await;

    let after_first = engine
        .approve(&request.id, Vote::new(UserId::new("a")))
        .await
        .unwrap();
    assert_eq!(after_first.status, RequestStatus::Pending);
    assert_eq!(
        engine
            .progress(&request.id)
            .await
            .unwrap()
            .approvals_at_current_level,
        1
    );

    let after_second = engine
        .approve(&request.id, Vote::new(UserId::new("b")))
        .await
        .unwrap();
    assert_eq!(after_second.status, RequestStatus::Approved);
}

#[tokio::test]
async fn one_scan_escalates_to_next_level() {
    // Scenario C: lapsed deadline, escalate_to = next level.
    let engine = engine();
    let chain = create_chain(
        &engine,
        ChainSpec::new("Timed")
            .with_level(
                ApprovalLevel::new(1, "First")
                    .with_timeout_hours(0)
                    .with_escalate_to(EscalationTarget::NextLevel),
            )
            .with_level(ApprovalLevel::new(2, "Second")),
    )
    .await;
    let request = open_request(&engine, &chain).await;

    let escalated = engine.check_timeouts().await;
    assert_eq!(escalated.len(), 1);

    let after = engine.get_request(&request.id).await.unwrap();
    assert_eq!(after.status, RequestStatus::Escalated);
    assert_eq!(after.current_level, 2);
    assert_eq!(after.escalation_history.len(), 1);
    let record = &after.escalation_history[0];
    assert_eq!(record.from_level, 1);
    assert_eq!(record.to_level, 2);
    assert_eq!(record.reason, "Timeout exceeded");

    // The same scan run again is a no-op: the request is no longer
    // pending.
    assert!(engine.check_timeouts().await.is_empty());
    let unchanged = engine.get_request(&request.id).await.unwrap();
    assert_eq!(unchanged.escalation_history.len(), 1);
}

#[tokio::test]
async fn cancel_semantics() {
    // Scenario D: cancel on approved fails, cancel on pending works.
    let engine = engine();
    let chain = create_chain(
        &engine,
        ChainSpec::new("Single").with_level(ApprovalLevel::new(1, "Review")),
    )
    .await;

    let approved = open_request(&engine, &chain).await;
    engine
        .approve(&approved.id, Vote::new(UserId::new("a")))
        .await
        .unwrap();
    let result = engine.cancel(&approved.id).await;
    assert!(matches!(result, Err(ApprovalError::InvalidState { .. })));

    let pending = open_request(&engine, &chain).await;
    let cancelled = engine.cancel(&pending.id).await.unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());
}

#[tokio::test]
async fn rejection_vetoes_despite_prior_approvals() {
    let engine = engine();
    let chain = create_chain(
        &engine,
        ChainSpec::new("Deep")
            .with_level(ApprovalLevel::new(1, "First"))
            .with_level(ApprovalLevel::new(2, "Second"))
            .with_level(ApprovalLevel::new(3, "Third")),
    )
    .await;
    let request = open_request(&engine, &chain).await;

    engine
        .approve(&request.id, Vote::new(UserId::new("a")))
        .await
        .unwrap();
    engine
        .approve(&request.id, Vote::new(UserId::new("b")))
        .await
        .unwrap();

    let rejected = engine
        .reject(
            &request.id,
            Vote::new(UserId::new("c")).with_comment("not ready"),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert!(rejected.completed_at.is_some());

    // Terminal: no further votes accepted.
    let result = engine
        .approve(&request.id, Vote::new(UserId::new("d")))
        .await;
    assert!(matches!(result, Err(ApprovalError::InvalidState { .. })));
}

#[tokio::test]
async fn escalated_request_still_counts_votes() {
    let engine = engine();
    let chain = create_chain(
        &engine,
        ChainSpec::new("Escalatable")
            .with_level(
                ApprovalLevel::new(1, "First")
                    .with_timeout_hours(0)
                    .with_escalate_to(EscalationTarget::Role {
                        role: RoleId::new("admin"),
                    }),
            )
            .with_level(ApprovalLevel::new(2, "Second")),
    )
    .await;
    let request = open_request(&engine, &chain).await;

    engine.check_timeouts().await;
    let escalated = engine.get_request(&request.id).await.unwrap();
    assert_eq!(escalated.status, RequestStatus::Escalated);
    assert_eq!(escalated.current_level, 1);

    // A late approval satisfies level 1's quorum and returns the
    // request to pending at level 2.
    let after = engine
        .approve(&request.id, Vote::new(UserId::new("a")))
        .await
        .unwrap();
    assert_eq!(after.status, RequestStatus::Pending);
    assert_eq!(after.current_level, 2);
    assert_eq!(after.escalation_history.len(), 1);
}

#[tokio::test]
async fn chain_rule_escalates_old_request() {
    let engine = engine();
    let chain = create_chain(
        &engine,
        ChainSpec::new("Ruled")
            .with_level(ApprovalLevel::new(1, "Review"))
            .with_escalation_rule(EscalationRule::new(0).with_target(EscalationTarget::None)),
    )
    .await;
    let request = open_request(&engine, &chain).await;

    let escalated = engine.check_timeouts().await;
    assert_eq!(escalated.len(), 1);

    let after = engine.get_request(&request.id).await.unwrap();
    assert_eq!(after.status, RequestStatus::Escalated);
    assert_eq!(after.current_level, 1);
    assert_eq!(
        after.escalation_history[0].reason,
        "Escalation rule triggered after 0 hours"
    );
}

#[tokio::test]
async fn manual_escalation() {
    let engine = engine();
    let chain = create_chain(
        &engine,
        ChainSpec::new("Manual")
            .with_level(ApprovalLevel::new(1, "First").with_escalate_to(EscalationTarget::NextLevel))
            .with_level(ApprovalLevel::new(2, "Second")),
    )
    .await;
    let request = open_request(&engine, &chain).await;

    let escalated = engine
        .escalate(&request.id, "blocking the sprint")
        .await
        .unwrap();
    assert_eq!(escalated.status, RequestStatus::Escalated);
    assert_eq!(escalated.current_level, 2);
    assert_eq!(escalated.escalation_history[0].reason, "blocking the sprint");

    // Already escalated: a second manual escalation is refused.
    let result = engine.escalate(&request.id, "again").await;
    assert!(matches!(result, Err(ApprovalError::InvalidState { .. })));
}

#[tokio::test]
async fn progress_tracks_levels_and_votes() {
    let engine = engine();
    let chain = create_chain(
        &engine,
        ChainSpec::new("Release")
            .with_level(ApprovalLevel::new(1, "QA"))
            .with_level(ApprovalLevel::new(2, "Engineering").with_required_approvals(2))
            .with_level(ApprovalLevel::new(3, "Authorization")),
    )
    .await;
    let request = open_request(&engine, &chain).await;

    let fresh = engine.progress(&request.id).await.unwrap();
    assert_eq!(fresh.percent_complete, 0);
    assert_eq!(fresh.total_levels, 3);
    assert_eq!(fresh.current_level_name, "QA");

    engine
        .approve(&request.id, Vote::new(UserId::new("a")))
        .await
        .unwrap();
    engine
        .approve(&request.id, Vote::new(UserId::new("b")))
        .await
        .unwrap();

    // At level 2 with one of two votes: round(((2-1) + 0.5) / 3 * 100).
    let midway = engine.progress(&request.id).await.unwrap();
    assert_eq!(midway.current_level, 2);
    assert_eq!(midway.percent_complete, 50);

    engine
        .approve(&request.id, Vote::new(UserId::new("c")))
        .await
        .unwrap();
    engine
        .approve(&request.id, Vote::new(UserId::new("d")))
        .await
        .unwrap();
    let done = engine.progress(&request.id).await.unwrap();
    assert_eq!(done.percent_complete, 100);
}

#[tokio::test]
async fn snapshot_survives_restart_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("approvals.json");

    let request_id = {
        let engine = ApprovalEngine::new(Arc::new(JsonFileStore::new(path.clone())));
        let chain = create_chain(
            &engine,
            ChainSpec::new("Durable").with_level(ApprovalLevel::new(1, "Review").with_required_approvals(2)),
        )
        .await;
        let request = open_request(&engine, &chain).await;
        engine
            .approve(&request.id, Vote::new(UserId::new("a")))
            .await
            .unwrap();
        request.id
    };

    let reloaded = ApprovalEngine::load(
        Arc::new(JsonFileStore::new(path)),
        EngineConfig::default(),
    )
    .await
    .unwrap();

    let request = reloaded.get_request(&request_id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.approvals_at_level(1), 1);

    // The restored request keeps moving through the restored chain.
    let approved = reloaded
        .approve(&request_id, Vote::new(UserId::new("b")))
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
}

#[tokio::test(start_paused = true)]
async fn background_checker_escalates_and_stops() {
    let engine = ApprovalEngine::with_config(
        Arc::new(MemoryStore::new()),
        EngineConfig {
            timeout_check_interval_secs: 60,
        },
    );
    let chain = create_chain(
        &engine,
        ChainSpec::new("Watched")
            .with_level(
                ApprovalLevel::new(1, "First")
                    .with_timeout_hours(0)
                    .with_escalate_to(EscalationTarget::NextLevel),
            )
            .with_level(ApprovalLevel::new(2, "Second")),
    )
    .await;
    let request = open_request(&engine, &chain).await;

    engine.start_timeout_checker().await;
    // The first scan runs on start; give the spawned task a turn.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let after = engine.get_request(&request.id).await.unwrap();
    assert_eq!(after.status, RequestStatus::Escalated);
    assert_eq!(after.escalation_history.len(), 1);

    // Further ticks leave the escalated request alone.
    tokio::time::sleep(std::time::Duration::from_secs(130)).await;
    let unchanged = engine.get_request(&request.id).await.unwrap();
    assert_eq!(unchanged.escalation_history.len(), 1);

    engine.stop_timeout_checker().await;

    // With the checker stopped, a new overdue request stays pending.
    let late = open_request(&engine, &chain).await;
    tokio::time::sleep(std::time::Duration::from_secs(130)).await;
    let still_pending = engine.get_request(&late.id).await.unwrap();
    assert_eq!(still_pending.status, RequestStatus::Pending);
}
