use crate::common::*;
use casework_core::case::{CaseRepository, SequenceRegistry};
use casework_core::context::{AnswerKind, ContextStatus, SequenceKind};
use casework_core::error::{CaseworkError, ErrorClass};
use casework_core::decision::BlockingReason;
use casework_core::orchestration::{DomainEvent, PassOutcome, Sequence};
use casework_core::state_machine::{CaseTask, TaskState, TwoPersonReview};
use casework_core::store::ContextStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn test_unexpected_failure_parks_context_and_publishes_nothing() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();
    harness.repository.set_failing(true);

    let result = harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await;

    let error = result.unwrap_err();
    assert_eq!(error.classify(), ErrorClass::Fatal);
    assert!(matches!(error, CaseworkError::StepFailed { ref step, .. } if step == "fetch_risk_assessment"));
    assert!(harness.publisher.requests().is_empty());

    let snapshot = harness.store.load(correlation_id).await.unwrap().unwrap();
    assert_eq!(snapshot.status, ContextStatus::Failed);
    let failure = snapshot.failure.unwrap();
    assert_eq!(failure.class, ErrorClass::Fatal);
    assert_eq!(
        harness.observer.count(|e| matches!(e, Observed::Failed(_))),
        1
    );
}

#[tokio::test]
async fn test_replay_resumes_failed_context() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness.repository.set_failing(true);
    let _ = harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await;
    harness.repository.set_failing(false);

    let outcome = harness.orchestrator.replay(correlation_id).await.unwrap();

    assert_eq!(outcome, PassOutcome::Suspended { published: 3 });
    let snapshot = harness.store.load(correlation_id).await.unwrap().unwrap();
    assert_eq!(snapshot.status, ContextStatus::Suspended);
    assert!(snapshot.failure.is_none());
}

#[tokio::test]
async fn test_replay_only_applies_to_failed_contexts() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();

    let suspended = harness.orchestrator.replay(correlation_id).await;
    let unknown = harness.orchestrator.replay(Uuid::new_v4()).await;

    assert!(matches!(suspended, Err(CaseworkError::ValidationError(_))));
    assert!(matches!(unknown, Err(CaseworkError::ValidationError(_))));
}

#[tokio::test]
async fn test_failure_stops_the_sequence_at_the_failing_step() {
    let journal = StepJournal::new();
    let failing = Arc::new(AtomicBool::new(true));
    let sequence = Sequence::new("failing")
        .then(SwitchableFailureStep::new(
            "first",
            Arc::new(AtomicBool::new(false)),
            journal.clone(),
        ))
        .then(SwitchableFailureStep::new(
            "second",
            failing.clone(),
            journal.clone(),
        ))
        .then(AnswerGatedStep::new(
            "third",
            AnswerKind::Guardianship,
            journal.clone(),
        ));
    let harness = Harness::builder()
        .with_sequences(SequenceRegistry::new().with(SequenceKind::Approval, sequence))
        .build();
    let correlation_id = Uuid::new_v4();

    let result = harness
        .orchestrator
        .handle(start_approval(correlation_id, &approval_need()))
        .await;
    assert!(result.is_err());
    assert_eq!(journal.effects(), vec!["first"]);
    assert!(journal.entries().iter().all(|(name, _)| name != "third"));

    failing.store(false, Ordering::SeqCst);
    let outcome = harness.orchestrator.replay(correlation_id).await.unwrap();

    assert_eq!(outcome, PassOutcome::Suspended { published: 1 });
    assert_eq!(journal.effects(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_review_rule_violation_is_a_domain_failure() {
    let harness = Harness::new();
    let need = approval_need();
    let period = need.period_key();
    let correlation_id = Uuid::new_v4();

    let mut review = TwoPersonReview::new(period);
    review.submit_to_reviewer("S111111", "B222222").unwrap();
    harness.repository.seed_review(review);
    harness.repository.seed_task(CaseTask::new(period));

    // The submitter tries to approve their own decision
    let result = harness
        .orchestrator
        .handle(start_finalization(
            correlation_id,
            &decision_made(need.vedtaksperiode_id, "S111111"),
        ))
        .await;

    let error = result.unwrap_err();
    assert_eq!(error.classify(), ErrorClass::DomainRule);
    assert_eq!(
        error.as_domain().map(|e| e.code()),
        Some("reviewer_is_submitter")
    );

    let snapshot = harness.store.load(correlation_id).await.unwrap().unwrap();
    assert_eq!(snapshot.status, ContextStatus::Failed);
    assert_eq!(harness.repository.tasks()[0].state, TaskState::AwaitingCaseworker);
}

#[tokio::test]
async fn test_failed_commit_publishes_nothing() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();
    harness.store.set_failing_commits(true);

    let result = harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await;

    assert!(result.is_err());
    assert!(harness.publisher.requests().is_empty());
    assert!(harness.observer.events().is_empty());
    assert!(harness.store.load(correlation_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_replayed_decision_records_only_real_blocking_reasons() {
    let harness = Harness::new();
    let need = ApprovalNeedBuilder::new().with_warning("RV_IM_1").build();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();
    harness.repository.fail_next_decision_save();
    let mut last = None;
    for answer in clean_answers(&need) {
        last = Some(
            harness
                .orchestrator
                .handle(DomainEvent::answer(correlation_id, answer))
                .await,
        );
    }
    assert!(last.unwrap().is_err());
    assert!(harness.repository.tasks().is_empty());

    let outcome = harness.orchestrator.replay(correlation_id).await.unwrap();

    assert_eq!(outcome, PassOutcome::Completed);
    let record = harness
        .repository
        .decision(&need.period_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.decision.reasons(),
        &[BlockingReason::ActiveWarnings {
            codes: vec!["RV_IM_1".to_string()]
        }]
    );
    assert_eq!(harness.repository.tasks().len(), 1);
}
