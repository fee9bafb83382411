use crate::common::*;
use casework_core::case::CaseRepository;
use casework_core::constants::events;
use casework_core::context::{Answer, AnswerKind, ContextStatus, RiskAssessment};
use casework_core::decision::{BlockingReason, Decision, FixedSampling};
use casework_core::error::CaseworkError;
use casework_core::orchestration::{DomainEvent, PassOutcome};
use casework_core::state_machine::TaskState;
use casework_core::store::ContextStore;
use uuid::Uuid;

async fn answer_all(harness: &Harness, correlation_id: Uuid, answers: Vec<Answer>) -> PassOutcome {
    let mut last = None;
    for answer in answers {
        last = Some(
            harness
                .orchestrator
                .handle(DomainEvent::answer(correlation_id, answer))
                .await
                .unwrap(),
        );
    }
    last.expect("at least one answer")
}

#[tokio::test]
async fn test_lookups_are_requested_together_and_not_republished() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    let outcome = harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();
    assert_eq!(outcome, PassOutcome::Suspended { published: 3 });

    let kinds: Vec<AnswerKind> = harness
        .publisher
        .requests()
        .iter()
        .map(|m| m.request_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            AnswerKind::RiskAssessment,
            AnswerKind::Guardianship,
            AnswerKind::OpenManualTasks
        ]
    );

    // The risk answer completes one lookup; the others stay pending without a new publish
    let outcome = harness
        .orchestrator
        .handle(DomainEvent::answer(correlation_id, clean_risk(&need)))
        .await
        .unwrap();
    assert_eq!(outcome, PassOutcome::Suspended { published: 0 });
    assert_eq!(harness.publisher.requests().len(), 3);

    let snapshot = harness.store.load(correlation_id).await.unwrap().unwrap();
    let pending: Vec<AnswerKind> = snapshot.pending_requests.iter().map(|r| r.kind()).collect();
    assert_eq!(
        pending,
        vec![AnswerKind::Guardianship, AnswerKind::OpenManualTasks]
    );
    assert!(harness
        .repository
        .risk_assessment(&need.period_key())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_clean_case_is_approved_automatically() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();
    let outcome = answer_all(&harness, correlation_id, clean_answers(&need)).await;

    assert_eq!(outcome, PassOutcome::Completed);
    let record = harness
        .repository
        .decision(&need.period_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.decision, Decision::Automatic);
    assert!(harness.repository.tasks().is_empty());
    assert_eq!(
        harness.observer.notifications(),
        vec![events::CASE_AUTO_APPROVED.to_string()]
    );

    let snapshot = harness.store.load(correlation_id).await.unwrap().unwrap();
    assert_eq!(snapshot.status, ContextStatus::Done);
    assert!(snapshot.pending_requests.is_empty());
}

#[tokio::test]
async fn test_sampled_case_is_routed_to_manual_with_a_task() {
    let harness = Harness::builder().with_sampling(FixedSampling(true)).build();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();
    let outcome = answer_all(&harness, correlation_id, clean_answers(&need)).await;

    assert_eq!(outcome, PassOutcome::Completed);
    let record = harness
        .repository
        .decision(&need.period_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.decision.reasons(), &[BlockingReason::Sampled]);

    let tasks = harness.repository.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].state, TaskState::AwaitingCaseworker);
    assert_eq!(
        harness.observer.notifications(),
        vec![events::CASE_ROUTED_TO_MANUAL.to_string()]
    );
}

#[tokio::test]
async fn test_blocking_signals_route_to_manual_without_sampling() {
    let harness = Harness::builder().with_sampling(FixedSampling(true)).build();
    let need = ApprovalNeedBuilder::new().with_warning("RV_IM_1").build();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();
    let answers = vec![
        Answer::RiskAssessment(RiskAssessment {
            vedtaksperiode_id: need.vedtaksperiode_id,
            may_auto_approve: false,
            findings: vec!["8-4 ML".to_string()],
        }),
        no_guardian(),
        no_open_tasks(),
    ];
    answer_all(&harness, correlation_id, answers).await;

    let record = harness
        .repository
        .decision(&need.period_key())
        .await
        .unwrap()
        .unwrap();
    let codes: Vec<&str> = record.decision.reasons().iter().map(|r| r.code()).collect();
    assert_eq!(codes, vec!["risk_assessment_blocks", "active_warnings"]);

    // Blocked cases never consume a sampling draw
    assert!(harness
        .repository
        .sampling_draw(need.vedtaksperiode_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_redelivered_start_resumes_without_republishing() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();
    let outcome = harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();

    assert_eq!(outcome, PassOutcome::Suspended { published: 0 });
    assert_eq!(harness.publisher.requests().len(), 3);
}

#[tokio::test]
async fn test_duplicate_message_is_not_processed_twice() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();

    let answer = DomainEvent::answer(correlation_id, clean_risk(&need));
    let first = harness.orchestrator.handle(answer.clone()).await.unwrap();
    let again = harness.orchestrator.handle(answer).await.unwrap();

    assert_eq!(first, PassOutcome::Suspended { published: 0 });
    assert_eq!(again, PassOutcome::Duplicate);
}

#[tokio::test]
async fn test_same_answer_under_new_message_id_changes_nothing() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();

    let first = harness
        .orchestrator
        .handle(DomainEvent::answer(correlation_id, clean_risk(&need)))
        .await
        .unwrap();
    let before = harness.store.load(correlation_id).await.unwrap().unwrap();
    let again = harness
        .orchestrator
        .handle(DomainEvent::answer(correlation_id, clean_risk(&need)))
        .await
        .unwrap();
    let after = harness.store.load(correlation_id).await.unwrap().unwrap();

    assert_eq!(first, PassOutcome::Suspended { published: 0 });
    assert_eq!(again, first);
    assert_eq!(harness.publisher.requests().len(), 3);
    assert_eq!(after.pending_requests, before.pending_requests);
    assert_eq!(after.answers, before.answers);

    let outcome = answer_all(
        &harness,
        correlation_id,
        vec![no_guardian(), no_open_tasks()],
    )
    .await;
    assert_eq!(outcome, PassOutcome::Completed);
    assert_eq!(harness.repository.decision_count(), 1);
    assert_eq!(harness.publisher.requests().len(), 3);
}

#[tokio::test]
async fn test_risk_answer_for_another_period_is_rejected() {
    let harness = Harness::new();
    let need = approval_need();
    let other = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();

    let result = harness
        .orchestrator
        .handle(DomainEvent::answer(correlation_id, clean_risk(&other)))
        .await;

    assert!(matches!(result, Err(CaseworkError::ValidationError(_))));
    let snapshot = harness.store.load(correlation_id).await.unwrap().unwrap();
    assert_eq!(snapshot.status, ContextStatus::Suspended);
    assert_eq!(snapshot.pending_requests.len(), 3);
    assert!(harness
        .repository
        .risk_assessment(&need.period_key())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_events_for_completed_context_are_ignored() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();
    answer_all(&harness, correlation_id, clean_answers(&need)).await;

    let outcome = harness
        .orchestrator
        .handle(DomainEvent::answer(correlation_id, no_guardian()))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PassOutcome::IgnoredTerminal {
            status: ContextStatus::Done
        }
    );
    assert_eq!(harness.repository.decision_count(), 1);
}

#[tokio::test]
async fn test_answer_for_unknown_context_is_rejected() {
    let harness = Harness::new();
    let need = approval_need();

    let result = harness
        .orchestrator
        .handle(DomainEvent::answer(Uuid::new_v4(), clean_risk(&need)))
        .await;

    assert!(matches!(result, Err(CaseworkError::ValidationError(_))));
    assert!(harness.publisher.requests().is_empty());
}

#[tokio::test]
async fn test_finalization_completes_review_and_task() {
    let harness = Harness::new();
    let need = approval_need();
    let period = need.period_key();

    let mut review = casework_core::state_machine::TwoPersonReview::new(period);
    review.submit_to_reviewer("S111111", "B222222").unwrap();
    harness.repository.seed_review(review);
    harness
        .repository
        .seed_task(casework_core::state_machine::CaseTask::new(period));

    let outcome = harness
        .orchestrator
        .handle(start_finalization(
            Uuid::new_v4(),
            &decision_made(need.vedtaksperiode_id, "B222222"),
        ))
        .await
        .unwrap();

    assert_eq!(outcome, PassOutcome::Completed);
    let review = harness
        .repository
        .review(need.vedtaksperiode_id)
        .await
        .unwrap()
        .unwrap();
    assert!(review.is_finalized());
    assert_eq!(review.approver.as_deref(), Some("B222222"));
    assert_eq!(harness.repository.tasks()[0].state, TaskState::Completed);
    assert_eq!(
        harness.observer.notifications(),
        vec![events::CASE_FINALIZED.to_string()]
    );
}

#[tokio::test]
async fn test_finalization_without_review_or_task_is_a_no_op() {
    let harness = Harness::new();

    let outcome = harness
        .orchestrator
        .handle(start_finalization(
            Uuid::new_v4(),
            &decision_made(Uuid::new_v4(), "B222222"),
        ))
        .await
        .unwrap();

    assert_eq!(outcome, PassOutcome::Completed);
    assert!(harness.observer.notifications().is_empty());
}
