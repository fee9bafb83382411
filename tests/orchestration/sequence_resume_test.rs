use crate::common::*;
use casework_core::case::{CasePayload, SequenceRegistry};
use casework_core::context::{AnswerKind, ContextStatus, ExecutionContext, SequenceKind};
use casework_core::orchestration::{DomainEvent, PassOutcome, RunMode, Sequence, StepOutcome};
use casework_core::store::ContextStore;
use std::sync::Arc;
use uuid::Uuid;

fn three_step_sequence(journal: &Arc<StepJournal>) -> Sequence {
    Sequence::new("three_steps")
        .then(AnswerGatedStep::new(
            "a",
            AnswerKind::RiskAssessment,
            journal.clone(),
        ))
        .then(AnswerGatedStep::new(
            "b",
            AnswerKind::Guardianship,
            journal.clone(),
        ))
        .then(AnswerGatedStep::new(
            "c",
            AnswerKind::OpenManualTasks,
            journal.clone(),
        ))
}

fn harness_with(journal: &Arc<StepJournal>) -> Harness {
    Harness::builder()
        .with_sequences(
            SequenceRegistry::new().with(SequenceKind::Approval, three_step_sequence(journal)),
        )
        .build()
}

#[tokio::test]
async fn test_suspend_resume_matches_uninterrupted_run() {
    let need = approval_need();
    let answers = clean_answers(&need);

    // Uninterrupted: every answer is on the context before the first step runs
    let uninterrupted = StepJournal::new();
    let mut ctx = ExecutionContext::new(
        Uuid::new_v4(),
        SequenceKind::Approval,
        CasePayload::Approval(need.clone()),
    );
    for answer in &answers {
        ctx.add_answer(answer.clone());
    }
    let outcome = three_step_sequence(&uninterrupted)
        .run(&mut ctx, RunMode::Execute)
        .await
        .unwrap();
    assert_eq!(outcome, StepOutcome::Done);

    // Suspended after every step and resumed by the matching answer
    let journal = StepJournal::new();
    let harness = harness_with(&journal);
    let correlation_id = Uuid::new_v4();

    let outcome = harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();
    assert_eq!(outcome, PassOutcome::Suspended { published: 1 });

    let mut last = outcome;
    for answer in &answers {
        last = harness
            .orchestrator
            .handle(DomainEvent::answer(correlation_id, answer.clone()))
            .await
            .unwrap();
    }

    assert_eq!(last, PassOutcome::Completed);
    assert_eq!(journal.effects(), uninterrupted.effects());
    assert_eq!(journal.effects(), vec!["a", "b", "c"]);
    assert_eq!(harness.publisher.requests().len(), 3);
}

#[tokio::test]
async fn test_resume_enters_first_incomplete_step_only_in_resume_mode() {
    let journal = StepJournal::new();
    let harness = harness_with(&journal);
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();
    harness
        .orchestrator
        .handle(DomainEvent::answer(correlation_id, clean_risk(&need)))
        .await
        .unwrap();

    assert_eq!(
        journal.entries(),
        vec![
            ("a".to_string(), RunMode::Execute),
            ("a".to_string(), RunMode::Resume),
            ("b".to_string(), RunMode::Execute),
        ]
    );
    assert_eq!(journal.effects(), vec!["a"]);
}

#[tokio::test]
async fn test_later_step_never_runs_before_earlier_one_is_done() {
    let journal = StepJournal::new();
    let harness = harness_with(&journal);
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();

    // The answer for the last step arrives first
    let outcome = harness
        .orchestrator
        .handle(DomainEvent::answer(correlation_id, no_open_tasks()))
        .await
        .unwrap();
    assert_eq!(outcome, PassOutcome::Suspended { published: 0 });
    assert!(journal.effects().is_empty());
    assert!(journal.entries().iter().all(|(name, _)| name == "a"));

    harness
        .orchestrator
        .handle(DomainEvent::answer(correlation_id, clean_risk(&need)))
        .await
        .unwrap();
    let outcome = harness
        .orchestrator
        .handle(DomainEvent::answer(correlation_id, no_guardian()))
        .await
        .unwrap();

    assert_eq!(outcome, PassOutcome::Completed);
    assert_eq!(journal.effects(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_suspended_context_is_persisted_with_pending_requests() {
    let journal = StepJournal::new();
    let harness = harness_with(&journal);
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();

    let snapshot = harness.store.load(correlation_id).await.unwrap().unwrap();
    assert_eq!(snapshot.status, ContextStatus::Suspended);
    assert_eq!(snapshot.pending_requests, vec![request_for(AnswerKind::RiskAssessment)]);
    assert!(snapshot.answers.is_empty());
}
