use crate::common::*;
use casework_core::context::ContextStatus;
use casework_core::error::ErrorClass;
use casework_core::orchestration::{DomainEvent, PassOutcome};
use casework_core::store::ContextStore;
use futures::future::join_all;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn test_concurrent_answers_are_serialized_per_context() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();

    let passes = clean_answers(&need)
        .into_iter()
        .map(|answer| {
            harness
                .orchestrator
                .handle(DomainEvent::answer(correlation_id, answer))
        })
        .collect::<Vec<_>>();
    let outcomes: Vec<PassOutcome> = join_all(passes)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    // Whichever pass saw the last answer finished the sequence, exactly once
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == PassOutcome::Completed)
            .count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == PassOutcome::Suspended { published: 0 })
            .count(),
        2
    );
    assert_eq!(harness.repository.decision_count(), 1);
    assert_eq!(harness.publisher.requests().len(), 3);

    let snapshot = harness.store.load(correlation_id).await.unwrap().unwrap();
    assert_eq!(snapshot.status, ContextStatus::Done);
    assert_eq!(snapshot.processed_message_ids.len(), 4);
}

#[tokio::test]
async fn test_independent_contexts_run_in_parallel() {
    let harness = Harness::new();
    let needs: Vec<_> = (0..8).map(|_| approval_need()).collect();

    let passes = needs
        .iter()
        .map(|need| harness.orchestrator.handle(start_approval(Uuid::new_v4(), need)))
        .collect::<Vec<_>>();
    let outcomes = join_all(passes).await;

    assert!(outcomes
        .iter()
        .all(|o| matches!(o, Ok(PassOutcome::Suspended { published: 3 }))));
    assert_eq!(harness.publisher.requests().len(), 24);
}

#[tokio::test]
async fn test_locked_context_surfaces_as_transient_and_rolls_back() {
    let harness = Harness::builder()
        .with_lock_timeout(Duration::from_millis(20))
        .with_lock_retry_attempts(2)
        .build();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();

    // Another pass holds the context
    let held = harness.store.open(correlation_id).await.unwrap();
    let event = DomainEvent::answer(correlation_id, clean_risk(&need));
    let error = harness
        .orchestrator
        .handle(event.clone())
        .await
        .unwrap_err();
    assert_eq!(error.classify(), ErrorClass::Transient);
    drop(held);

    // Redelivery of the same message succeeds once the lock is released
    let outcome = harness.orchestrator.handle(event).await.unwrap();
    assert_eq!(outcome, PassOutcome::Suspended { published: 0 });
}
