use crate::common::*;
use casework_core::config::HousekeepingConfig;
use casework_core::context::{AnswerKind, ContextStatus};
use casework_core::orchestration::{DomainEvent, Housekeeping, PassOutcome};
use casework_core::store::ContextStore;
use chrono::{Duration, Utc};
use uuid::Uuid;

fn housekeeping(harness: &Harness) -> Housekeeping {
    Housekeeping::new(
        harness.store.clone(),
        harness.publisher.clone(),
        HousekeepingConfig::default(),
    )
}

#[tokio::test]
async fn test_unpublished_requests_stay_pending_and_are_republished() {
    let harness = Harness::new();
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness.publisher.set_failing(true);
    let outcome = harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();
    assert_eq!(outcome, PassOutcome::Suspended { published: 0 });

    // The pass committed even though the bus was down
    let snapshot = harness.store.load(correlation_id).await.unwrap().unwrap();
    assert_eq!(snapshot.status, ContextStatus::Suspended);
    assert_eq!(snapshot.pending_requests.len(), 3);

    harness.publisher.set_failing(false);
    let (contexts, requests) = housekeeping(&harness)
        .republish_outstanding(Utc::now() + Duration::minutes(1))
        .await
        .unwrap();

    assert_eq!((contexts, requests), (1, 3));
    let kinds: Vec<AnswerKind> = harness
        .publisher
        .requests()
        .iter()
        .map(|m| m.request_type)
        .collect();
    assert_eq!(kinds, AnswerKind::ALL.to_vec());
    assert!(harness
        .publisher
        .requests()
        .iter()
        .all(|m| m.correlation_id == correlation_id));
}

#[tokio::test]
async fn test_recent_contexts_are_not_republished() {
    let harness = Harness::new();
    harness
        .orchestrator
        .handle(start_approval(Uuid::new_v4(), &approval_need()))
        .await
        .unwrap();

    let (contexts, requests) = housekeeping(&harness)
        .republish_outstanding(Utc::now() - Duration::minutes(60))
        .await
        .unwrap();

    assert_eq!((contexts, requests), (0, 0));
    assert_eq!(harness.publisher.requests().len(), 3);
}

#[tokio::test]
async fn test_terminal_contexts_are_archived_after_retention() {
    let harness = Harness::new();
    let need = approval_need();
    let done = Uuid::new_v4();
    let suspended = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(done, &need))
        .await
        .unwrap();
    for answer in clean_answers(&need) {
        harness
            .orchestrator
            .handle(DomainEvent::answer(done, answer))
            .await
            .unwrap();
    }
    harness
        .orchestrator
        .handle(start_approval(suspended, &approval_need()))
        .await
        .unwrap();

    let archived = housekeeping(&harness)
        .archive_terminal(Utc::now() + Duration::minutes(1))
        .await
        .unwrap();

    assert_eq!(archived, 1);
    assert!(harness.store.load(done).await.unwrap().is_none());
    assert!(harness.store.load(suspended).await.unwrap().is_some());
}

#[tokio::test]
async fn test_republished_context_waits_a_full_window_before_the_next_sweep() {
    let harness = Harness::new();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &approval_need()))
        .await
        .unwrap();
    // The last pass was two hours ago
    let mut snapshot = harness.store.load(correlation_id).await.unwrap().unwrap();
    snapshot.updated_at = Utc::now() - Duration::hours(2);
    harness.store.seed(snapshot).await;

    let housekeeping = housekeeping(&harness);
    let threshold = Utc::now() - Duration::hours(1);

    assert_eq!(
        housekeeping.republish_outstanding(threshold).await.unwrap(),
        (1, 3)
    );
    assert_eq!(
        housekeeping.republish_outstanding(threshold).await.unwrap(),
        (0, 0)
    );
    assert_eq!(harness.publisher.requests().len(), 6);

    let touched = harness.store.load(correlation_id).await.unwrap().unwrap();
    assert_eq!(touched.status, ContextStatus::Suspended);
    assert!(touched.updated_at > threshold);
}

#[tokio::test]
async fn test_failed_republish_is_retried_on_the_next_sweep() {
    let harness = Harness::new();
    let correlation_id = Uuid::new_v4();

    harness.publisher.set_failing(true);
    harness
        .orchestrator
        .handle(start_approval(correlation_id, &approval_need()))
        .await
        .unwrap();

    let housekeeping = housekeeping(&harness);
    let threshold = Utc::now() + Duration::minutes(1);

    assert_eq!(
        housekeeping.republish_outstanding(threshold).await.unwrap(),
        (1, 0)
    );
    harness.publisher.set_failing(false);
    assert_eq!(
        housekeeping.republish_outstanding(threshold).await.unwrap(),
        (1, 3)
    );
}
