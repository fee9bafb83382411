use crate::common::*;
use casework_core::messaging::{Envelope, InMemoryQueue, InboundQueue};
use casework_core::orchestration::{Consumer, ConsumerConfig};
use casework_core::state_machine::{CaseTask, TwoPersonReview};
use casework_core::store::ContextStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

fn consumer_config() -> ConsumerConfig {
    ConsumerConfig {
        batch_size: 10,
        poll_interval: Duration::from_millis(10),
        worker_pool_size: 4,
    }
}

fn consumer(harness: &Harness, queue: &Arc<InMemoryQueue>) -> Consumer {
    Consumer::new(
        queue.clone(),
        harness.orchestrator.clone(),
        consumer_config(),
    )
}

#[tokio::test]
async fn test_batch_dispositions_follow_error_classes() {
    let harness = Harness::new();
    let queue = Arc::new(InMemoryQueue::new());
    let need = approval_need();

    // A finalization that breaks the review rule
    let finalized = approval_need();
    let mut review = TwoPersonReview::new(finalized.period_key());
    review.submit_to_reviewer("S111111", "B222222").unwrap();
    harness.repository.seed_review(review);
    harness
        .repository
        .seed_task(CaseTask::new(finalized.period_key()));
    let decision = decision_made(finalized.vedtaksperiode_id, "S111111");

    let start = queue.push(body(&approval_envelope(Uuid::new_v4(), &need)));
    let malformed = queue.push(json!({"event_type": "approval_needed"}));
    let unknown_type = queue.push(body(&Envelope::new(
        "vedtak_annullert",
        Uuid::new_v4(),
        json!({}),
    )));
    let orphan_answer = queue.push(body(&answer_envelope(Uuid::new_v4(), &no_guardian())));
    let rule_violation = queue.push(body(&Envelope::new(
        "decision_made",
        Uuid::new_v4(),
        serde_json::to_value(&decision).unwrap(),
    )));

    let summary = consumer(&harness, &queue).run_batch().await.unwrap();

    assert_eq!(summary.messages, 5);
    assert_eq!(summary.acked, 2);
    assert_eq!(summary.archived, 3);
    assert_eq!(summary.retried, 0);

    let mut acked = queue.acked();
    acked.sort_unstable();
    assert_eq!(acked, vec![start, rule_violation]);

    let mut archived: Vec<i64> = queue.archived().iter().map(|m| m.msg_id).collect();
    archived.sort_unstable();
    assert_eq!(archived, vec![malformed, unknown_type, orphan_answer]);
    assert_eq!(queue.in_flight_len(), 0);
}

#[tokio::test]
async fn test_contended_message_is_released_for_redelivery() {
    let harness = Harness::builder()
        .with_lock_timeout(Duration::from_millis(20))
        .with_lock_retry_attempts(1)
        .build();
    let queue = Arc::new(InMemoryQueue::new());
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    harness
        .orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();

    let held = harness.store.open(correlation_id).await.unwrap();
    queue.push(body(&answer_envelope(correlation_id, &clean_risk(&need))));

    let consumer = consumer(&harness, &queue);
    let summary = consumer.run_batch().await.unwrap();
    assert_eq!(summary.retried, 1);
    assert_eq!(queue.ready_len(), 1);

    drop(held);
    let summary = consumer.run_batch().await.unwrap();
    assert_eq!(summary.acked, 1);
    assert_eq!(queue.ready_len(), 0);
}

#[tokio::test]
async fn test_run_drives_a_case_to_completion_until_shutdown() {
    let harness = Harness::new();
    let queue = Arc::new(InMemoryQueue::new());
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    queue.push(body(&approval_envelope(correlation_id, &need)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = consumer(&harness, &queue);
    let running = tokio::spawn(async move { consumer.run(shutdown_rx).await });

    // Answers arrive once the requests are out
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.publisher.requests().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("requests published");
    for answer in clean_answers(&need) {
        queue.push(body(&answer_envelope(correlation_id, &answer)));
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.acked().len() < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("all messages acked");

    shutdown_tx.send(true).unwrap();
    let summary = running.await.unwrap().unwrap();

    assert_eq!(summary.messages, 4);
    assert_eq!(summary.acked, 4);
    assert_eq!(harness.repository.decision_count(), 1);
}

#[tokio::test]
async fn test_empty_queue_reads_nothing() {
    let harness = Harness::new();
    let queue = Arc::new(InMemoryQueue::new());

    let summary = consumer(&harness, &queue).run_batch().await.unwrap();

    assert_eq!(summary.messages, 0);
    assert!(queue.read_batch(10).await.unwrap().is_empty());
}
