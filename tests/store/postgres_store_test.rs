use crate::common::*;
use casework_core::case::{CaseRepository, PgCaseRepository, SequenceRegistry};
use casework_core::config::OrchestrationConfig;
use casework_core::context::{ContextStatus, SequenceKind};
use casework_core::decision::{Decision, DecisionEngine, DisabledSampling};
use casework_core::error::ErrorClass;
use casework_core::messaging::InMemoryPublisher;
use casework_core::orchestration::{DomainEvent, Orchestrator, PassOutcome};
use casework_core::state_machine::TaskState;
use casework_core::store::{ContextStore, PgContextStore};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

fn orchestrator(pool: &PgPool, lock_timeout_ms: u64) -> (Orchestrator, Arc<InMemoryPublisher>) {
    let repository = Arc::new(PgCaseRepository::new(pool.clone()));
    let publisher = Arc::new(InMemoryPublisher::new());
    let orchestrator = Orchestrator::new(
        Arc::new(PgContextStore::new(pool.clone(), lock_timeout_ms)),
        SequenceRegistry::case_workflows(
            repository,
            DecisionEngine::default(),
            Arc::new(DisabledSampling),
        ),
        publisher.clone(),
        OrchestrationConfig {
            lock_retry_attempts: 1,
            ..OrchestrationConfig::default()
        },
    );
    (orchestrator, publisher)
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_approval_round_trip_through_postgres(pool: PgPool) -> sqlx::Result<()> {
    let (orchestrator, publisher) = orchestrator(&pool, 1000);
    let store = PgContextStore::new(pool.clone(), 1000);
    let repository = PgCaseRepository::new(pool.clone());
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    let outcome = orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();
    assert_eq!(outcome, PassOutcome::Suspended { published: 3 });

    let snapshot = store.load(correlation_id).await.unwrap().unwrap();
    assert_eq!(snapshot.status, ContextStatus::Suspended);
    assert_eq!(snapshot.sequence, SequenceKind::Approval);
    assert_eq!(snapshot.pending_requests.len(), 3);

    for answer in clean_answers(&need) {
        orchestrator
            .handle(DomainEvent::answer(correlation_id, answer))
            .await
            .unwrap();
    }

    let snapshot = store.load(correlation_id).await.unwrap().unwrap();
    assert_eq!(snapshot.status, ContextStatus::Done);
    assert_eq!(publisher.requests().len(), 3);

    let record = repository
        .decision(&need.period_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.decision, Decision::Automatic);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_held_context_lock_is_transient(pool: PgPool) -> sqlx::Result<()> {
    let (orchestrator, _publisher) = orchestrator(&pool, 50);
    let store = PgContextStore::new(pool.clone(), 50);
    let need = approval_need();
    let correlation_id = Uuid::new_v4();

    orchestrator
        .handle(start_approval(correlation_id, &need))
        .await
        .unwrap();

    let held = store.open(correlation_id).await.unwrap();
    let error = orchestrator
        .handle(DomainEvent::answer(correlation_id, clean_risk(&need)))
        .await
        .unwrap_err();
    assert_eq!(error.classify(), ErrorClass::Transient);
    drop(held);

    // A dropped session rolls back and releases the lock
    let outcome = orchestrator
        .handle(DomainEvent::answer(correlation_id, clean_risk(&need)))
        .await
        .unwrap();
    assert_eq!(outcome, PassOutcome::Suspended { published: 0 });
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_task_creation_is_idempotent_while_open(pool: PgPool) -> sqlx::Result<()> {
    let repository = PgCaseRepository::new(pool);
    let period = approval_need().period_key();

    let first = repository.create_task(&period).await.unwrap();
    let again = repository.create_task(&period).await.unwrap();
    assert_eq!(first.task_id, again.task_id);
    assert_eq!(first.state, TaskState::AwaitingCaseworker);

    let open = repository
        .open_task(period.vedtaksperiode_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(open.task_id, first.task_id);
    Ok(())
}
