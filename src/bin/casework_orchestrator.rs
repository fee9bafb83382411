//! # Casework Orchestrator
//!
//! Service entry point: loads configuration, connects to Postgres, prepares
//! the pgmq queues and runs the inbound consumer, housekeeping and the
//! lifecycle event log until interrupted.

use anyhow::Context;
use casework_core::case::{PgCaseRepository, SequenceRegistry};
use casework_core::config::ConfigManager;
use casework_core::database::{DatabaseConnection, DatabaseMigrations};
use casework_core::decision::{policy_from_config, DecisionEngine};
use casework_core::events::{log_lifecycle_events, EventPublisher, EventPublisherObserver};
use casework_core::logging::init_structured_logging;
use casework_core::messaging::{PgmqClient, PgmqInboundQueue, PgmqPublisher};
use casework_core::orchestration::{
    Consumer, ConsumerConfig, Housekeeping, Orchestrator, TaskInvalidationObserver,
};
use casework_core::store::PgContextStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config_manager = ConfigManager::load().context("loading configuration")?;
    let config = config_manager.config().clone();
    info!(
        environment = config_manager.environment(),
        "Starting casework orchestrator"
    );

    let db = DatabaseConnection::connect(&config.database)
        .await
        .context("connecting to database")?;
    if !config.database.skip_migrations {
        DatabaseMigrations::run_all(db.pool())
            .await
            .context("running migrations")?;
    }
    let pool = db.pool().clone();

    let pgmq = Arc::new(PgmqClient::new_with_pool(pool.clone()).await);
    pgmq.initialize_queues(&[
        config.pgmq.inbound_queue.as_str(),
        config.pgmq.request_queue.as_str(),
        config.pgmq.cancellation_queue.as_str(),
    ])
    .await
    .context("initializing queues")?;

    let repository = Arc::new(PgCaseRepository::new(pool.clone()));
    let store = Arc::new(PgContextStore::new(pool, config.database.lock_timeout_ms));
    let publisher = Arc::new(PgmqPublisher::new(
        pgmq.clone(),
        config.pgmq.request_queue.clone(),
        config.pgmq.cancellation_queue.clone(),
    ));

    let sequences = SequenceRegistry::case_workflows(
        repository.clone(),
        DecisionEngine::from_config(&config.decision),
        policy_from_config(&config.decision),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        sequences,
        publisher.clone(),
        config.orchestration.clone(),
    ));
    orchestrator.register_observer(Arc::new(TaskInvalidationObserver::new(repository)));
    let lifecycle_events = EventPublisher::default();
    let event_log = lifecycle_events.subscribe();
    orchestrator.register_observer(Arc::new(EventPublisherObserver::new(lifecycle_events)));

    let consumer = Consumer::new(
        Arc::new(PgmqInboundQueue::new(
            pgmq,
            config.pgmq.inbound_queue.clone(),
            config.pgmq.visibility_timeout_seconds,
        )),
        orchestrator,
        ConsumerConfig::from_config(&config.pgmq, &config.orchestration),
    );
    let housekeeping = Housekeeping::new(store, publisher, config.housekeeping.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_shutdown = shutdown_rx.clone();
    let consumer_handle = tokio::spawn(async move { consumer.run(consumer_shutdown).await });
    let event_log_handle = tokio::spawn(log_lifecycle_events(event_log, shutdown_rx.clone()));
    let housekeeping_handle = tokio::spawn(async move { housekeeping.run(shutdown_rx).await });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    match consumer_handle.await {
        Ok(Ok(summary)) => info!(
            messages = summary.messages,
            acked = summary.acked,
            archived = summary.archived,
            retried = summary.retried,
            "Consumer finished"
        ),
        Ok(Err(e)) => error!(error = %e, "Consumer failed"),
        Err(e) => error!(error = %e, "Consumer panicked"),
    }
    if let Err(e) = housekeeping_handle.await {
        error!(error = %e, "Housekeeping panicked");
    }
    match event_log_handle.await {
        Ok(logged) => info!(events = logged, "Lifecycle event log finished"),
        Err(e) => error!(error = %e, "Lifecycle event log panicked"),
    }

    db.close().await;
    Ok(())
}
