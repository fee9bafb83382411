//! # Housekeeping
//!
//! Periodic maintenance that never runs inside an orchestration pass:
//! re-publishing requests of contexts that have been waiting too long, and
//! removing terminal contexts past retention.

use crate::config::HousekeepingConfig;
use crate::error::Result;
use crate::logging::log_error;
use crate::messaging::{OutboundPublisher, RequestMessage};
use crate::store::ContextStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, instrument};

/// Contexts examined per republish sweep
const REPUBLISH_BATCH_LIMIT: i64 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingSummary {
    pub contexts_examined: usize,
    pub requests_republished: usize,
    pub contexts_archived: u64,
}

pub struct Housekeeping {
    store: Arc<dyn ContextStore>,
    publisher: Arc<dyn OutboundPublisher>,
    config: HousekeepingConfig,
}

impl Housekeeping {
    pub fn new(
        store: Arc<dyn ContextStore>,
        publisher: Arc<dyn OutboundPublisher>,
        config: HousekeepingConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    /// Publish again every pending request of suspended contexts whose last
    /// pass or republish is older than `older_than`. A context whose requests
    /// all went out is touched, so it waits a full window before the next
    /// republish. Returns (contexts, requests).
    #[instrument(skip(self))]
    pub async fn republish_outstanding(&self, older_than: DateTime<Utc>) -> Result<(usize, usize)> {
        let stale = self
            .store
            .list_stale_suspended(older_than, REPUBLISH_BATCH_LIMIT)
            .await?;

        let mut republished = 0;
        for snapshot in &stale {
            let mut all_sent = true;
            for request in &snapshot.pending_requests {
                let message = RequestMessage::from_request(snapshot.correlation_id, request);
                match self.publisher.publish_request(&message).await {
                    Ok(()) => republished += 1,
                    Err(e) => {
                        all_sent = false;
                        log_error(
                            "Housekeeping",
                            "republish_outstanding",
                            &e.to_string(),
                            Some(&snapshot.correlation_id.to_string()),
                        );
                    }
                }
            }
            if all_sent {
                self.store
                    .touch_suspended(snapshot.correlation_id, snapshot.updated_at, Utc::now())
                    .await?;
            }
        }

        if !stale.is_empty() {
            info!(
                contexts = stale.len(),
                requests = republished,
                "Republished outstanding requests"
            );
        }
        Ok((stale.len(), republished))
    }

    /// Delete terminal contexts last touched before `older_than`
    #[instrument(skip(self))]
    pub async fn archive_terminal(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let deleted = self.store.delete_terminal_before(older_than).await?;
        if deleted > 0 {
            info!(deleted = deleted, "Archived terminal contexts");
        }
        Ok(deleted)
    }

    /// One sweep with the configured thresholds
    pub async fn run_once(&self) -> Result<HousekeepingSummary> {
        let now = Utc::now();
        let (contexts_examined, requests_republished) = self
            .republish_outstanding(
                now - ChronoDuration::minutes(self.config.republish_after_minutes),
            )
            .await?;
        let contexts_archived = self
            .archive_terminal(now - ChronoDuration::days(self.config.archive_after_days))
            .await?;

        Ok(HousekeepingSummary {
            contexts_examined,
            requests_republished,
            contexts_archived,
        })
    }

    /// Sweep on the configured interval until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.interval_seconds.max(1));
        info!(interval_seconds = interval.as_secs(), "Starting housekeeping");

        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Housekeeping sweep failed");
            }
            tokio::select! {
                _ = sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
