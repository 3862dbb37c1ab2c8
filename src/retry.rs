//! Cooldown retry sweep for deduplicated sends.
//!
//! A `Duplicate` outcome carries a `retry_after` instant. Once that lapses,
//! the sweep re-dispatches the lead to the same lender through the normal
//! dispatch path, appending a fresh response row. Nothing else is retried
//! automatically; `Error` outcomes stay where they are.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::lenders::LenderRegistry;
use crate::models::LenderName;
use crate::routing::RoutingService;
use crate::storage::LeadStore;

pub struct RetryService {
    store: Arc<dyn LeadStore>,
    registry: Arc<LenderRegistry>,
    router: Arc<RoutingService>,
}

impl RetryService {
    pub fn new(
        store: Arc<dyn LeadStore>,
        registry: Arc<LenderRegistry>,
        router: Arc<RoutingService>,
    ) -> Self {
        Self {
            store,
            registry,
            router,
        }
    }

    /// One sweep over duplicate responses whose cooldown has lapsed.
    ///
    /// Candidates with a missing lead or a disabled lender are skipped with
    /// a warning; they surface again on the next sweep. Returns the number
    /// of re-dispatches performed.
    pub async fn retry_deduped_leads(&self) -> Result<usize, AppError> {
        let candidates = self
            .store
            .find_responses_ready_for_retry(Utc::now())
            .await?;
        if candidates.is_empty() {
            info!("No deduped leads ready for retry");
            return Ok(0);
        }

        info!("Found {} deduped responses ready for retry", candidates.len());

        let mut retried = 0;
        for candidate in candidates {
            let Some(lead) = self.store.find_lead_by_id(candidate.lead_id).await? else {
                warn!("Lead {} no longer exists, skipping retry", candidate.lead_id);
                continue;
            };

            let Some(name) = LenderName::parse(&candidate.lender_name) else {
                warn!(
                    "Unknown lender '{}' on response {}, skipping retry",
                    candidate.lender_name, candidate.id
                );
                continue;
            };

            let Some(client) = self.registry.get(name).await else {
                warn!(
                    "Lender {} no longer enabled, skipping retry of lead {}",
                    name, lead.id
                );
                continue;
            };

            info!("Retrying lead {} with {} (cooldown expired)", lead.id, name);
            match self.router.dispatch_to_lender(&lead, client.as_ref()).await {
                Ok(outcome) => {
                    retried += 1;
                    info!("✓ Retry of lead {} with {} returned {}", lead.id, name, outcome);
                }
                Err(e) => {
                    error!("Retry dispatch failed for lead {} with {}: {}", lead.id, name, e);
                }
            }
        }

        Ok(retried)
    }
}

/// Periodic background driver for [`RetryService`].
pub struct RetryJob {
    service: Arc<RetryService>,
    interval_minutes: u64,
}

impl RetryJob {
    pub fn new(service: Arc<RetryService>, interval_minutes: u64) -> Self {
        Self {
            service,
            interval_minutes,
        }
    }

    /// Spawns the sweep loop. The first sweep runs immediately, then every
    /// interval. Returns a handle used to stop the loop on shutdown.
    pub fn spawn(self) -> RetryJobHandle {
        info!(
            "Retry job started, sweeping every {} minutes",
            self.interval_minutes
        );
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(self.interval_minutes * 60));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.service.retry_deduped_leads().await {
                            Ok(0) => {}
                            Ok(count) => info!("Retry sweep re-dispatched {} leads", count),
                            Err(e) => error!("Retry sweep failed: {}", e),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Retry job stopping");
                            break;
                        }
                    }
                }
            }
        });

        RetryJobHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Stops the retry loop, waiting out any sweep already in flight.
pub struct RetryJobHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RetryJobHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Retry job task failed: {}", e);
        }
    }
}
