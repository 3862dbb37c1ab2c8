//! Lead intake and fan-out to eligible lenders.
//!
//! One distribution round walks every enabled lender exactly once: each one
//! either gets a skip audit row (ineligible) or a send attempt that records
//! both a response row and a routing audit row. Adapter failures are
//! contained per lender, so the round always runs to completion and the
//! lead always lands back in `Completed`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::eligibility::{self, EligibilityDecision, EligibilitySnapshot};
use crate::errors::{AppError, ResultExt};
use crate::lenders::{LenderClient, LenderRegistry, LenderReply, LenderRequest};
use crate::models::{
    CreateLeadRequest, Lead, LeadStatus, LenderOutcome, NewLenderResponse, NewRoutingLog,
    RoutingDecision,
};
use crate::storage::LeadStore;
use crate::validation::validate_lead_payload;

pub struct RoutingService {
    store: Arc<dyn LeadStore>,
    registry: Arc<LenderRegistry>,
    config: Arc<Config>,
}

impl RoutingService {
    pub fn new(store: Arc<dyn LeadStore>, registry: Arc<LenderRegistry>, config: Arc<Config>) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Validates and persists an intake payload, then distributes the lead.
    ///
    /// When the phone or email is already known, the payload is appended as
    /// a new source on the existing lead, and distribution re-runs with the
    /// existing canonical lead data rather than the incoming values.
    pub async fn process_incoming_lead(&self, payload: CreateLeadRequest) -> Result<Lead, AppError> {
        let new_lead = validate_lead_payload(&payload).map_err(|errors| {
            AppError::ValidationError(format!("Validation failed: {}", errors.join(", ")))
        })?;

        let raw_payload = serde_json::to_value(&payload).map_err(|e| {
            AppError::InternalError(format!("Failed to serialize intake payload: {}", e))
        })?;

        let lead = match self
            .store
            .find_lead_by_phone_or_email(&new_lead.phone, &new_lead.email)
            .await?
        {
            Some(existing) => {
                info!(
                    "Lead {} already known, adding source '{}'",
                    existing.id, new_lead.source
                );
                self.store
                    .add_lead_source(existing.id, &new_lead.source, &raw_payload)
                    .await?;
                existing
            }
            None => self.store.create_lead(&new_lead, &raw_payload).await?,
        };

        self.distribute(&lead).await?;

        // Pick up the status written by the distribution pass.
        let refreshed = self.store.find_lead_by_id(lead.id).await?.unwrap_or(lead);
        Ok(refreshed)
    }

    /// Runs one distribution round for a lead.
    async fn distribute(&self, lead: &Lead) -> Result<(), AppError> {
        self.store
            .update_lead_status(lead.id, LeadStatus::Processing)
            .await?;

        let clients = self.registry.all_enabled().await;
        if clients.is_empty() {
            warn!("No lenders configured - check environment variables");
            self.store
                .update_lead_status(lead.id, LeadStatus::Completed)
                .await?;
            return Ok(());
        }

        let as_of = Utc::now().date_naive();
        let snapshot = EligibilitySnapshot::capture(lead, as_of);

        let mut admitted = Vec::new();
        let mut skipped = Vec::new();
        for client in clients {
            let rules = &self.config.lender(client.name()).rules;
            match eligibility::evaluate(lead, rules, as_of) {
                EligibilityDecision::Eligible => admitted.push(client),
                EligibilityDecision::Ineligible(reason) => skipped.push((client.name(), reason)),
            }
        }

        for (name, reason) in &skipped {
            info!("Skipping {} for lead {}: {}", name, lead.id, reason);
            let log = NewRoutingLog {
                lead_id: lead.id,
                lender_name: name.to_string(),
                decision: RoutingDecision::SkippedIneligible,
                reason: Some(reason.clone()),
                lead_data: snapshot.to_json(),
            };
            // Audit rows for skips are best effort; the round continues.
            if let Err(e) = self.store.create_routing_log(&log).await {
                warn!("Failed to record skip for {} on lead {}: {}", name, lead.id, e);
            }
        }

        if admitted.is_empty() {
            info!("No eligible lenders for lead {}", lead.id);
            self.store
                .update_lead_status(lead.id, LeadStatus::Completed)
                .await?;
            return Ok(());
        }

        let names: Vec<&str> = admitted.iter().map(|c| c.name().as_str()).collect();
        info!(
            "Distributing lead {} to {} lenders: [{}]",
            lead.id,
            admitted.len(),
            names.join(", ")
        );

        let sends = admitted.into_iter().map(|client| {
            let lead = lead.clone();
            async move {
                if let Err(e) = self.dispatch_to_lender(&lead, client.as_ref()).await {
                    error!(
                        "Failed to record {} dispatch for lead {}: {}",
                        client.name(),
                        lead.id,
                        e
                    );
                }
            }
        });
        join_all(sends).await;

        self.store
            .update_lead_status(lead.id, LeadStatus::Completed)
            .await?;
        Ok(())
    }

    /// Sends one lead to one lender and records the attempt.
    ///
    /// Always appends a fresh response row plus a routing audit row, never
    /// updating previous attempts. This is the single entry point for both
    /// first-round dispatch and cooldown retries. Errors are storage
    /// failures only; lender failures come back as the `Error` outcome.
    pub async fn dispatch_to_lender(
        &self,
        lead: &Lead,
        client: &dyn LenderClient,
    ) -> Result<LenderOutcome, AppError> {
        let name = client.name();
        let request = LenderRequest::from_lead(lead);
        let timeout = Duration::from_secs(self.config.send_timeout_secs);
        let sent_at = Utc::now();

        info!("Sending lead {} to {}", lead.id, name);

        let reply = match tokio::time::timeout(timeout, client.send_lead(&request)).await {
            Ok(reply) => reply,
            Err(_) => {
                error!(
                    "❌ {} did not respond within {}s for lead {}",
                    name,
                    timeout.as_secs(),
                    lead.id
                );
                LenderReply::error(
                    format!("{} did not respond within {}s", name, timeout.as_secs()),
                    None,
                )
            }
        };
        let responded_at = Utc::now();

        // Duplicates become retry candidates once the cooldown lapses.
        let retry_after = if reply.outcome == LenderOutcome::Duplicate {
            Some(responded_at + chrono::Duration::days(self.config.dedup_cooldown_days))
        } else {
            None
        };

        let response_data = match reply.data.clone() {
            Some(data) => data,
            None => match (&reply.outcome, &reply.message) {
                (LenderOutcome::Error, Some(message)) => json!({ "error": message }),
                _ => json!({}),
            },
        };

        self.store
            .create_lender_response(&NewLenderResponse {
                lead_id: lead.id,
                lender_id: client.lender_id().to_string(),
                lender_name: name.to_string(),
                status: reply.outcome,
                response_data: Some(response_data),
                sent_at,
                responded_at: Some(responded_at),
                retry_after,
            })
            .await
            .context(format!("recording {} response for lead {}", name, lead.id))?;

        let (decision, reason) = match reply.outcome {
            LenderOutcome::Error => (
                RoutingDecision::Error,
                reply
                    .message
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ),
            outcome => (
                RoutingDecision::Sent,
                format!("API call successful - {}", outcome),
            ),
        };

        self.store
            .create_routing_log(&NewRoutingLog {
                lead_id: lead.id,
                lender_name: name.to_string(),
                decision,
                reason: Some(reason),
                lead_data: EligibilitySnapshot::capture(lead, responded_at.date_naive()).to_json(),
            })
            .await
            .context(format!("recording {} routing log for lead {}", name, lead.id))?;

        match reply.outcome {
            LenderOutcome::Error => warn!("✗ {} errored for lead {}", name, lead.id),
            outcome => info!("✓ {} responded {} for lead {}", name, outcome, lead.id),
        }

        Ok(reply.outcome)
    }
}
