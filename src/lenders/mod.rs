//! Lender API adapters.
//!
//! Each partner gets one adapter that owns its HTTP client, credentials and
//! authenticated session. Adapters never surface transport or auth failures
//! to callers: every failure is folded into a [`LenderReply`] carrying the
//! `Error` outcome, so one misbehaving partner cannot poison a fan-out.

pub mod auth;
pub mod karrofin;
pub mod pocketcredit;
pub mod registry;
pub mod zype;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{EmploymentType, Lead, LenderName, LenderOutcome};

pub use registry::LenderRegistry;

/// Timeout for the lightweight `/health` probe, independent of the
/// per-lender request timeout.
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lead fields handed to an adapter for submission.
///
/// Built from the stored lead row, never from the raw intake payload, so
/// retries and re-dispatches always send the canonical data.
#[derive(Debug, Clone)]
pub struct LenderRequest {
    pub lead_id: Uuid,
    pub phone: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub monthly_income: f64,
    pub employment_type: EmploymentType,
    pub pan_number: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl LenderRequest {
    pub fn from_lead(lead: &Lead) -> Self {
        Self {
            lead_id: lead.id,
            phone: lead.phone.clone(),
            email: lead.email.clone(),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            date_of_birth: lead.date_of_birth,
            monthly_income: lead.monthly_income,
            employment_type: lead.employment_type,
            pan_number: lead.pan_number.clone(),
            address: lead.address.clone(),
            city: lead.city.clone(),
            state: lead.state.clone(),
            pincode: lead.pincode.clone(),
        }
    }
}

/// Classified result of one submission attempt.
#[derive(Debug, Clone)]
pub struct LenderReply {
    pub outcome: LenderOutcome,
    /// Partner-provided message or, for the `Error` outcome, the failure
    /// description.
    pub message: Option<String>,
    /// Partner response body, when one was received.
    pub data: Option<Value>,
}

impl LenderReply {
    pub fn error(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            outcome: LenderOutcome::Error,
            message: Some(message.into()),
            data,
        }
    }
}

/// Failure inside an adapter, before a classified reply exists.
#[derive(Debug)]
pub(crate) enum SendError {
    /// Authentication with the partner failed before the lead went out.
    Auth(String),
    /// The request itself failed: connect error, timeout, HTTP error
    /// status, or an unparseable body.
    Transport {
        message: String,
        body: Option<Value>,
    },
}

impl SendError {
    pub(crate) fn auth(message: impl Into<String>) -> Self {
        SendError::Auth(message.into())
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        SendError::Transport {
            message: message.into(),
            body: None,
        }
    }

    /// Folds the failure into an `Error`-outcome reply, logging it once.
    pub(crate) fn into_reply(self, lender: LenderName) -> LenderReply {
        match self {
            SendError::Auth(message) => {
                tracing::error!("❌ {} authentication failed: {}", lender, message);
                LenderReply::error(message, None)
            }
            SendError::Transport { message, body } => {
                tracing::error!("❌ {} API error: {}", lender, message);
                LenderReply::error(message, body)
            }
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Auth(message) => write!(f, "{}", message),
            SendError::Transport { message, .. } => write!(f, "{}", message),
        }
    }
}

/// One partner integration.
///
/// `send_lead` is infallible by contract: adapters classify whatever the
/// partner returns and degrade everything else to an `Error` reply.
#[async_trait]
pub trait LenderClient: Send + Sync {
    fn name(&self) -> LenderName;

    /// Stable identifier recorded on response rows (e.g. "karrofin-001").
    fn lender_id(&self) -> &str;

    async fn send_lead(&self, request: &LenderRequest) -> LenderReply;

    /// Liveness check for the admin surface. Session-authenticated lenders
    /// report healthy only when a valid session can be obtained or reused;
    /// the rest probe their `/health` endpoint.
    async fn is_healthy(&self) -> bool;
}

/// `/health` endpoint probe for lenders without a session to check.
pub(crate) async fn probe_health(client: &reqwest::Client, base_url: &str) -> bool {
    let url = format!("{}/health", base_url);
    match client
        .get(&url)
        .timeout(HEALTH_PROBE_TIMEOUT)
        .send()
        .await
    {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

pub(crate) fn build_http_client(
    timeout_secs: u64,
    lender: &str,
) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create {} client: {}", lender, e))
}
