//! Zype adapter.
//!
//! Zype authenticates with a static API key, so there is no session to
//! manage. Responses use an envelope with a `success` flag; failures carry
//! a structured error object that distinguishes duplicates.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{LenderConfig, LenderCredentials};
use crate::lenders::{
    build_http_client, probe_health, LenderClient, LenderReply, LenderRequest, SendError,
};
use crate::models::{LenderName, LenderOutcome};

pub struct ZypeClient {
    client: reqwest::Client,
    base_url: String,
    lender_id: String,
    api_key: String,
}

impl ZypeClient {
    pub fn new(config: &LenderConfig) -> anyhow::Result<Self> {
        let Some(LenderCredentials::ApiKey { api_key }) = &config.credentials else {
            anyhow::bail!("Zype requires an API key credential");
        };

        Ok(Self {
            client: build_http_client(config.timeout_secs, "Zype")?,
            base_url: config.base_url.clone(),
            lender_id: config.id.clone(),
            api_key: api_key.clone(),
        })
    }

    async fn submit(&self, request: &LenderRequest) -> Result<LenderReply, SendError> {
        let url = format!("{}/applications", self.base_url);
        debug!("Submitting lead {} to Zype: {}", request.lead_id, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&build_payload(request))
            .send()
            .await
            .map_err(|e| SendError::transport(format!("Zype request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SendError::Transport {
                message: format!("Zype returned {}: {}", status, error_text),
                body: serde_json::from_str(&error_text).ok(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SendError::transport(format!("Failed to parse Zype response: {}", e)))?;

        Ok(classify_response(&body))
    }
}

fn build_payload(request: &LenderRequest) -> Value {
    json!({
        "phone_number": request.phone,
        "email_id": request.email,
        "first_name": request.first_name,
        "last_name": request.last_name,
        "date_of_birth": request.date_of_birth.to_string(),
        "monthly_income": request.monthly_income,
        "employment_type": request.employment_type.as_str(),
        "pan_card": request.pan_number,
        "residential_address": {
            "address_line": request.address,
            "city": request.city,
            "state": request.state,
            "pincode": request.pincode,
        },
    })
}

/// Maps a Zype envelope onto an outcome. Failed envelopes are rejections
/// unless the error object flags a duplicate; successful envelopes are
/// accepted only for the "approved" status.
fn classify_response(body: &Value) -> LenderReply {
    let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);

    if !success {
        let error = body.get("error");
        let is_duplicate = error
            .and_then(|e| e.get("is_duplicate"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let outcome = if is_duplicate {
            LenderOutcome::Duplicate
        } else {
            LenderOutcome::Rejected
        };

        return LenderReply {
            outcome,
            message: error
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(String::from),
            data: Some(json!({
                "error_code": error.and_then(|e| e.get("code")).cloned().unwrap_or(Value::Null),
                "retry_after": error.and_then(|e| e.get("retry_after")).cloned().unwrap_or(Value::Null),
            })),
        };
    }

    let approved = body
        .get("data")
        .and_then(|d| d.get("status"))
        .and_then(Value::as_str)
        == Some("approved");

    LenderReply {
        outcome: if approved {
            LenderOutcome::Accepted
        } else {
            LenderOutcome::Rejected
        },
        message: None,
        data: body.get("data").cloned(),
    }
}

#[async_trait]
impl LenderClient for ZypeClient {
    fn name(&self) -> LenderName {
        LenderName::Zype
    }

    fn lender_id(&self) -> &str {
        &self.lender_id
    }

    async fn send_lead(&self, request: &LenderRequest) -> LenderReply {
        match self.submit(request).await {
            Ok(reply) => reply,
            Err(err) => err.into_reply(LenderName::Zype),
        }
    }

    async fn is_healthy(&self) -> bool {
        probe_health(&self.client, &self.base_url).await
    }
}
