//! PocketCredit adapter.
//!
//! PocketCredit uses OAuth client credentials with short-lived access
//! tokens. Expiry near the refresh margin is handled with the issued
//! refresh token first; if that fails, the adapter falls back to a full
//! client-credentials grant.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{LenderConfig, LenderCredentials};
use crate::lenders::auth::AuthSession;
use crate::lenders::{
    build_http_client, LenderClient, LenderReply, LenderRequest, SendError,
};
use crate::models::{LenderName, LenderOutcome};

pub struct PocketCreditClient {
    client: reqwest::Client,
    base_url: String,
    lender_id: String,
    client_id: String,
    client_secret: String,
    session: Mutex<Option<AuthSession>>,
}

impl PocketCreditClient {
    pub fn new(config: &LenderConfig) -> anyhow::Result<Self> {
        let Some(LenderCredentials::ClientCredentials {
            client_id,
            client_secret,
        }) = &config.credentials
        else {
            anyhow::bail!("PocketCredit requires client_id/client_secret credentials");
        };

        Ok(Self {
            client: build_http_client(config.timeout_secs, "PocketCredit")?,
            base_url: config.base_url.clone(),
            lender_id: config.id.clone(),
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            session: Mutex::new(None),
        })
    }

    /// Returns a usable bearer token. Holds the session lock across token
    /// calls so concurrent sends share one grant instead of racing the
    /// token endpoint.
    async fn access_token(&self) -> Result<String, SendError> {
        let mut session = self.session.lock().await;
        if let Some(existing) = session.as_ref() {
            if existing.is_fresh(Utc::now()) {
                return Ok(existing.access_token.clone());
            }
            if let Some(refresh_token) = existing.refresh_token.clone() {
                match self.refresh_grant(&refresh_token).await {
                    Ok(fresh) => {
                        let token = fresh.access_token.clone();
                        *session = Some(fresh);
                        return Ok(token);
                    }
                    Err(err) => {
                        warn!(
                            "PocketCredit token refresh failed, requesting a new token: {}",
                            err
                        );
                    }
                }
            }
        }

        let fresh = self.credentials_grant().await?;
        let token = fresh.access_token.clone();
        *session = Some(fresh);
        Ok(token)
    }

    async fn credentials_grant(&self) -> Result<AuthSession, SendError> {
        self.token_request(&json!({
            "grant_type": "client_credentials",
            "client_id": self.client_id,
            "client_secret": self.client_secret,
        }))
        .await
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<AuthSession, SendError> {
        self.token_request(&json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        }))
        .await
    }

    async fn token_request(&self, grant: &Value) -> Result<AuthSession, SendError> {
        let url = format!("{}/oauth/token", self.base_url);
        debug!("Requesting PocketCredit token: {}", url);

        let response = self
            .client
            .post(&url)
            .json(grant)
            .send()
            .await
            .map_err(|e| SendError::auth(format!("PocketCredit token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SendError::auth(format!(
                "PocketCredit token endpoint returned {}: {}",
                status, error_text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            SendError::auth(format!("Failed to parse PocketCredit token response: {}", e))
        })?;
        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SendError::auth("PocketCredit token response missing 'access_token' field")
            })?;

        Ok(AuthSession::with_lifetime(
            access_token.to_string(),
            body.get("refresh_token").and_then(Value::as_str).map(String::from),
            body.get("expires_in").and_then(Value::as_i64),
            Utc::now(),
        ))
    }

    async fn submit(&self, request: &LenderRequest) -> Result<LenderReply, SendError> {
        let token = self.access_token().await?;
        let url = format!("{}/api/v1/leads", self.base_url);
        debug!("Submitting lead {} to PocketCredit: {}", request.lead_id, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(&build_payload(request))
            .send()
            .await
            .map_err(|e| SendError::transport(format!("PocketCredit request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                *self.session.lock().await = None;
            }
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SendError::Transport {
                message: format!("PocketCredit returned {}: {}", status, error_text),
                body: serde_json::from_str(&error_text).ok(),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            SendError::transport(format!("Failed to parse PocketCredit response: {}", e))
        })?;

        Ok(classify_response(&body))
    }
}

fn build_payload(request: &LenderRequest) -> Value {
    json!({
        "mobile": request.phone,
        "email": request.email,
        "name": format!("{} {}", request.first_name, request.last_name),
        "dob": request.date_of_birth.to_string(),
        "monthly_salary": request.monthly_income,
        "employment_type": request.employment_type.as_str().to_uppercase(),
        "pan": request.pan_number,
        "address": request.address,
        "city": request.city,
        "state": request.state,
        "pincode": request.pincode,
    })
}

fn classify_response(body: &Value) -> LenderReply {
    let outcome = match body.get("status").and_then(Value::as_str) {
        Some("ACCEPTED") => LenderOutcome::Accepted,
        Some("REJECTED") => LenderOutcome::Rejected,
        Some("DEDUPED") => LenderOutcome::Duplicate,
        _ => LenderOutcome::Error,
    };

    LenderReply {
        outcome,
        message: body.get("reason").and_then(Value::as_str).map(String::from),
        data: Some(body.clone()),
    }
}

#[async_trait]
impl LenderClient for PocketCreditClient {
    fn name(&self) -> LenderName {
        LenderName::PocketCredit
    }

    fn lender_id(&self) -> &str {
        &self.lender_id
    }

    async fn send_lead(&self, request: &LenderRequest) -> LenderReply {
        match self.submit(request).await {
            Ok(reply) => reply,
            Err(err) => err.into_reply(LenderName::PocketCredit),
        }
    }

    /// Healthy means a session can be obtained or reused, so revoked
    /// credentials surface here rather than only on the next send.
    async fn is_healthy(&self) -> bool {
        self.access_token().await.is_ok()
    }
}
