//! KarroFin adapter.
//!
//! KarroFin issues short-lived JWTs from a partner-code/passkey login and
//! expects the lead payload grouped into personal, employment and address
//! sections.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{LenderConfig, LenderCredentials};
use crate::lenders::auth::AuthSession;
use crate::lenders::{
    build_http_client, LenderClient, LenderReply, LenderRequest, SendError,
};
use crate::models::{LenderName, LenderOutcome};

pub struct KarroFinClient {
    client: reqwest::Client,
    base_url: String,
    lender_id: String,
    partner_code: String,
    passkey: String,
    session: Mutex<Option<AuthSession>>,
}

impl KarroFinClient {
    pub fn new(config: &LenderConfig) -> anyhow::Result<Self> {
        let Some(LenderCredentials::PartnerPasskey {
            partner_code,
            passkey,
        }) = &config.credentials
        else {
            anyhow::bail!("KarroFin requires partner_code/passkey credentials");
        };

        Ok(Self {
            client: build_http_client(config.timeout_secs, "KarroFin")?,
            base_url: config.base_url.clone(),
            lender_id: config.id.clone(),
            partner_code: partner_code.clone(),
            passkey: passkey.clone(),
            session: Mutex::new(None),
        })
    }

    /// Returns a usable bearer token, logging in again when the cached
    /// session is missing or inside its refresh margin. The session lock is
    /// held across the login, so concurrent sends trigger at most one.
    async fn access_token(&self) -> Result<String, SendError> {
        let mut session = self.session.lock().await;
        if let Some(existing) = session.as_ref() {
            if existing.is_fresh(Utc::now()) {
                return Ok(existing.access_token.clone());
            }
        }

        let fresh = self.login().await?;
        let token = fresh.access_token.clone();
        *session = Some(fresh);
        Ok(token)
    }

    async fn login(&self) -> Result<AuthSession, SendError> {
        let url = format!("{}/auth/login", self.base_url);
        debug!("Logging in to KarroFin: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "partner_code": self.partner_code,
                "passkey": self.passkey,
            }))
            .send()
            .await
            .map_err(|e| SendError::auth(format!("KarroFin login failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SendError::auth(format!(
                "KarroFin login returned {}: {}",
                status, error_text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            SendError::auth(format!("Failed to parse KarroFin login response: {}", e))
        })?;
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| SendError::auth("KarroFin login response missing 'token' field"))?;

        Ok(AuthSession::from_bearer_token(token.to_string(), Utc::now()))
    }

    async fn submit(&self, request: &LenderRequest) -> Result<LenderReply, SendError> {
        let token = self.access_token().await?;
        let url = format!("{}/leads", self.base_url);
        debug!("Submitting lead {} to KarroFin: {}", request.lead_id, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(&build_payload(request))
            .send()
            .await
            .map_err(|e| SendError::transport(format!("KarroFin request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                // Token rejected ahead of its recorded expiry; drop it so
                // the next send logs in again.
                *self.session.lock().await = None;
            }
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SendError::Transport {
                message: format!("KarroFin returned {}: {}", status, error_text),
                body: serde_json::from_str(&error_text).ok(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SendError::transport(format!("Failed to parse KarroFin response: {}", e)))?;

        Ok(classify_response(&body))
    }
}

fn build_payload(request: &LenderRequest) -> Value {
    json!({
        "personal_info": {
            "phone": request.phone,
            "email": request.email,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "dob": request.date_of_birth.to_string(),
            "pan": request.pan_number,
        },
        "employment": {
            "type": request.employment_type.as_str(),
            "monthly_income": request.monthly_income,
        },
        "address": {
            "line1": request.address,
            "city": request.city,
            "state": request.state,
            "pincode": request.pincode,
        },
    })
}

/// Maps a KarroFin response body onto an outcome. The `duplicate` flag wins
/// over whatever `status` says.
fn classify_response(body: &Value) -> LenderReply {
    let outcome = if body.get("duplicate").and_then(Value::as_bool).unwrap_or(false) {
        LenderOutcome::Duplicate
    } else {
        match body.get("status").and_then(Value::as_str) {
            Some("approved") => LenderOutcome::Accepted,
            Some("rejected") => LenderOutcome::Rejected,
            _ => LenderOutcome::Error,
        }
    };

    LenderReply {
        outcome,
        message: body.get("message").and_then(Value::as_str).map(String::from),
        data: Some(body.clone()),
    }
}

#[async_trait]
impl LenderClient for KarroFinClient {
    fn name(&self) -> LenderName {
        LenderName::KarroFin
    }

    fn lender_id(&self) -> &str {
        &self.lender_id
    }

    async fn send_lead(&self, request: &LenderRequest) -> LenderReply {
        match self.submit(request).await {
            Ok(reply) => reply,
            Err(err) => err.into_reply(LenderName::KarroFin),
        }
    }

    /// Healthy means a session can be obtained or reused, so revoked
    /// credentials surface here rather than only on the next send.
    async fn is_healthy(&self) -> bool {
        self.access_token().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn request() -> LenderRequest {
        LenderRequest {
            lead_id: Uuid::new_v4(),
            phone: "9876543210".to_string(),
            email: "asha@example.com".to_string(),
            first_name: "Asha".to_string(),
            last_name: "Verma".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1992, 4, 17).unwrap(),
            monthly_income: 45000.0,
            employment_type: crate::models::EmploymentType::Salaried,
            pan_number: "ABCDE1234F".to_string(),
            address: "14 MG Road".to_string(),
            city: "Pune".to_string(),
            state: "MH".to_string(),
            pincode: "411001".to_string(),
        }
    }

    #[test]
    fn payload_groups_fields_into_sections() {
        let payload = build_payload(&request());
        assert_eq!(payload["personal_info"]["phone"], "9876543210");
        assert_eq!(payload["personal_info"]["dob"], "1992-04-17");
        assert_eq!(payload["personal_info"]["pan"], "ABCDE1234F");
        assert_eq!(payload["employment"]["type"], "salaried");
        assert_eq!(payload["employment"]["monthly_income"], 45000.0);
        assert_eq!(payload["address"]["line1"], "14 MG Road");
        assert_eq!(payload["address"]["pincode"], "411001");
    }

    #[test]
    fn classifies_approved() {
        let reply = classify_response(&json!({"status": "approved", "lead_id": "KF-1"}));
        assert_eq!(reply.outcome, LenderOutcome::Accepted);
        assert_eq!(reply.data.unwrap()["lead_id"], "KF-1");
    }

    #[test]
    fn classifies_rejected_with_message() {
        let reply = classify_response(&json!({"status": "rejected", "message": "low score"}));
        assert_eq!(reply.outcome, LenderOutcome::Rejected);
        assert_eq!(reply.message.as_deref(), Some("low score"));
    }

    #[test]
    fn duplicate_flag_wins_over_status() {
        let reply = classify_response(&json!({"status": "approved", "duplicate": true}));
        assert_eq!(reply.outcome, LenderOutcome::Duplicate);
    }

    #[test]
    fn unknown_status_is_an_error() {
        let reply = classify_response(&json!({"status": "pending"}));
        assert_eq!(reply.outcome, LenderOutcome::Error);

        let reply = classify_response(&json!({"ok": true}));
        assert_eq!(reply.outcome, LenderOutcome::Error);
    }
}
