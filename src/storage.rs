//! Persistence layer for leads, lender responses and routing audit rows.
//!
//! The [`LeadStore`] trait is the seam between routing logic and Postgres;
//! tests swap in an in-memory store behind the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    Lead, LeadSource, LeadStatus, LenderOutcome, LenderResponse, NewLead, NewLenderResponse,
    NewRoutingLog, RoutingLog,
};

/// Storage operations the routing engine depends on.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Inserts a lead together with its first source row, atomically.
    async fn create_lead(&self, new_lead: &NewLead, raw_payload: &Value) -> Result<Lead, AppError>;

    async fn find_lead_by_id(&self, id: Uuid) -> Result<Option<Lead>, AppError>;

    /// Identity lookup: a lead matches when either the phone or the email
    /// is already known.
    async fn find_lead_by_phone_or_email(
        &self,
        phone: &str,
        email: &str,
    ) -> Result<Option<Lead>, AppError>;

    /// Appends an intake source to an existing lead.
    async fn add_lead_source(
        &self,
        lead_id: Uuid,
        source_name: &str,
        raw_data: &Value,
    ) -> Result<LeadSource, AppError>;

    async fn update_lead_status(&self, lead_id: Uuid, status: LeadStatus) -> Result<(), AppError>;

    async fn sources_for_lead(&self, lead_id: Uuid) -> Result<Vec<LeadSource>, AppError>;

    /// Appends one send-attempt row. Never updates existing rows: retries
    /// of the same (lead, lender) pair get their own row.
    async fn create_lender_response(
        &self,
        response: &NewLenderResponse,
    ) -> Result<LenderResponse, AppError>;

    async fn responses_for_lead(&self, lead_id: Uuid) -> Result<Vec<LenderResponse>, AppError>;

    /// Duplicate-outcome rows whose cooldown has lapsed at `now`, oldest
    /// first.
    async fn find_responses_ready_for_retry(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<LenderResponse>, AppError>;

    async fn create_routing_log(&self, log: &NewRoutingLog) -> Result<RoutingLog, AppError>;

    /// Routing audit rows for a lead, newest first.
    async fn routing_logs_for_lead(&self, lead_id: Uuid) -> Result<Vec<RoutingLog>, AppError>;
}

const LEAD_COLUMNS: &str = "id, phone, email, first_name, last_name, date_of_birth, \
     monthly_income, employment_type, pan_number, address, city, state, pincode, \
     status, created_at, updated_at";

const RESPONSE_COLUMNS: &str =
    "id, lead_id, lender_id, lender_name, status, response_data, sent_at, responded_at, retry_after";

/// Postgres-backed [`LeadStore`].
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn create_lead(&self, new_lead: &NewLead, raw_payload: &Value) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::DatabaseError)?;

        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            INSERT INTO leads (
                phone, email, first_name, last_name, date_of_birth,
                monthly_income, employment_type, pan_number, address, city,
                state, pincode
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
        .bind(&new_lead.phone)
        .bind(&new_lead.email)
        .bind(&new_lead.first_name)
        .bind(&new_lead.last_name)
        .bind(new_lead.date_of_birth)
        .bind(new_lead.monthly_income)
        .bind(new_lead.employment_type)
        .bind(&new_lead.pan_number)
        .bind(&new_lead.address)
        .bind(&new_lead.city)
        .bind(&new_lead.state)
        .bind(&new_lead.pincode)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::DatabaseError)?;

        sqlx::query(
            "INSERT INTO lead_sources (lead_id, source_name, raw_data) VALUES ($1, $2, $3)",
        )
        .bind(lead.id)
        .bind(&new_lead.source)
        .bind(raw_payload)
        .execute(&mut *tx)
        .await
        .map_err(AppError::DatabaseError)?;

        tx.commit().await.map_err(AppError::DatabaseError)?;

        tracing::info!("Created lead {} from source '{}'", lead.id, new_lead.source);
        Ok(lead)
    }

    async fn find_lead_by_id(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {} FROM leads WHERE id = $1",
            LEAD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(lead)
    }

    async fn find_lead_by_phone_or_email(
        &self,
        phone: &str,
        email: &str,
    ) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {} FROM leads WHERE phone = $1 OR email = $2 ORDER BY created_at LIMIT 1",
            LEAD_COLUMNS
        ))
        .bind(phone)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(lead)
    }

    async fn add_lead_source(
        &self,
        lead_id: Uuid,
        source_name: &str,
        raw_data: &Value,
    ) -> Result<LeadSource, AppError> {
        let source = sqlx::query_as::<_, LeadSource>(
            r#"
            INSERT INTO lead_sources (lead_id, source_name, raw_data)
            VALUES ($1, $2, $3)
            RETURNING id, lead_id, source_name, received_at, raw_data
            "#,
        )
        .bind(lead_id)
        .bind(source_name)
        .bind(raw_data)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(source)
    }

    async fn update_lead_status(&self, lead_id: Uuid, status: LeadStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE leads SET status = $2, updated_at = now() WHERE id = $1")
            .bind(lead_id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(())
    }

    async fn sources_for_lead(&self, lead_id: Uuid) -> Result<Vec<LeadSource>, AppError> {
        let sources = sqlx::query_as::<_, LeadSource>(
            "SELECT id, lead_id, source_name, received_at, raw_data \
             FROM lead_sources WHERE lead_id = $1 ORDER BY received_at",
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(sources)
    }

    async fn create_lender_response(
        &self,
        response: &NewLenderResponse,
    ) -> Result<LenderResponse, AppError> {
        let row = sqlx::query_as::<_, LenderResponse>(&format!(
            r#"
            INSERT INTO lender_responses (
                lead_id, lender_id, lender_name, status, response_data,
                sent_at, responded_at, retry_after
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            RESPONSE_COLUMNS
        ))
        .bind(response.lead_id)
        .bind(&response.lender_id)
        .bind(&response.lender_name)
        .bind(response.status)
        .bind(&response.response_data)
        .bind(response.sent_at)
        .bind(response.responded_at)
        .bind(response.retry_after)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row)
    }

    async fn responses_for_lead(&self, lead_id: Uuid) -> Result<Vec<LenderResponse>, AppError> {
        let responses = sqlx::query_as::<_, LenderResponse>(&format!(
            "SELECT {} FROM lender_responses WHERE lead_id = $1 ORDER BY sent_at",
            RESPONSE_COLUMNS
        ))
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(responses)
    }

    async fn find_responses_ready_for_retry(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<LenderResponse>, AppError> {
        let responses = sqlx::query_as::<_, LenderResponse>(&format!(
            "SELECT {} FROM lender_responses \
             WHERE status = $1 AND retry_after < $2 ORDER BY retry_after",
            RESPONSE_COLUMNS
        ))
        .bind(LenderOutcome::Duplicate)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(responses)
    }

    async fn create_routing_log(&self, log: &NewRoutingLog) -> Result<RoutingLog, AppError> {
        let row = sqlx::query_as::<_, RoutingLog>(
            r#"
            INSERT INTO lender_routing_logs (lead_id, lender_name, decision, reason, lead_data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, lead_id, lender_name, decision, reason, lead_data, created_at
            "#,
        )
        .bind(log.lead_id)
        .bind(&log.lender_name)
        .bind(log.decision)
        .bind(&log.reason)
        .bind(&log.lead_data)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row)
    }

    async fn routing_logs_for_lead(&self, lead_id: Uuid) -> Result<Vec<RoutingLog>, AppError> {
        let logs = sqlx::query_as::<_, RoutingLog>(
            "SELECT id, lead_id, lender_name, decision, reason, lead_data, created_at \
             FROM lender_routing_logs WHERE lead_id = $1 ORDER BY created_at DESC",
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(logs)
    }
}
