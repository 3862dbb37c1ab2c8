use crate::config::Config;
use crate::errors::AppError;
use crate::lenders::LenderRegistry;
use crate::models::{CreateLeadRequest, LenderName};
use crate::retry::RetryService;
use crate::routing::RoutingService;
use crate::storage::LeadStore;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use futures_util::future::join_all;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Persistence for leads, sources, responses and routing logs.
    pub store: Arc<dyn LeadStore>,
    /// Lazily initialized lender adapters.
    pub registry: Arc<LenderRegistry>,
    /// Intake and fan-out pipeline.
    pub router: Arc<RoutingService>,
    /// Re-dispatch service for deduped leads.
    pub retry_service: Arc<RetryService>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-lead-router",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/leads
///
/// Ingests a lead from a source channel. The payload is validated, persisted
/// (or merged into an existing lead that shares the phone or email) and then
/// distributed to every lender whose eligibility rules admit it.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payload` - The raw lead submitted by the source.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<serde_json::Value>), AppError>` - HTTP 201 with
///   a summary of the stored lead, or a validation/storage error.
pub async fn process_lead(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    tracing::info!(
        "POST /leads - phone: {}, source: {}",
        payload.phone,
        payload.source
    );

    let lead = state.router.process_incoming_lead(payload).await?;

    let sources = state.store.sources_for_lead(lead.id).await?;
    let source_names: Vec<String> = sources.into_iter().map(|s| s.source_name).collect();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "id": lead.id,
                "phone": lead.phone,
                "email": lead.email,
                "status": lead.status,
                "sources": source_names,
                "createdAt": lead.created_at
            }
        })),
    ))
}

/// GET /api/v1/leads/:id
///
/// Retrieves a lead together with its full routing history: every source that
/// reported it, every lender response and every routing decision.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `id` - The UUID of the lead.
///
/// # Returns
///
/// * `Result<Json<serde_json::Value>, AppError>` - The lead detail or a 404.
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("GET /leads/{}", id);

    let lead = state
        .store
        .find_lead_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;

    let sources = state.store.sources_for_lead(id).await?;
    let responses = state.store.responses_for_lead(id).await?;
    let routing_logs = state.store.routing_logs_for_lead(id).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "id": lead.id,
            "phone": lead.phone,
            "email": lead.email,
            "firstName": lead.first_name,
            "lastName": lead.last_name,
            "dateOfBirth": lead.date_of_birth,
            "monthlyIncome": lead.monthly_income,
            "employmentType": lead.employment_type,
            "panNumber": lead.pan_number,
            "address": lead.address,
            "city": lead.city,
            "state": lead.state,
            "pincode": lead.pincode,
            "status": lead.status,
            "createdAt": lead.created_at,
            "updatedAt": lead.updated_at,
            "sources": sources,
            "lenderResponses": responses,
            "routingLogs": routing_logs
        }
    })))
}

/// POST /api/v1/admin/retry-deduped
///
/// Manually triggers one retry sweep: every duplicate response whose cooldown
/// has lapsed is re-dispatched to its lender. The background job runs the same
/// sweep on a timer; this endpoint exists for operators who do not want to
/// wait for the next tick.
///
/// # Arguments
///
/// * `state` - The application state.
///
/// # Returns
///
/// * `Result<Json<serde_json::Value>, AppError>` - The number of re-dispatched leads.
pub async fn retry_deduped(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /admin/retry-deduped");

    let retried_count = state.retry_service.retry_deduped_leads().await?;

    Ok(Json(json!({
        "success": true,
        "data": { "retriedCount": retried_count }
    })))
}

/// GET /api/v1/admin/lenders
///
/// Lists every known lender with its configuration state and a live health
/// probe. Disabled lenders are reported as unhealthy without being probed.
///
/// # Arguments
///
/// * `state` - The application state.
///
/// # Returns
///
/// * `Result<Json<serde_json::Value>, AppError>` - One entry per lender.
pub async fn list_lenders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("GET /admin/lenders");

    let probes = LenderName::ALL.iter().map(|&name| {
        let registry = Arc::clone(&state.registry);
        let lender = state.config.lender(name);
        async move {
            let healthy = match registry.get(name).await {
                Some(client) => client.is_healthy().await,
                None => false,
            };
            json!({
                "id": lender.id,
                "name": name.as_str(),
                "enabled": lender.is_enabled(),
                "healthy": healthy
            })
        }
    });

    let lenders = join_all(probes).await;

    Ok(Json(json!({
        "success": true,
        "data": lenders
    })))
}
