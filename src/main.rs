mod config;
mod db;
mod eligibility;
mod errors;
mod handlers;
mod lenders;
mod models;
mod retry;
mod routing;
mod storage;
mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::handlers::AppState;
use crate::lenders::LenderRegistry;
use crate::retry::{RetryJob, RetryService};
use crate::routing::RoutingService;
use crate::storage::{LeadStore, PgLeadStore};

/// Resolves when the process receives Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection.
/// - Lender adapter registry and routing services.
/// - The background retry job for deduped leads.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok if the server runs successfully, or an error if initialization fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_lead_router=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Wire the routing pipeline
    let store: Arc<dyn LeadStore> = Arc::new(PgLeadStore::new(db.pool.clone()));
    let registry = Arc::new(LenderRegistry::new(Arc::clone(&config)));
    let router_service = Arc::new(RoutingService::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        Arc::clone(&config),
    ));
    let retry_service = Arc::new(RetryService::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        Arc::clone(&router_service),
    ));

    // Background sweep that re-dispatches deduped leads after their cooldown
    let retry_handle =
        RetryJob::new(Arc::clone(&retry_service), config.retry_interval_minutes).spawn();

    // Build application state
    let app_state = Arc::new(AppState {
        config: Arc::clone(&config),
        store,
        registry,
        router: router_service,
        retry_service,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/v1/leads", post(handlers::process_lead))
        .route("/api/v1/leads/:id", get(handlers::get_lead))
        .route(
            "/api/v1/admin/retry-deduped",
            post(handlers::retry_deduped),
        )
        .route("/api/v1/admin/lenders", get(handlers::list_lenders))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the background sweep before exiting
    retry_handle.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
