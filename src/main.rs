use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use legal_intake_api::assistant::AssistantClient;
use legal_intake_api::config::Config;
use legal_intake_api::crm::CrmClient;
use legal_intake_api::documents::{DocumentProcessor, MAX_UPLOAD_BYTES};
use legal_intake_api::handlers::{self, AppState};
use legal_intake_api::storage::{CaseStore, Database};

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the database pool and schema, the
/// upload directory, and the external clients, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "legal_intake_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool and schema
    let db = Database::new(&config.database_url).await?;
    db.migrate().await?;
    tracing::info!("Database connection pool established");

    // Prepare the upload store
    let documents = DocumentProcessor::new(&config.upload_dir);
    documents.ensure_upload_dir().await.map_err(|e| {
        anyhow::anyhow!("failed to prepare upload directory: {}", e)
    })?;

    let assistant = AssistantClient::new(&config);
    let crm = CrmClient::new(&config);
    if crm.is_configured() {
        tracing::info!("✓ HubSpot client initialized: {}", config.hubspot_base_url);
    }

    let upload_dir = config.upload_dir.clone();
    let port = config.port;

    // Build application state
    let app_state = Arc::new(AppState {
        config,
        store: CaseStore::new(db.pool.clone()),
        documents,
        assistant,
        crm,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/cases", post(handlers::create_case))
        .route("/api/cases/:id/upload", post(handlers::upload_report))
        .route("/api/cases/:id/confirm", post(handlers::confirm_fields))
        .route("/api/cases/:id/identify", post(handlers::identify))
        .route("/api/cases/:id/escalate", post(handlers::escalate))
        .layer(
            ServiceBuilder::new()
                // Request size limit: uploads are capped at 10MB. The default
                // axum body cap is lower and must be raised to match.
                .layer(handlers::upload_body_limit())
                .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting; uploaded reports are served back
    // to the confirmation screen from the upload directory
    let app = Router::new()
        .route("/api/health", get(handlers::health))
        .merge(protected_routes)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
