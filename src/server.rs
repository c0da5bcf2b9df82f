//! # Server Configuration
//!
//! Router assembly and startup for the integrations API.

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::automation::{AutomationEngine, LoggingAutomation};
use crate::config::AppConfig;
use crate::connectors::IntegrationFactory;
use crate::handlers;
use crate::repositories::{IntegrationStore, MemoryStore};
use crate::webhook_service::WebhookService;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub factory: IntegrationFactory,
    pub store: Arc<dyn IntegrationStore>,
    pub webhooks: WebhookService,
}

impl AppState {
    /// Wire the state from its parts; the factory is shared with the webhook service.
    pub fn from_parts(
        factory: IntegrationFactory,
        store: Arc<dyn IntegrationStore>,
        automation: Arc<dyn AutomationEngine>,
    ) -> Self {
        let config = Arc::new(factory.config().clone());
        let webhooks = WebhookService::new(factory.clone(), Arc::clone(&store), automation);
        Self {
            config,
            factory,
            store,
            webhooks,
        }
    }

    /// Default wiring: in-memory store and the logging automation engine.
    pub fn new(config: Arc<AppConfig>) -> Result<Self, reqwest::Error> {
        let factory = IntegrationFactory::new(config)?;
        Ok(Self::from_parts(
            factory,
            Arc::new(MemoryStore::new()),
            Arc::new(LoggingAutomation),
        ))
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/integrations", get(handlers::integrations::list_integrations))
        .route(
            "/integrations/{integration_type}/capabilities",
            get(handlers::integrations::get_capabilities),
        )
        .route(
            "/integrations/{integration_type}/authorize",
            get(handlers::integrations::authorize),
        )
        .route(
            "/integrations/{integration_type}/callback",
            post(handlers::integrations::callback),
        )
        .route(
            "/integrations/{integration_type}/test",
            get(handlers::integrations::test_connection),
        )
        .route(
            "/integrations/{integration_type}/sync/{entity}",
            post(handlers::integrations::sync),
        )
        .route(
            "/integrations/{integration_type}/logs",
            get(handlers::integrations::list_logs),
        )
        .route("/webhooks", post(handlers::webhooks::register_webhook))
        .route("/webhooks/{id}", delete(handlers::webhooks::unregister_webhook))
        .route("/webhooks/{id}/test", post(handlers::webhooks::test_webhook))
        .route("/webhooks/{id}/stats", get(handlers::webhooks::webhook_stats))
        .route("/webhooks/{id}/receive", post(handlers::webhooks::receive_webhook))
        .route(
            "/webhooks/deliveries/{delivery_id}/retry",
            post(handlers::webhooks::retry_delivery),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    for provider in config.unconfigured_providers() {
        warn!(provider, "Provider credentials missing; OAuth calls will fail");
    }

    let profile = config.profile.clone();
    let state = AppState::new(Arc::new(config))?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
