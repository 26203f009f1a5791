//! Leadline application composition root
//!
//! Wires the ledger backend, the delivery gateway and the LLM service into the messaging
//! domain and mounts its router next to the infrastructure routes.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use leadline_common::config::{Config, StoreProvider};
use leadline_gateway::DeliveryGateway;
use leadline_llm::LlmService;
use leadline_messaging::{
    ChangeNotifier, MemoryStore, MessagingRepositories, MessagingService, MessagingSettings,
    MessagingState, MessagingStore,
};
use sqlx::postgres::PgPoolOptions;

/// Open the ledger backend selected by `STORE_PROVIDER`.
///
/// The postgres provider runs pending migrations before returning.
pub async fn build_store(config: &Config) -> Result<Arc<dyn MessagingStore>, anyhow::Error> {
    match config.store_provider {
        StoreProvider::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreProvider::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for postgres"))?;

            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .map_err(|e| anyhow::anyhow!("Database connection failed: {}", e))?;
            tracing::info!("Database connection established");

            sqlx::migrate!("../../migrations")
                .run(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Database migration failed: {}", e))?;
            tracing::info!("Database migrations applied");

            Ok(Arc::new(MessagingRepositories::new(pool)))
        }
    }
}

/// Create the main application router
pub fn create_app(
    config: &Config,
    store: Arc<dyn MessagingStore>,
    gateway: Arc<dyn DeliveryGateway>,
    llm: Arc<dyn LlmService>,
    send_timeout: Duration,
) -> Router {
    let notifier = Arc::new(ChangeNotifier::with_capacity(config.notifier_capacity));
    let settings = MessagingSettings::from_config(config, send_timeout);
    let service = MessagingService::new(store, notifier, gateway, llm, settings);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .route("/", axum::routing::get(version))
        .merge(leadline_messaging::routes().with_state(MessagingState::new(service)))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

async fn version() -> String {
    format!("Leadline API v{}", env!("CARGO_PKG_VERSION"))
}
