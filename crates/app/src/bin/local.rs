// Leadline API - Local Server

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use leadline_common::config::Config;
use leadline_gateway::{GatewayConfig, GatewayFactory};
use leadline_llm::{LlmConfig, LlmServiceFactory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config);

    info!("Starting Leadline API local server");
    info!(
        store = ?config.store_provider,
        policy = ?config.unknown_status_policy,
        channel = %config.default_channel,
        "Configuration loaded successfully"
    );

    let gateway_config = GatewayConfig::from_env().map_err(|e| {
        error!("Failed to load gateway configuration: {}", e);
        anyhow::anyhow!(e.to_string())
    })?;
    let send_timeout = gateway_config.timeout();
    let gateway = GatewayFactory::create(gateway_config)
        .map_err(|e| anyhow::anyhow!("Gateway setup failed: {}", e))?;

    let llm_config = LlmConfig::from_env().map_err(|e| {
        error!("Failed to load LLM configuration: {}", e);
        anyhow::anyhow!(e.to_string())
    })?;
    let llm = LlmServiceFactory::create(llm_config)
        .map_err(|e| anyhow::anyhow!("LLM setup failed: {}", e))?;

    let store = leadline_app::build_store(&config).await.map_err(|e| {
        error!("Failed to open store: {}", e);
        e
    })?;

    let app = leadline_app::create_app(
        &config,
        store,
        Arc::from(gateway),
        Arc::from(llm),
        send_timeout,
    )
    .layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .into_inner(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server starting on http://{}", addr);
    info!("Health check available at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// JSON logs for `LOG_FORMAT=json`, human-readable otherwise
#[mutants::skip] // Global subscriber can only be installed once per process
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.rust_log));

    if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .init();
    }
}

#[mutants::skip] // Signal handling cannot be exercised in unit tests
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
