//! Chat Agent HTTP Server
//!
//! Axum-based service exposing a tool-using chat agent backed by a
//! local Ollama instance.

mod agent;
mod handlers;
mod settings;
mod state;

use std::sync::Arc;

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::LlmProvider;
use agent_runtime::OllamaProvider;

use crate::agent::AgentCell;
use crate::settings::Settings;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load and validate settings; a bad environment aborts startup
    let settings = Settings::load()?;
    tracing::info!(
        provider = %settings.provider,
        model = %settings.model,
        environment = %settings.environment,
        "Settings loaded"
    );

    // Best-effort startup probe; the agent itself is built lazily on
    // the first chat request
    match OllamaProvider::from_env() {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => {
                tracing::info!("✓ Connected to Ollama");
                if let Ok(models) = provider.list_models().await {
                    for model in models {
                        tracing::info!("  Model: {}", model.id);
                    }
                }
            }
            Ok(false) | Err(_) => {
                tracing::warn!("⚠ Ollama not available - chat requests will fail");
                tracing::warn!("  Make sure Ollama is running: ollama serve");
            }
        },
        Err(e) => {
            tracing::warn!("⚠ Ollama misconfigured: {}", e);
        }
    }

    // Build application state around the construct-once agent cell
    let state = AppState {
        agents: Arc::new(AgentCell::new(settings)),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = handlers::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 chat-server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health - Liveness check");
    tracing::info!("  POST /chat   - Send message to the agent");

    axum::serve(listener, app).await?;

    Ok(())
}
