//! product-advisor HTTP Server
//!
//! Axum server exposing the advisor's single turn entry point plus session
//! maintenance endpoints.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_runtime::OllamaProvider;
use product_advisor::{AdvisorConfig, MemoryCatalog, Orchestrator, ProductCatalog};

use crate::handlers::{chat_handler, clear_session, get_session, health_check};
use crate::state::AppState;

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions/{id}", get(get_session).delete(clear_session))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let provider = Arc::new(OllamaProvider::from_env());
    match provider.list_models().await {
        Ok(models) => {
            tracing::info!("✓ Connected to Ollama");
            for model in models {
                tracing::info!("  Model: {}", model);
            }
        }
        Err(e) => {
            tracing::warn!("⚠ Ollama not available ({}), answers will use fallback rules", e);
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    let config = AdvisorConfig::from_env()?;
    tracing::info!(
        model = %config.model,
        history_cap = config.history_cap,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        timeout_ms = u64::try_from(config.call_timeout.as_millis()).unwrap_or(u64::MAX),
        "Advisor configuration"
    );

    let catalog: Arc<dyn ProductCatalog> = Arc::new(MemoryCatalog::new());
    let advisor = Orchestrator::builder()
        .provider(provider)
        .catalog(catalog)
        .config(config)
        .build()?;

    let tools = advisor.tools();
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools {
        tracing::info!("  • {}", name);
    }

    let advisor = Arc::new(advisor);
    let _maintenance = advisor.spawn_maintenance();

    let app = router(AppState { advisor });

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 product-advisor running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health             - Health check");
    tracing::info!("  POST   /api/chat           - Send message");
    tracing::info!("  GET    /api/sessions/{{id}}  - Session history");
    tracing::info!("  DELETE /api/sessions/{{id}}  - Clear session");

    axum::serve(listener, app).await?;

    Ok(())
}
