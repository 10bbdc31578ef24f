//! Tax-query agent REST API server
//!
//! ## Usage
//!
//! ```bash
//! # Start the server
//! DATABASE_URL=postgresql://localhost/tributo OPENAI_API_KEY=sk-... cargo run --bin agente_server
//!
//! # Ask a question
//! curl -X POST http://localhost:3000/api/agente/consultar \
//!   -H "Content-Type: application/json" \
//!   -d '{"question": "¿Cuál es mi IVA a pagar este mes?", "contribuyenteRuc": "1790123456001"}'
//!
//! curl http://localhost:3000/api/agente/esquema
//! curl http://localhost:3000/api/agente/health
//! ```

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tributo_agent::ai::OpenAiClient;
use tributo_agent::api::{create_agent_router, AgentState};
use tributo_agent::catalog;
use tributo_agent::{AgentConfig, AgentOrchestrator, QueryExecutor, TurnLimits};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AgentConfig::from_env();
    info!(model = %config.llm.model, "iniciando el servidor del agente tributario");

    // Built once per process; an unreadable document degrades to a placeholder
    let schema_summary = catalog::cached_summary(&config.schema_path);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    info!("conexión a la base de datos establecida");

    let llm = Arc::new(OpenAiClient::new(config.llm.clone())?);
    let channel = Arc::new(QueryExecutor::new(pool));
    let limits = TurnLimits {
        llm_deadline: config.llm.timeout,
        sql_deadline: config.sql_timeout,
        ..TurnLimits::default()
    };
    let orchestrator = Arc::new(AgentOrchestrator::new(llm, channel, limits));

    let state = AgentState {
        orchestrator,
        schema_summary: schema_summary.to_string(),
        model: config.llm.model.clone(),
    };

    let app = create_agent_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "servidor escuchando");
    axum::serve(listener, app).await?;

    Ok(())
}
