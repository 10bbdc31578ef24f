//! REST API routes for the tax-query agent
//!
//! Endpoints:
//! - POST /api/agente/consultar - Run one question through the full turn
//! - GET  /api/agente/esquema   - Cached schema summary (dashboard echoes it back)
//! - GET  /api/agente/health    - Health check
//!
//! Response contract:
//! - 200 {summary, highlights, followUp?, rowCount, previewRows}
//! - 400 {error} on unusable input; 400 {error, sql} on SQL rejection
//!   (the sql field is developer diagnostics, never rendered to end users)
//! - 502 {error} on any downstream failure, timeout messages distinct

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::AgentError;
use crate::orchestrator::{AgentOrchestrator, TurnRequest};
use crate::tenant::TenantScope;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultaRequest {
    #[serde(default)]
    pub question: String,

    /// Client-cached summary from GET /api/agente/esquema; the server-side
    /// cache is used when absent or blank.
    #[serde(default)]
    pub schema_summary: Option<String>,

    /// Tenant scope resolved upstream. Required; the agent never guesses it.
    #[serde(default)]
    pub contribuyente_ruc: Option<String>,

    /// Recent user questions, oldest first. Context hints only.
    #[serde(default)]
    pub session_hints: Vec<String>,
}

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct AgentState {
    pub orchestrator: Arc<AgentOrchestrator>,
    pub schema_summary: String,
    pub model: String,
}

// ============================================================================
// Router
// ============================================================================

pub fn create_agent_router(state: AgentState) -> Router {
    Router::new()
        .route("/api/agente/consultar", post(consultar))
        .route("/api/agente/esquema", get(obtener_esquema))
        .route("/api/agente/health", get(health_check))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/agente/consultar - Run one full turn
async fn consultar(
    State(state): State<AgentState>,
    payload: Result<Json<ConsultaRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            warn!(%rejection, "solicitud JSON no interpretable");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "La solicitud no es un JSON válido." })),
            );
        }
    };

    if request.question.trim().is_empty() {
        return error_response(&AgentError::invalid_input(
            "La pregunta no puede estar vacía.",
        ));
    }

    let scope = match request.contribuyente_ruc.as_deref() {
        Some(ruc) if !ruc.trim().is_empty() => TenantScope::new(ruc),
        _ => {
            return error_response(&AgentError::invalid_input(
                "La sesión no tiene un RUC de contribuyente resuelto.",
            ));
        }
    };

    let schema_summary = request
        .schema_summary
        .filter(|summary| !summary.trim().is_empty())
        .unwrap_or_else(|| state.schema_summary.clone());

    let turn = TurnRequest {
        question: request.question,
        scope,
        schema_summary,
        hints: request.session_hints,
        today: Utc::now().date_naive(),
    };

    match state.orchestrator.run_turn(turn).await {
        Ok(outcome) => match serde_json::to_value(&outcome) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(error) => error_response(&AgentError::upstream(
                crate::error::TurnStage::Summarizing,
                format!("resultado no serializable: {}", error),
            )),
        },
        Err(error) => error_response(&error),
    }
}

/// GET /api/agente/esquema - Cached schema summary
async fn obtener_esquema(State(state): State<AgentState>) -> Json<Value> {
    Json(json!({ "schemaSummary": state.schema_summary }))
}

/// GET /api/agente/health - Health check
async fn health_check(State(state): State<AgentState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model,
    }))
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Map a turn failure to its one HTTP shape. Rendered messages are already
/// user-safe; only `SqlRejected` adds the diagnostic sql field.
fn error_response(error: &AgentError) -> (StatusCode, Json<Value>) {
    match error {
        AgentError::InvalidInput { .. } => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": error.to_string() })),
        ),
        AgentError::SqlRejected { sql, .. } => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": error.to_string(), "sql": sql })),
        ),
        AgentError::UpstreamTimeout { .. }
        | AgentError::Upstream { .. }
        | AgentError::MissingCredential(_) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": error.to_string() })),
        ),
    }
}
