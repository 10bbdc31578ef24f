//! Turn orchestration.
//!
//! Drives one question through the full pipeline:
//! SYNTHESIZING_SQL -> VALIDATING -> EXECUTING -> SUMMARIZING -> DONE, with
//! ERROR reachable from any non-DONE stage. The two LLM calls are strictly
//! sequential and each outbound call carries its own deadline, so a timeout
//! is always attributable to exactly one stage. No retries: a failed turn
//! ends immediately and re-submission is a fresh turn.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::ai::client::{LlmClient, LlmError, StructuredRequest};
use crate::ai::prompt;
use crate::error::{AgentError, AgentResult, TurnStage};
use crate::executor::{ChannelError, ExecutionChannel, Row};
use crate::shaper::{self, ShapedResult};
use crate::sql_validator::SqlSecurityValidator;
use crate::tenant::TenantScope;

/// Per-turn resource limits.
#[derive(Debug, Clone)]
pub struct TurnLimits {
    /// Deadline for each LLM call, applied independently.
    pub llm_deadline: Duration,

    /// Deadline for the execution-channel call.
    pub sql_deadline: Duration,

    /// Highlights kept from the narrative payload.
    pub max_highlights: usize,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            llm_deadline: Duration::from_secs(30),
            sql_deadline: Duration::from_secs(20),
            max_highlights: 5,
        }
    }
}

/// One turn's input, resolved at the HTTP boundary.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub question: String,
    pub scope: TenantScope,
    pub schema_summary: String,

    /// Recent user questions, oldest first. Context only, never authoritative.
    pub hints: Vec<String>,

    /// Date the relative-date rules anchor to.
    pub today: NaiveDate,
}

/// The DONE emission of a successful turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub summary: String,
    pub highlights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    pub row_count: usize,
    pub preview_rows: Vec<Row>,
}

/// Structured payload of LLM call #1. Ephemeral: validated, executed, then
/// discarded. Shape mismatches fail explicitly.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SqlCandidate {
    summary: String,
    sql: String,
    #[serde(default)]
    #[allow(dead_code)]
    validation: Option<String>,
    #[serde(default)]
    follow_up: Option<String>,
}

/// Structured payload of LLM call #2. The missing-array fallback is the one
/// documented bounded default.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NarrativePayload {
    summary: String,
    #[serde(default)]
    highlights: Option<Vec<String>>,
    #[serde(default)]
    follow_up: Option<String>,
}

/// Orchestrates one turn over the LLM and execution-channel seams.
pub struct AgentOrchestrator {
    llm: Arc<dyn LlmClient>,
    channel: Arc<dyn ExecutionChannel>,
    limits: TurnLimits,
}

impl AgentOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        channel: Arc<dyn ExecutionChannel>,
        limits: TurnLimits,
    ) -> Self {
        Self {
            llm,
            channel,
            limits,
        }
    }

    /// Run one full turn.
    pub async fn run_turn(&self, request: TurnRequest) -> AgentResult<TurnOutcome> {
        let started = Instant::now();

        // SYNTHESIZING_SQL
        let candidate = self.synthesize_sql(&request).await?;
        debug!(sql = %candidate.sql, "sentencia sintetizada");

        // VALIDATING
        let validator = SqlSecurityValidator::new(&request.scope);
        if let Err(violation) = validator.check(&candidate.sql) {
            warn!(%violation, "sentencia rechazada por la validación de seguridad");
            return Err(AgentError::SqlRejected {
                violation,
                sql: candidate.sql,
            });
        }

        // EXECUTING
        let rows = match self
            .channel
            .run(&candidate.sql, self.limits.sql_deadline)
            .await
        {
            Ok(rows) => rows,
            Err(ChannelError::Timeout) => {
                warn!(stage = %TurnStage::Executing, "el canal de ejecución excedió su plazo");
                return Err(AgentError::UpstreamTimeout {
                    stage: TurnStage::Executing,
                });
            }
            Err(ChannelError::Backend(detail)) => {
                error!(stage = %TurnStage::Executing, %detail, "fallo del canal de ejecución");
                return Err(AgentError::upstream(TurnStage::Executing, detail));
            }
        };

        // SUMMARIZING
        let shaped = shaper::shape(&rows);
        let narrative = self.summarize(&request, &candidate, &shaped).await?;

        let mut highlights = narrative.highlights.unwrap_or_default();
        highlights.truncate(self.limits.max_highlights);

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            row_count = shaped.row_count,
            "turno completado"
        );

        // DONE
        Ok(TurnOutcome {
            summary: narrative.summary,
            highlights,
            follow_up: narrative.follow_up.or(candidate.follow_up),
            row_count: shaped.row_count,
            preview_rows: shaped.preview_rows,
        })
    }

    async fn synthesize_sql(&self, request: &TurnRequest) -> AgentResult<SqlCandidate> {
        let stage = TurnStage::SynthesizingSql;
        let structured = StructuredRequest {
            system_prompt: prompt::synthesis_system_prompt(
                &request.schema_summary,
                &request.scope,
                &request.hints,
                request.today,
            ),
            user_prompt: request.question.clone(),
            schema_name: "consulta_sql",
            schema: prompt::synthesis_schema(),
            temperature: 0.1,
            deadline: self.limits.llm_deadline,
        };

        let payload = self
            .llm
            .generate_structured(structured)
            .await
            .map_err(|err| map_llm_error(stage, err))?;

        serde_json::from_value(payload).map_err(|err| {
            error!(stage = %stage, %err, "carga de síntesis fuera del contrato");
            AgentError::upstream(stage, format!("carga de síntesis inválida: {}", err))
        })
    }

    async fn summarize(
        &self,
        request: &TurnRequest,
        candidate: &SqlCandidate,
        shaped: &ShapedResult,
    ) -> AgentResult<NarrativePayload> {
        let stage = TurnStage::Summarizing;
        let structured = StructuredRequest {
            system_prompt: prompt::summary_system_prompt(),
            user_prompt: prompt::summary_user_prompt(
                &request.question,
                &candidate.summary,
                shaped.row_count,
                &shaped.llm_rows,
            ),
            schema_name: "respuesta_narrativa",
            schema: prompt::summary_schema(),
            temperature: 0.6,
            deadline: self.limits.llm_deadline,
        };

        let payload = self
            .llm
            .generate_structured(structured)
            .await
            .map_err(|err| map_llm_error(stage, err))?;

        serde_json::from_value(payload).map_err(|err| {
            error!(stage = %stage, %err, "carga narrativa fuera del contrato");
            AgentError::upstream(stage, format!("carga narrativa inválida: {}", err))
        })
    }
}

/// Classify an LLM-call failure into the turn taxonomy. Detail stays in the
/// server log; the rendered messages never carry it.
fn map_llm_error(stage: TurnStage, err: LlmError) -> AgentError {
    match err {
        LlmError::Timeout => {
            warn!(stage = %stage, "la llamada al servicio de lenguaje excedió su plazo");
            AgentError::UpstreamTimeout { stage }
        }
        LlmError::MissingCredential => AgentError::MissingCredential(err.to_string()),
        other => {
            error!(stage = %stage, detail = %other, "fallo del servicio de lenguaje");
            AgentError::upstream(stage, other.to_string())
        }
    }
}
