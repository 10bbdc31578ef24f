//! Error taxonomy for the tax-query agent.
//!
//! Every turn failure is attributed to the pipeline stage that produced it,
//! and the taxonomy separates what a client may see from what only the server
//! log records: `Upstream` keeps its diagnostic detail out of the rendered
//! message entirely, and timeouts render a message distinct from generic
//! upstream failure so the two are never conflated.

use std::fmt;

use thiserror::Error;

use crate::sql_validator::SqlViolation;

/// Pipeline stage a failure is attributed to. Used in logs, never shown to
/// end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    SynthesizingSql,
    Validating,
    Executing,
    Summarizing,
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnStage::SynthesizingSql => write!(f, "sql_synthesis"),
            TurnStage::Validating => write!(f, "validation"),
            TurnStage::Executing => write!(f, "execution"),
            TurnStage::Summarizing => write!(f, "summary"),
        }
    }
}

/// Main error type for an agent turn.
///
/// Rendered messages are what the HTTP layer serializes to clients, so they
/// stay in user language and never carry SQL, connection strings, or upstream
/// response bodies.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The request itself was unusable (blank question, missing tenant).
    #[error("{reason}")]
    InvalidInput { reason: String },

    /// Generated SQL failed the security gate. No data was touched; the
    /// offending statement is carried for the diagnostic response field only.
    #[error("{violation}")]
    SqlRejected { violation: SqlViolation, sql: String },

    /// An outbound call exceeded its deadline.
    #[error("La consulta tardó demasiado en completarse y fue cancelada. Intenta nuevamente con una pregunta más acotada.")]
    UpstreamTimeout { stage: TurnStage },

    /// An outbound dependency failed. `detail` is for the server log only
    /// and is deliberately absent from the rendered message.
    #[error("No fue posible completar la consulta. Intenta de nuevo en unos momentos.")]
    Upstream { stage: TurnStage, detail: String },

    /// The text-generation credential is not configured.
    #[error("{0}")]
    MissingCredential(String),
}

impl AgentError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        AgentError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn upstream(stage: TurnStage, detail: impl Into<String>) -> Self {
        AgentError::Upstream {
            stage,
            detail: detail.into(),
        }
    }

    /// Stage the failure occurred in, when the variant carries one.
    pub fn stage(&self) -> Option<TurnStage> {
        match self {
            AgentError::UpstreamTimeout { stage } | AgentError::Upstream { stage, .. } => {
                Some(*stage)
            }
            AgentError::SqlRejected { .. } => Some(TurnStage::Validating),
            _ => None,
        }
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
