//! LLM client seam.
//!
//! Unified interface over text-generation backends. Every call is structured:
//! the request carries a strict JSON schema the backend must satisfy, and the
//! client returns the parsed JSON value or a classified error. Mocked in
//! tests; implemented over HTTP in `openai.rs`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// One structured-output call.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub system_prompt: String,
    pub user_prompt: String,

    /// Name of the response schema, for the backend's schema registry.
    pub schema_name: &'static str,

    /// Strict JSON schema the response must satisfy.
    pub schema: Value,

    pub temperature: f32,

    /// Hard deadline for this call alone, never shared with other calls.
    pub deadline: Duration,
}

/// Classified failure of one structured call. Timeouts stay distinct from
/// generic API failures so the orchestrator can attribute them.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("La clave del servicio de lenguaje no está configurada (OPENAI_API_KEY).")]
    MissingCredential,

    #[error("structured call exceeded its deadline")]
    Timeout,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unparsable payload: {0}")]
    Payload(String),
}

/// Interface for structured text-generation calls.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one structured call and return the schema-shaped JSON value.
    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value, LlmError>;

    /// Model identifier, for logging and the health endpoint.
    fn model_name(&self) -> &str;
}
