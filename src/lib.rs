//! tributo-agent - Natural-language tax-query agent
//!
//! This crate turns a free-text question about a taxpayer's records into a
//! tenant-scoped, read-only SQL query, executes it through a single privileged
//! channel, and narrates the result back in plain Spanish.
//!
//! ## Turn pipeline
//! Question + tenant scope -> prompt build -> LLM call #1 (SQL synthesis)
//! -> security validation -> scoped execution -> result shaping
//! -> LLM call #2 (narrative) -> structured outcome.
//!
//! The security validator is the sole trust boundary between model output and
//! live multi-tenant data: nothing reaches the database without passing it.

// Core error handling
pub mod error;

// Configuration and tenant scoping
pub mod config;
pub mod tenant;

// Schema catalog summarization
pub mod catalog;

// SQL security gate
pub mod sql_validator;

// Execution channel and result shaping
pub mod executor;
pub mod shaper;

// Client-side conversation log contract
pub mod conversation;

// Text-generation clients and prompt construction
pub mod ai;

// Turn orchestration
pub mod orchestrator;

// REST API
pub mod api;

// Core re-exports
pub use config::{AgentConfig, LlmConfig};
pub use error::{AgentError, AgentResult, TurnStage};
pub use executor::{ChannelError, ExecutionChannel, QueryExecutor, Row};
pub use orchestrator::{AgentOrchestrator, TurnLimits, TurnOutcome, TurnRequest};
pub use shaper::{shape, ShapedResult};
pub use sql_validator::{SqlSecurityValidator, SqlViolation};
pub use tenant::{TenantScope, TENANT_COLUMN};
