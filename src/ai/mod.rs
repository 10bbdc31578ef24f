//! Text-generation integration: the client seam, the OpenAI-compatible
//! implementation, and the pure prompt/schema builders.

pub mod client;
pub mod openai;
pub mod prompt;

pub use client::{LlmClient, LlmError, StructuredRequest};
pub use openai::OpenAiClient;
