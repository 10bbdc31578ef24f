//! Environment-backed configuration.
//!
//! Read once at startup by the server binary; components receive the parts
//! they need by value. `.env` loading itself happens in the binary via
//! dotenvy, so library consumers stay in control of process environment.

use std::time::Duration;

/// Configuration for the text-generation backend.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Bearer credential. May be absent until the first call; the client
    /// fails that call with an explicit message instead of failing startup.
    pub api_key: Option<String>,

    /// Model identifier sent on every request.
    pub model: String,

    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,

    /// Maximum tokens per completion.
    pub max_tokens: u32,

    /// Hard deadline applied to each outbound call independently.
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

impl LlmConfig {
    /// Read the backend configuration from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            model: std::env::var("AGENTE_LLM_MODEL").unwrap_or(defaults.model),
            base_url: std::env::var("AGENTE_LLM_BASE_URL").unwrap_or(defaults.base_url),
            max_tokens: env_parsed("AGENTE_LLM_MAX_TOKENS", defaults.max_tokens),
            timeout: Duration::from_secs(env_parsed("AGENTE_LLM_TIMEOUT_SECS", 30)),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Top-level configuration for the agent server.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Text-generation backend settings.
    pub llm: LlmConfig,

    /// Postgres connection string for the execution channel.
    pub database_url: String,

    /// Path to the schema document the catalog summarizes.
    pub schema_path: String,

    /// Hard deadline applied to each execution-channel call.
    pub sql_timeout: Duration,

    /// Listen address for the HTTP server.
    pub bind_addr: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            database_url: "postgresql://postgres@localhost/tributo".to_string(),
            schema_path: "db/esquema.sql".to_string(),
            sql_timeout: Duration::from_secs(20),
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl AgentConfig {
    /// Read the full server configuration from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            llm: LlmConfig::from_env(),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            schema_path: std::env::var("AGENTE_ESQUEMA_PATH").unwrap_or(defaults.schema_path),
            sql_timeout: Duration::from_secs(env_parsed("AGENTE_SQL_TIMEOUT_SECS", 20)),
            bind_addr: std::env::var("AGENTE_BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.timeout, Duration::from_secs(30));
        assert_eq!(config.sql_timeout, Duration::from_secs(20));
        assert_eq!(config.schema_path, "db/esquema.sql");
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_builders() {
        let llm = LlmConfig::default()
            .with_api_key("sk-test")
            .with_model("gpt-4o")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(llm.model, "gpt-4o");
        assert_eq!(llm.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_env_parsed_falls_back_on_garbage() {
        std::env::set_var("TRIBUTO_TEST_PARSE_GARBAGE", "not-a-number");
        let value: u64 = env_parsed("TRIBUTO_TEST_PARSE_GARBAGE", 42);
        assert_eq!(value, 42);
        std::env::remove_var("TRIBUTO_TEST_PARSE_GARBAGE");
    }
}
