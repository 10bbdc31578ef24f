//! OpenAI-compatible chat-completions client.
//!
//! Implements the `LlmClient` seam over `POST {base}/chat/completions` with a
//! strict `json_schema` response format. Each call carries its own deadline
//! via `tokio::time::timeout`; a missing credential fails the call, not
//! startup, with an explicit message.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::ai::client::{LlmClient, LlmError, StructuredRequest};
use crate::config::LlmConfig;

/// Chat-completions client over reqwest.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: LlmConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new client. The per-call deadline lives on each request; the
    /// configured timeout doubles as a client-level backstop.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(LlmError::Http)?;
        Ok(Self { config, client })
    }

    /// Extract a human-readable message from a non-2xx body when the backend
    /// provides one; otherwise keep the raw body for the log.
    fn extract_error_message(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|parsed| {
                parsed["error"]["message"]
                    .as_str()
                    .map(|message| message.to_string())
            })
            .unwrap_or_else(|| body.to_string())
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingCredential)?;

        let body = json!({
            "model": self.config.model,
            "temperature": request.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "strict": true,
                    "schema": request.schema
                }
            }
        });

        let url = format!("{}/chat/completions", self.config.base_url);
        debug!(
            model = %self.config.model,
            schema = request.schema_name,
            temperature = request.temperature,
            "llamada estructurada al servicio de lenguaje"
        );

        // One deadline for the whole exchange: a backend that returns headers
        // and then stalls the body must still time out.
        let exchange = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = match tokio::time::timeout(request.deadline, exchange).await {
            Err(_elapsed) => return Err(LlmError::Timeout),
            Ok(Err(error)) if error.is_timeout() => return Err(LlmError::Timeout),
            Ok(Err(error)) => return Err(LlmError::Http(error)),
            Ok(Ok(exchange)) => exchange,
        };

        if !status.is_success() {
            let message = Self::extract_error_message(&text);
            error!(status = status.as_u16(), %message, "error del servicio de lenguaje");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|error| LlmError::Payload(format!("respuesta no deserializable: {}", error)))?;

        let content = completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .ok_or_else(|| LlmError::Payload("respuesta sin contenido".to_string()))?;

        serde_json::from_str(content).map_err(|error| {
            LlmError::Payload(format!("contenido fuera del contrato estructurado: {}", error))
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompt;
    use std::time::Duration;

    #[test]
    fn test_client_creation() {
        let client = OpenAiClient::new(LlmConfig::default());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().model_name(), "gpt-4o-mini");
    }

    #[test]
    fn test_extract_error_message_from_api_body() {
        let body = r#"{"error": {"message": "Invalid API key", "type": "auth"}}"#;
        assert_eq!(OpenAiClient::extract_error_message(body), "Invalid API key");
    }

    #[test]
    fn test_extract_error_message_falls_back_to_raw_body() {
        assert_eq!(
            OpenAiClient::extract_error_message("<html>bad gateway</html>"),
            "<html>bad gateway</html>"
        );
    }

    fn request_with_deadline(deadline: Duration) -> StructuredRequest {
        StructuredRequest {
            system_prompt: "sistema".to_string(),
            user_prompt: "usuario".to_string(),
            schema_name: "consulta_sql",
            schema: prompt::synthesis_schema(),
            temperature: 0.1,
            deadline,
        }
    }

    #[tokio::test]
    async fn test_deadline_covers_a_stalled_body_read() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Backend that answers headers immediately and then never finishes
        // the body
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = [0u8; 8192];
            let _ = socket.read(&mut buffer).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      content-type: application/json\r\n\
                      content-length: 65536\r\n\r\n\
                      {\"choices\":",
                )
                .await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let config = LlmConfig {
            base_url: format!("http://{}", addr),
            ..LlmConfig::default().with_api_key("sk-test")
        };
        let client = OpenAiClient::new(config).unwrap();

        let started = std::time::Instant::now();
        let result = client
            .generate_structured(request_with_deadline(Duration::from_millis(250)))
            .await;

        assert!(matches!(result, Err(LlmError::Timeout)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_at_call_time() {
        let client = OpenAiClient::new(LlmConfig::default()).unwrap();
        let result = client
            .generate_structured(request_with_deadline(Duration::from_secs(1)))
            .await;
        assert!(matches!(result, Err(LlmError::MissingCredential)));
    }
}
