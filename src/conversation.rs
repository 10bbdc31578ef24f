//! Client-side conversation log contract.
//!
//! The backend is stateless; the dashboard owns the message history and
//! replays recent questions as non-authoritative hints. This module is the
//! narrow contract for that log: append-only messages, a fixed welcome that
//! survives resets, and hint extraction for the prompt builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::executor::Row;
use crate::orchestrator::TurnOutcome;

/// First message of every conversation. Reset keeps exactly this one.
pub const WELCOME_MESSAGE: &str = "¡Hola! Soy tu asistente tributario. Pregúntame sobre tus \
ventas, compras, retenciones o liquidaciones y responderé con los datos de tu RUC.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One entry of the ordered, append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preview_rows: Vec<Row>,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

impl AgentMessage {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            highlights: Vec::new(),
            follow_up: None,
            row_count: None,
            preview_rows: Vec::new(),
            is_error: false,
            created_at: Utc::now(),
        }
    }
}

/// Ordered message log, seeded with the fixed welcome.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    messages: Vec<AgentMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self {
            messages: vec![AgentMessage::new(MessageRole::Assistant, WELCOME_MESSAGE)],
        }
    }

    /// Append the user's question. Returns the message id.
    pub fn push_user(&mut self, content: impl Into<String>) -> Uuid {
        let message = AgentMessage::new(MessageRole::User, content);
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Append a completed turn as an assistant message.
    pub fn push_turn(&mut self, outcome: &TurnOutcome) -> Uuid {
        let mut message = AgentMessage::new(MessageRole::Assistant, &outcome.summary);
        message.highlights = outcome.highlights.clone();
        message.follow_up = outcome.follow_up.clone();
        message.row_count = Some(outcome.row_count);
        message.preview_rows = outcome.preview_rows.clone();
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Append a failed turn as an error-flagged assistant message.
    pub fn push_error(&mut self, content: impl Into<String>) -> Uuid {
        let mut message = AgentMessage::new(MessageRole::Assistant, content);
        message.is_error = true;
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Truncate back to the welcome message.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
    }

    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    /// Last `n` user questions, oldest first. Fed to the prompt builder as
    /// context hints; never authoritative.
    pub fn recent_user_hints(&self, n: usize) -> Vec<String> {
        let mut hints: Vec<String> = self
            .messages
            .iter()
            .rev()
            .filter(|message| message.role == MessageRole::User)
            .take(n)
            .map(|message| message.content.clone())
            .collect();
        hints.reverse();
        hints
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_outcome() -> TurnOutcome {
        TurnOutcome {
            summary: "Tienes 3 ventas este mes.".to_string(),
            highlights: vec!["Total: $450".to_string()],
            follow_up: Some("¿Quieres el detalle por cliente?".to_string()),
            row_count: 3,
            preview_rows: Vec::new(),
        }
    }

    #[test]
    fn test_new_log_has_exactly_the_welcome() {
        let log = ConversationLog::new();
        assert_eq!(log.messages().len(), 1);
        let first = &log.messages()[0];
        assert_eq!(first.role, MessageRole::Assistant);
        assert_eq!(first.content, WELCOME_MESSAGE);
        assert!(!first.is_error);
    }

    #[test]
    fn test_push_turn_carries_outcome_fields() {
        let mut log = ConversationLog::new();
        log.push_user("¿Cuántas ventas tengo este mes?");
        log.push_turn(&sample_outcome());

        let last = log.messages().last().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert_eq!(last.row_count, Some(3));
        assert_eq!(last.highlights.len(), 1);
        assert!(last.follow_up.is_some());
        assert!(!last.is_error);
    }

    #[test]
    fn test_push_error_is_flagged() {
        let mut log = ConversationLog::new();
        log.push_error("No fue posible completar la consulta.");
        assert!(log.messages().last().unwrap().is_error);
    }

    #[test]
    fn test_reset_keeps_only_the_welcome() {
        let mut log = ConversationLog::new();
        log.push_user("pregunta 1");
        log.push_turn(&sample_outcome());
        log.push_user("pregunta 2");
        log.push_error("falló");
        log.reset();

        assert_eq!(log.messages().len(), 1);
        assert_eq!(log.messages()[0].content, WELCOME_MESSAGE);
    }

    #[test]
    fn test_recent_hints_are_user_only_oldest_first() {
        let mut log = ConversationLog::new();
        log.push_user("primera");
        log.push_turn(&sample_outcome());
        log.push_user("segunda");
        log.push_user("tercera");

        assert_eq!(log.recent_user_hints(2), vec!["segunda", "tercera"]);
        assert_eq!(
            log.recent_user_hints(10),
            vec!["primera", "segunda", "tercera"]
        );
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let mut log = ConversationLog::new();
        log.push_turn(&sample_outcome());
        let json = serde_json::to_string(log.messages().last().unwrap()).unwrap();
        assert!(json.contains("\"rowCount\":3"));
        assert!(json.contains("\"isError\":false"));
        assert!(json.contains("\"followUp\""));
        assert!(json.contains("\"createdAt\""));
    }
}
