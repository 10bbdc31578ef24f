//! Scoped SQL execution channel.
//!
//! Validated SQL reaches the database through exactly one privileged stored
//! routine (`agente_ejecutar_consulta`), never through ad-hoc statements. The
//! routine is SECURITY DEFINER with EXECUTE granted only to the service role,
//! so the whole execution surface is auditable and revocable in one place.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

/// One result row: column name to JSON value, in routine order.
pub type Row = serde_json::Map<String, Value>;

/// Failure of one execution-channel call. `Backend` detail is for the server
/// log; callers surface a generic message instead.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("execution deadline exceeded")]
    Timeout,

    #[error("{0}")]
    Backend(String),
}

/// Seam between the orchestrator and the data backend. Mocked in tests.
#[async_trait]
pub trait ExecutionChannel: Send + Sync {
    /// Run one validator-approved statement under a hard deadline.
    /// All-or-nothing: either the full ordered row-set or a failure.
    async fn run(&self, sql: &str, deadline: Duration) -> Result<Vec<Row>, ChannelError>;
}

/// Production channel: one stored-routine call per turn over a PgPool.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: PgPool,
}

impl QueryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionChannel for QueryExecutor {
    async fn run(&self, sql: &str, deadline: Duration) -> Result<Vec<Row>, ChannelError> {
        let call = sqlx::query_scalar::<_, Value>("SELECT agente_ejecutar_consulta($1)")
            .bind(sql)
            .fetch_one(&self.pool);

        let payload = match tokio::time::timeout(deadline, call).await {
            Err(_elapsed) => return Err(ChannelError::Timeout),
            Ok(Err(error)) => return Err(ChannelError::Backend(error.to_string())),
            Ok(Ok(payload)) => payload,
        };

        let rows = rows_from_payload(payload)?;
        debug!(rows = rows.len(), "consulta ejecutada por el canal privilegiado");
        Ok(rows)
    }
}

/// Decode the routine's jsonb payload into rows. The routine aggregates with
/// `jsonb_agg`, so an empty result may arrive as JSON null.
fn rows_from_payload(payload: Value) -> Result<Vec<Row>, ChannelError> {
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(ChannelError::Backend(format!(
                    "routine returned a non-object row: {}",
                    other
                ))),
            })
            .collect(),
        other => Err(ChannelError::Backend(format!(
            "routine returned a non-array payload: {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_payload_is_empty_result() {
        let rows = rows_from_payload(Value::Null).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_array_of_objects_decodes() {
        let payload = json!([
            {"fecha": "2026-08-01", "total": 150.0},
            {"fecha": "2026-08-02", "total": 80.5}
        ]);
        let rows = rows_from_payload(payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["fecha"], json!("2026-08-01"));
    }

    #[test]
    fn test_non_array_payload_is_backend_error() {
        let result = rows_from_payload(json!({"oops": true}));
        assert!(matches!(result, Err(ChannelError::Backend(_))));
    }

    #[test]
    fn test_non_object_row_is_backend_error() {
        let result = rows_from_payload(json!([1, 2, 3]));
        assert!(matches!(result, Err(ChannelError::Backend(_))));
    }
}
