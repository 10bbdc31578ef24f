//! Result shaping.
//!
//! One transformation, two projections: a UI row preview and a compact JSON
//! string re-ingested by the narrative call. Both share the same caps so the
//! model never sees data the user cannot. `row_count` is always the full,
//! unclipped result size.

use serde_json::Value;

use crate::executor::Row;

/// Rows kept in either projection.
pub const MAX_PREVIEW_ROWS: usize = 20;

/// Columns kept per row, in routine key order.
pub const MAX_PREVIEW_COLUMNS: usize = 12;

/// Both projections of one executed result.
#[derive(Debug, Clone)]
pub struct ShapedResult {
    /// Unclipped size of the raw result, independent of display caps.
    pub row_count: usize,

    /// Capped, value-coerced rows for UI display.
    pub preview_rows: Vec<Row>,

    /// The same capped rows as one compact JSON string, for the
    /// summarization call.
    pub llm_rows: String,
}

/// Cap and coerce an executed row-set.
pub fn shape(rows: &[Row]) -> ShapedResult {
    let preview_rows: Vec<Row> = rows
        .iter()
        .take(MAX_PREVIEW_ROWS)
        .map(shape_row)
        .collect();

    let llm_rows = serde_json::to_string(&preview_rows).unwrap_or_else(|_| "[]".to_string());

    ShapedResult {
        row_count: rows.len(),
        preview_rows,
        llm_rows,
    }
}

fn shape_row(row: &Row) -> Row {
    row.iter()
        .take(MAX_PREVIEW_COLUMNS)
        .map(|(column, value)| (column.clone(), coerce(value)))
        .collect()
}

/// Scalars pass through; nested structures are serialized to JSON strings so
/// every cell is safe to render and to re-embed in a prompt.
fn coerce(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => {
            Value::String(serde_json::to_string(value).unwrap_or_else(|_| "null".to_string()))
        }
        scalar => scalar.clone(),
    }
}
