//! Schema catalog summarization.
//!
//! Reads the static schema document once per process and condenses it into a
//! compact text blob for prompt injection: enum declarations plus table/column
//! lines, with storage-only clauses (keys, constraints, defaults, references)
//! stripped. An unreadable document degrades to a fixed placeholder summary
//! instead of failing the turn.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

/// Summary used when the schema document cannot be read. Non-empty so the
/// synthesis prompt always carries *some* schema context.
pub const PLACEHOLDER_SUMMARY: &str = "Esquema no disponible. Asume tablas estándar: ventas, \
compras, retenciones y liquidaciones, todas con la columna contribuyente_ruc (varchar), \
columnas de fecha y montos en numeric.";

static SCHEMA_SUMMARY: OnceLock<String> = OnceLock::new();

/// Condense a schema document into the prompt-ready summary.
///
/// Keeps `CREATE TYPE … AS ENUM` declarations and `CREATE TABLE` bodies
/// reduced to `name type [NOT NULL]` per column. Lines that only describe
/// storage (PRIMARY KEY, FOREIGN KEY, CONSTRAINT, UNIQUE, CHECK) are dropped,
/// and inline `DEFAULT`/`REFERENCES`/`GENERATED` tails are cut.
pub fn build_summary(sql: &str) -> String {
    let enum_re = Regex::new(r"(?is)CREATE\s+TYPE\s+(\w+)\s+AS\s+ENUM\s*\(([^)]*)\)")
        .expect("static pattern");
    let table_re = Regex::new(r"(?is)CREATE\s+TABLE(?:\s+IF\s+NOT\s+EXISTS)?\s+(\w+)\s*\((.*?)\)\s*;")
        .expect("static pattern");

    let mut sections = Vec::new();

    for capture in enum_re.captures_iter(sql) {
        let name = &capture[1];
        let values: Vec<String> = capture[2]
            .split(',')
            .map(|value| value.trim().trim_matches('\'').to_string())
            .filter(|value| !value.is_empty())
            .collect();
        sections.push(format!("ENUM {}: {}", name, values.join(", ")));
    }

    for capture in table_re.captures_iter(sql) {
        let name = &capture[1];
        let columns: Vec<String> = capture[2]
            .lines()
            .filter_map(summarize_column)
            .collect();
        if columns.is_empty() {
            continue;
        }
        sections.push(format!("TABLA {} (\n  {}\n)", name, columns.join("\n  ")));
    }

    sections.join("\n\n")
}

/// Reduce one body line to `name type [NOT NULL]`, or drop it entirely.
fn summarize_column(line: &str) -> Option<String> {
    let trimmed = line.trim().trim_end_matches(',').trim();
    if trimmed.is_empty() || trimmed.starts_with("--") {
        return None;
    }

    let upper = trimmed.to_uppercase();
    for table_clause in ["PRIMARY KEY", "FOREIGN KEY", "CONSTRAINT", "UNIQUE", "CHECK"] {
        if upper.starts_with(table_clause) {
            return None;
        }
    }

    static TAIL: OnceLock<Regex> = OnceLock::new();
    let tail = TAIL.get_or_init(|| {
        Regex::new(r"(?i)\s+(DEFAULT|REFERENCES|GENERATED|PRIMARY\s+KEY|UNIQUE|CHECK)\b.*$")
            .expect("static pattern")
    });
    let column = tail.replace(trimmed, "").trim().to_string();
    if column.is_empty() {
        None
    } else {
        Some(column)
    }
}

/// Read the schema document and summarize it. Missing or empty documents are
/// non-fatal: a placeholder summary is returned and the degradation logged.
pub fn load_summary(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(sql) => {
            let summary = build_summary(&sql);
            if summary.is_empty() {
                warn!(path, "documento de esquema sin declaraciones reconocibles, usando resumen de reserva");
                PLACEHOLDER_SUMMARY.to_string()
            } else {
                debug!(path, chars = summary.len(), "resumen de esquema construido");
                summary
            }
        }
        Err(error) => {
            warn!(path, %error, "documento de esquema ilegible, usando resumen de reserva");
            PLACEHOLDER_SUMMARY.to_string()
        }
    }
}

/// Process-wide cached summary. Built lazily on first use, immutable
/// afterwards; a racy double-build only costs one redundant recomputation.
pub fn cached_summary(path: &str) -> &'static str {
    SCHEMA_SUMMARY.get_or_init(|| load_summary(path))
}
