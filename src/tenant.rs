//! Tenant scoping primitives.
//!
//! Every business table carries a `contribuyente_ruc` column, and every
//! statement the agent executes must filter on it. The scope itself is
//! resolved upstream (session/auth) and arrives here already decided; the
//! agent never chooses or widens it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Column name every generated statement must filter on.
pub const TENANT_COLUMN: &str = "contribuyente_ruc";

/// The taxpayer scope for one turn: the RUC whose records generated SQL is
/// allowed to touch. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantScope(String);

impl TenantScope {
    /// Builds a scope from the session RUC. Surrounding whitespace is not
    /// part of the identity and is trimmed.
    pub fn new(ruc: impl Into<String>) -> Self {
        TenantScope(ruc.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
