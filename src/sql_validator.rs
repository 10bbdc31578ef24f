//! SQL security gate.
//!
//! The sole trust boundary between model-generated SQL and live multi-tenant
//! data. A candidate statement runs only if it is a SELECT, contains no
//! mutating/DDL keyword anywhere, and carries a literal equality filter on the
//! tenant column against the session's exact scope value.
//!
//! The gate is deliberately syntactic: ordered substring/regex rules rather
//! than a SQL parser. Known limitation: a column literally named e.g.
//! `dropoff` is rejected, and sufficiently creative encoding could in
//! principle slip past substring denial. The tradeoff is an auditable rule
//! set over exhaustive correctness.

use regex::Regex;
use thiserror::Error;

use crate::tenant::{TenantScope, TENANT_COLUMN};

/// Keywords whose presence anywhere in the statement aborts validation.
pub const DENYLIST: [&str; 6] = ["insert", "update", "delete", "drop", "alter", "truncate"];

/// A specific rule violation. Messages are user-facing Spanish and never
/// technical; the offending SQL travels separately as diagnostic data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlViolation {
    #[error("La consulta generada está vacía. Intenta reformular tu pregunta.")]
    Empty,

    #[error("Solo se permiten consultas de lectura (SELECT).")]
    NotSelect,

    #[error("La consulta contiene una operación no permitida ('{keyword}').")]
    ForbiddenKeyword { keyword: String },

    #[error("La consulta no filtra por el RUC del contribuyente.")]
    MissingTenantFilter,

    #[error("La consulta no está limitada al RUC de tu sesión.")]
    TenantMismatch,
}

/// Rule-based validator bound to one tenant scope.
#[derive(Debug, Clone)]
pub struct SqlSecurityValidator {
    scope: TenantScope,
    tenant_equality: Regex,
}

impl SqlSecurityValidator {
    /// Build a validator for the given scope. The scope literal is
    /// regex-escaped, so construction cannot fail on malformed input.
    pub fn new(scope: &TenantScope) -> Self {
        let pattern = format!(
            r"(?i){}\s*=\s*'?{}\b'?",
            TENANT_COLUMN,
            regex::escape(scope.as_str())
        );
        let tenant_equality =
            Regex::new(&pattern).expect("escaped tenant literal always compiles");
        Self {
            scope: scope.clone(),
            tenant_equality,
        }
    }

    /// Check a candidate statement against every rule, in order. Pure and
    /// idempotent: the same input always yields the same result.
    pub fn check(&self, sql: &str) -> Result<(), SqlViolation> {
        let normalized = normalize(sql);

        if normalized.is_empty() {
            return Err(SqlViolation::Empty);
        }

        let lowered = normalized.to_lowercase();

        if !lowered.starts_with("select") {
            return Err(SqlViolation::NotSelect);
        }

        for keyword in DENYLIST {
            if lowered.contains(keyword) {
                return Err(SqlViolation::ForbiddenKeyword {
                    keyword: keyword.to_string(),
                });
            }
        }

        if !lowered.contains(TENANT_COLUMN) {
            return Err(SqlViolation::MissingTenantFilter);
        }

        if !self.tenant_equality.is_match(&normalized) {
            return Err(SqlViolation::TenantMismatch);
        }

        Ok(())
    }

    /// The scope this validator enforces.
    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }
}

/// Trim surrounding whitespace and strip trailing statement terminators.
fn normalize(sql: &str) -> String {
    let mut trimmed = sql.trim();
    while let Some(stripped) = trimmed.strip_suffix(';') {
        trimmed = stripped.trim_end();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> SqlSecurityValidator {
        SqlSecurityValidator::new(&TenantScope::new("1790123456001"))
    }

    fn scoped(sql: &str) -> String {
        format!("{} WHERE contribuyente_ruc = '1790123456001'", sql)
    }

    #[test]
    fn test_valid_select_passes() {
        let sql = scoped("SELECT fecha, total FROM ventas");
        assert_eq!(validator().check(&sql), Ok(()));
    }

    #[test]
    fn test_trailing_terminators_stripped() {
        let sql = format!("{} ;; ", scoped("select * from compras"));
        assert_eq!(validator().check(&sql), Ok(()));
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(validator().check("   ; "), Err(SqlViolation::Empty));
    }

    #[test]
    fn test_non_select_rejected() {
        let result = validator().check("WITH v AS (SELECT 1) SELECT * FROM v");
        assert_eq!(result, Err(SqlViolation::NotSelect));
    }

    #[test]
    fn test_denylist_rejected_despite_leading_select() {
        // Stacked-statement attempt from the model
        let result = validator().check("SELECT * FROM ventas; DROP TABLE ventas;");
        assert_eq!(
            result,
            Err(SqlViolation::ForbiddenKeyword {
                keyword: "drop".to_string()
            })
        );
    }

    #[test]
    fn test_denylist_is_case_insensitive() {
        let sql = scoped("SELECT 1 FROM ventas UNION SELECT 1 WHERE 'x' = 'InSeRt'");
        assert_eq!(
            validator().check(&sql),
            Err(SqlViolation::ForbiddenKeyword {
                keyword: "insert".to_string()
            })
        );
    }

    #[test]
    fn test_denylist_matches_substrings() {
        // Documented overreach: a column named dropoff still trips the gate.
        let sql = scoped("SELECT dropoff FROM ventas");
        assert_eq!(
            validator().check(&sql),
            Err(SqlViolation::ForbiddenKeyword {
                keyword: "drop".to_string()
            })
        );
    }

    #[test]
    fn test_missing_tenant_column_rejected() {
        let result = validator().check("SELECT total FROM ventas WHERE fecha > '2026-01-01'");
        assert_eq!(result, Err(SqlViolation::MissingTenantFilter));
    }

    #[test]
    fn test_other_tenant_rejected() {
        let result = validator()
            .check("SELECT total FROM ventas WHERE contribuyente_ruc = '0992233445001'");
        assert_eq!(result, Err(SqlViolation::TenantMismatch));
    }

    #[test]
    fn test_scope_prefix_does_not_match() {
        // The session scope is a strict prefix of the filtered value
        let result = validator()
            .check("SELECT total FROM ventas WHERE contribuyente_ruc = '17901234560019'");
        assert_eq!(result, Err(SqlViolation::TenantMismatch));
    }

    #[test]
    fn test_unquoted_equality_tolerated() {
        let result =
            validator().check("SELECT total FROM ventas WHERE contribuyente_ruc = 1790123456001");
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_equality_case_and_spacing_tolerated() {
        let result = validator()
            .check("SELECT total FROM ventas WHERE CONTRIBUYENTE_RUC='1790123456001' LIMIT 50");
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_check_is_idempotent() {
        let v = validator();
        let sql = scoped("SELECT fecha FROM retenciones");
        assert_eq!(v.check(&sql), v.check(&sql));
        let bad = "DELETE FROM ventas";
        assert_eq!(v.check(bad), v.check(bad));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_non_select_prefix_always_rejected(prefix in "[a-zA-Z]{1,12}", rest in ".{0,40}") {
            prop_assume!(!prefix.to_lowercase().starts_with("select"));
            let validator = SqlSecurityValidator::new(&TenantScope::new("1790123456001"));
            let sql = format!("{} {}", prefix, rest);
            prop_assert_eq!(validator.check(&sql), Err(SqlViolation::NotSelect));
        }

        #[test]
        fn prop_validation_is_idempotent(sql in ".{0,120}") {
            let validator = SqlSecurityValidator::new(&TenantScope::new("1790123456001"));
            prop_assert_eq!(validator.check(&sql), validator.check(&sql));
        }

        #[test]
        fn prop_denylist_keyword_never_valid(
            keyword in prop::sample::select(DENYLIST.to_vec()),
            padding in "[a-z ]{0,30}",
        ) {
            let validator = SqlSecurityValidator::new(&TenantScope::new("1790123456001"));
            let sql = format!(
                "SELECT * FROM ventas WHERE contribuyente_ruc = '1790123456001' {} {}",
                padding, keyword
            );
            prop_assert!(validator.check(&sql).is_err());
        }
    }
}
