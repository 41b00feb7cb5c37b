//! Structural-change detection for schema-cache invalidation.
//!
//! After a statement executes (or fails), the orchestrator needs to know
//! whether it could have changed table definitions; if so, the cached
//! schema description is force-refreshed. Detection parses the statement
//! with sqlparser and classifies the AST, so keywords inside string
//! literals don't trigger spurious refreshes. Statements the parser cannot
//! handle (vendor dialect quirks, partial SQL) fall back to a
//! case-insensitive substring scan.

use sqlparser::ast::{ObjectType, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::debug;

/// Substrings used by the fallback scan when the statement doesn't parse.
const STRUCTURAL_KEYWORDS: &[&str] = &["alter table", "create table", "drop table"];

/// Check whether executing `sql` may have altered table definitions.
///
/// # Examples
///
/// ```
/// use chatdb::db::classify::is_structural_change;
///
/// assert!(is_structural_change("CREATE TABLE t (id INT)"));
/// assert!(is_structural_change("drop table if exists t"));
/// assert!(!is_structural_change("SELECT * FROM t"));
///
/// // Keywords inside string literals don't count
/// assert!(!is_structural_change(
///     "INSERT INTO logs (msg) VALUES ('create table t')"
/// ));
/// ```
pub fn is_structural_change(sql: &str) -> bool {
    let dialect = GenericDialect {};

    match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => statements.iter().any(is_structural_statement),
        Err(e) => {
            debug!(error = %e, "Statement did not parse; using substring scan");
            let lower = sql.to_lowercase();
            STRUCTURAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
        }
    }
}

/// Check if a single statement changes table definitions.
fn is_structural_statement(stmt: &Statement) -> bool {
    match stmt {
        Statement::CreateTable(_) | Statement::AlterTable(_) => true,
        Statement::Drop { object_type, .. } => *object_type == ObjectType::Table,
        _ => false,
    }
}
