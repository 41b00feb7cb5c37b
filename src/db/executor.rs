//! SQL execution engine.
//!
//! Runs the statements produced by the generation call:
//! - read statements (`query` / `schema_explore`) fetch every row — result
//!   truncation is a summarization-time concern, not an execution-time one
//! - modification statements run inside a transaction and yield a single
//!   synthetic success marker row
//!
//! Statements arrive as plain SQL text with values embedded by the model;
//! they are executed unprepared. Every execution runs under an explicit
//! timeout.
//!
//! # Architecture
//!
//! Database-specific implementations live in submodules (mysql, postgres,
//! sqlite), each providing identical functionality adapted to its driver.

use crate::db::registry::{ConnectionRegistry, DbPool};
use crate::db::types::RowValues;
use crate::error::{ChatDbError, ChatResult};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Default SQL execution timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Text of the synthetic row returned for a committed modification.
pub const MODIFICATION_MARKER: &str = "Modification successful.";

/// An executed result set with implicit column ordering.
///
/// Empty `rows` is a valid zero-row result and is distinct from an
/// execution failure (which surfaces as an error instead).
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
}

impl RowSet {
    /// Create an empty result set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The synthetic single-row result for a committed modification.
    pub fn modification_marker() -> Self {
        Self {
            columns: Vec::new(),
            rows: vec![vec![JsonValue::String(MODIFICATION_MARKER.to_string())]],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Executor for model-generated SQL statements.
pub struct SqlExecutor {
    query_timeout: Duration,
}

impl SqlExecutor {
    /// Create an executor with the default timeout.
    pub fn new() -> Self {
        Self {
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    /// Create an executor with a custom timeout.
    pub fn with_timeout(query_timeout: Duration) -> Self {
        Self { query_timeout }
    }

    /// Execute `sql` against the named database.
    ///
    /// Fails with `UnknownDatabase` when `database` has no registry entry;
    /// nothing is executed in that case. Modifications run inside a
    /// transaction: commit on success, rollback on any failure, so a failed
    /// modification leaves no partial effects.
    pub async fn execute(
        &self,
        registry: &ConnectionRegistry,
        database: &str,
        sql: &str,
        is_modification: bool,
    ) -> ChatResult<RowSet> {
        let pool = registry
            .get(database)
            .ok_or_else(|| ChatDbError::unknown_database(database))?;

        debug!(
            database = %database,
            modification = is_modification,
            sql = %sql,
            "Executing statement"
        );

        if is_modification {
            match pool {
                DbPool::MySql(p) => mysql::execute_modification(p, sql, self.query_timeout).await?,
                DbPool::Postgres(p) => {
                    postgres::execute_modification(p, sql, self.query_timeout).await?
                }
                DbPool::SQLite(p) => {
                    sqlite::execute_modification(p, sql, self.query_timeout).await?
                }
            }
            Ok(RowSet::modification_marker())
        } else {
            match pool {
                DbPool::MySql(p) => mysql::fetch_rows(p, sql, self.query_timeout).await,
                DbPool::Postgres(p) => postgres::fetch_rows(p, sql, self.query_timeout).await,
                DbPool::SQLite(p) => sqlite::fetch_rows(p, sql, self.query_timeout).await,
            }
        }
    }
}

impl Default for SqlExecutor {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn timeout_error(operation: &str, elapsed: Duration) -> ChatDbError {
    ChatDbError::timeout(operation, elapsed.as_secs())
}

fn collect_rows<R: RowValues>(rows: Vec<R>) -> RowSet {
    if rows.is_empty() {
        return RowSet::empty();
    }
    let columns = rows[0].column_names();
    let decoded = rows.iter().map(|r| r.decoded_values()).collect();
    RowSet {
        columns,
        rows: decoded,
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database
// type. The code structure is intentionally parallel to make differences
// obvious.

mod mysql {
    use super::*;
    use sqlx::{Executor, MySqlPool};

    pub async fn fetch_rows(
        pool: &MySqlPool,
        sql: &str,
        query_timeout: Duration,
    ) -> ChatResult<RowSet> {
        match timeout(query_timeout, pool.fetch_all(sql)).await {
            Ok(Ok(rows)) => Ok(collect_rows(rows)),
            Ok(Err(e)) => Err(ChatDbError::from(e)),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn execute_modification(
        pool: &MySqlPool,
        sql: &str,
        query_timeout: Duration,
    ) -> ChatResult<()> {
        let mut tx = pool.begin().await.map_err(ChatDbError::from)?;
        match timeout(query_timeout, (&mut *tx).execute(sql)).await {
            Ok(Ok(_)) => tx.commit().await.map_err(ChatDbError::from),
            Ok(Err(e)) => {
                tx.rollback().await.ok();
                Err(ChatDbError::from(e))
            }
            Err(_) => {
                tx.rollback().await.ok();
                Err(timeout_error("modification", query_timeout))
            }
        }
    }
}

mod postgres {
    use super::*;
    use sqlx::{Executor, PgPool};

    pub async fn fetch_rows(
        pool: &PgPool,
        sql: &str,
        query_timeout: Duration,
    ) -> ChatResult<RowSet> {
        match timeout(query_timeout, pool.fetch_all(sql)).await {
            Ok(Ok(rows)) => Ok(collect_rows(rows)),
            Ok(Err(e)) => Err(ChatDbError::from(e)),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn execute_modification(
        pool: &PgPool,
        sql: &str,
        query_timeout: Duration,
    ) -> ChatResult<()> {
        let mut tx = pool.begin().await.map_err(ChatDbError::from)?;
        match timeout(query_timeout, (&mut *tx).execute(sql)).await {
            Ok(Ok(_)) => tx.commit().await.map_err(ChatDbError::from),
            Ok(Err(e)) => {
                tx.rollback().await.ok();
                Err(ChatDbError::from(e))
            }
            Err(_) => {
                tx.rollback().await.ok();
                Err(timeout_error("modification", query_timeout))
            }
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Executor, SqlitePool};

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        query_timeout: Duration,
    ) -> ChatResult<RowSet> {
        match timeout(query_timeout, pool.fetch_all(sql)).await {
            Ok(Ok(rows)) => Ok(collect_rows(rows)),
            Ok(Err(e)) => Err(ChatDbError::from(e)),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn execute_modification(
        pool: &SqlitePool,
        sql: &str,
        query_timeout: Duration,
    ) -> ChatResult<()> {
        let mut tx = pool.begin().await.map_err(ChatDbError::from)?;
        match timeout(query_timeout, (&mut *tx).execute(sql)).await {
            Ok(Ok(_)) => tx.commit().await.map_err(ChatDbError::from),
            Ok(Err(e)) => {
                tx.rollback().await.ok();
                Err(ChatDbError::from(e))
            }
            Err(_) => {
                tx.rollback().await.ok();
                Err(timeout_error("modification", query_timeout))
            }
        }
    }
}
