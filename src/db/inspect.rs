//! Schema introspection module.
//!
//! Provides the table, column, and sample-row lookups the schema cache is
//! built from, for SQLite, PostgreSQL, and MySQL databases.
//!
//! # Architecture
//!
//! SQL queries are organized in the `queries` submodule with constants for
//! each database type. Database-specific implementations are in their
//! respective submodules (postgres, mysql, sqlite), each providing the same
//! interface.

use crate::db::registry::DbPool;
use crate::db::types::RowValues;
use crate::error::ChatResult;
use serde_json::Value as JsonValue;
use tracing::debug;

/// A sample row paired with its column names, in result order.
#[derive(Debug, Clone)]
pub struct SampleRow {
    pub columns: Vec<String>,
    pub values: Vec<JsonValue>,
}

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// List all base-table names in the database, sorted.
    pub async fn list_tables(pool: &DbPool) -> ChatResult<Vec<String>> {
        match pool {
            DbPool::Postgres(p) => postgres::list_tables(p).await,
            DbPool::MySql(p) => mysql::list_tables(p).await,
            DbPool::SQLite(p) => sqlite::list_tables(p).await,
        }
    }

    /// List a table's column names in ordinal order.
    pub async fn list_columns(pool: &DbPool, table: &str) -> ChatResult<Vec<String>> {
        match pool {
            DbPool::Postgres(p) => postgres::list_columns(p, table).await,
            DbPool::MySql(p) => mysql::list_columns(p, table).await,
            DbPool::SQLite(p) => sqlite::list_columns(p, table).await,
        }
    }

    /// Fetch at most one row from a table, decoded for display.
    pub async fn sample_row(pool: &DbPool, table: &str) -> ChatResult<Option<SampleRow>> {
        match pool {
            DbPool::Postgres(p) => postgres::sample_row(p, table).await,
            DbPool::MySql(p) => mysql::sample_row(p, table).await,
            DbPool::SQLite(p) => sqlite::sample_row(p, table).await,
        }
    }
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT table_name FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#;

        pub const LIST_COLUMNS: &str = r#"
            SELECT column_name FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
            "#;
    }

    pub mod mysql {
        pub const LIST_TABLES: &str = r#"
            SELECT CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE()
            AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            "#;

        pub const LIST_COLUMNS: &str = r#"
            SELECT CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
            "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;
    }
}

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote an identifier with double quotes (PostgreSQL, SQLite).
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an identifier with backticks (MySQL).
fn quote_ident_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod postgres {
    use super::*;
    use sqlx::{PgPool, Row};

    pub async fn list_tables(pool: &PgPool) -> ChatResult<Vec<String>> {
        let rows = sqlx::query(queries::postgres::LIST_TABLES)
            .fetch_all(pool)
            .await?;
        let tables: Vec<String> = rows.iter().map(|r| r.get("table_name")).collect();
        debug!(count = tables.len(), "Listed PostgreSQL tables");
        Ok(tables)
    }

    pub async fn list_columns(pool: &PgPool, table: &str) -> ChatResult<Vec<String>> {
        let rows = sqlx::query(queries::postgres::LIST_COLUMNS)
            .bind(table)
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("column_name")).collect())
    }

    pub async fn sample_row(pool: &PgPool, table: &str) -> ChatResult<Option<SampleRow>> {
        let sql = format!("SELECT * FROM {} LIMIT 1", quote_ident(table));
        let row = sqlx::query(&sql).fetch_optional(pool).await?;
        Ok(row.map(|r| SampleRow {
            columns: r.column_names(),
            values: r.decoded_values(),
        }))
    }
}

mod mysql {
    use super::*;
    use sqlx::MySqlPool;

    /// MySQL may return VARBINARY instead of VARCHAR depending on charset
    /// configuration.
    fn get_string(row: &sqlx::mysql::MySqlRow, column: &str) -> String {
        use sqlx::Row;
        row.try_get::<String, _>(column)
            .ok()
            .or_else(|| {
                row.try_get::<Vec<u8>, _>(column)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
            .unwrap_or_default()
    }

    pub async fn list_tables(pool: &MySqlPool) -> ChatResult<Vec<String>> {
        let rows = sqlx::query(queries::mysql::LIST_TABLES)
            .fetch_all(pool)
            .await?;
        let tables: Vec<String> = rows
            .iter()
            .map(|r| get_string(r, "TABLE_NAME"))
            .filter(|name| !name.is_empty())
            .collect();
        debug!(count = tables.len(), "Listed MySQL tables");
        Ok(tables)
    }

    pub async fn list_columns(pool: &MySqlPool, table: &str) -> ChatResult<Vec<String>> {
        let rows = sqlx::query(queries::mysql::LIST_COLUMNS)
            .bind(table)
            .fetch_all(pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| get_string(r, "COLUMN_NAME"))
            .filter(|name| !name.is_empty())
            .collect())
    }

    pub async fn sample_row(pool: &MySqlPool, table: &str) -> ChatResult<Option<SampleRow>> {
        let sql = format!("SELECT * FROM {} LIMIT 1", quote_ident_mysql(table));
        let row = sqlx::query(&sql).fetch_optional(pool).await?;
        Ok(row.map(|r| SampleRow {
            columns: r.column_names(),
            values: r.decoded_values(),
        }))
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    pub async fn list_tables(pool: &SqlitePool) -> ChatResult<Vec<String>> {
        let rows = sqlx::query(queries::sqlite::LIST_TABLES)
            .fetch_all(pool)
            .await?;
        let tables: Vec<String> = rows.iter().map(|r| r.get("name")).collect();
        debug!(count = tables.len(), "Listed SQLite tables");
        Ok(tables)
    }

    pub async fn list_columns(pool: &SqlitePool, table: &str) -> ChatResult<Vec<String>> {
        let pragma_query = format!("PRAGMA table_info({})", super::quote_ident(table));
        let rows = sqlx::query(&pragma_query).fetch_all(pool).await?;
        Ok(rows.iter().map(|r| r.get("name")).collect())
    }

    pub async fn sample_row(pool: &SqlitePool, table: &str) -> ChatResult<Option<SampleRow>> {
        let sql = format!("SELECT * FROM {} LIMIT 1", quote_ident(table));
        let row = sqlx::query(&sql).fetch_optional(pool).await?;
        Ok(row.map(|r| SampleRow {
            columns: r.column_names(),
            values: r.decoded_values(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_ident_mysql("users"), "`users`");
    }

    async fn fixture_pool() -> DbPool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t (a INTEGER, b TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t VALUES (1, 'hello')")
            .execute(&pool)
            .await
            .unwrap();
        DbPool::SQLite(pool)
    }

    #[tokio::test]
    async fn test_sqlite_list_tables_and_columns() {
        let pool = fixture_pool().await;
        assert_eq!(SchemaInspector::list_tables(&pool).await.unwrap(), vec!["t"]);
        assert_eq!(
            SchemaInspector::list_columns(&pool, "t").await.unwrap(),
            vec!["a", "b"]
        );
    }

    #[tokio::test]
    async fn test_sqlite_sample_row() {
        let pool = fixture_pool().await;
        let sample = SchemaInspector::sample_row(&pool, "t").await.unwrap().unwrap();
        assert_eq!(sample.columns, vec!["a", "b"]);
        assert_eq!(sample.values[0], serde_json::json!(1));
        assert_eq!(sample.values[1], serde_json::json!("hello"));
    }

    #[tokio::test]
    async fn test_sqlite_sample_row_empty_table() {
        let pool = fixture_pool().await;
        if let DbPool::SQLite(p) = &pool {
            sqlx::query("CREATE TABLE empty_t (x TEXT)")
                .execute(p)
                .await
                .unwrap();
        }
        let sample = SchemaInspector::sample_row(&pool, "empty_t").await.unwrap();
        assert!(sample.is_none());
    }
}
