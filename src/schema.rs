//! Schema cache.
//!
//! Builds and memoizes the textual description of every registered
//! database — tables, column names, and one sample row per table — that
//! grounds both model calls. The description is rebuilt lazily on first
//! use and after any structural change; the cache slot is only ever
//! assigned a fully built string, so readers never observe a partial
//! rebuild.
//!
//! The cache is owned by the session and driven from a single control
//! flow, so at most one rebuild is in flight. If a future embedding drives
//! it concurrently the semantic is latest-wins.

use crate::db::inspect::SchemaInspector;
use crate::db::registry::{ConnectionRegistry, DbPool};
use crate::render::format_value;
use tracing::{debug, warn};

/// Cached textual schema description.
#[derive(Debug, Default)]
pub struct SchemaCache {
    description: Option<String>,
}

impl SchemaCache {
    /// Create an empty (stale) cache.
    pub fn new() -> Self {
        Self { description: None }
    }

    /// Whether a description is currently cached.
    pub fn is_cached(&self) -> bool {
        self.description.is_some()
    }

    /// Drop the cached description; the next lookup rebuilds.
    pub fn invalidate(&mut self) {
        self.description = None;
    }

    /// Return the schema description, rebuilding if absent or when
    /// `force_refresh` is set.
    pub async fn description(
        &mut self,
        registry: &ConnectionRegistry,
        force_refresh: bool,
    ) -> String {
        if !force_refresh {
            if let Some(cached) = &self.description {
                return cached.clone();
            }
        }

        debug!(force_refresh, "Rebuilding schema description");
        let built = build_description(registry).await;
        self.description = Some(built.clone());
        built
    }
}

/// Build the full description across every registry entry.
///
/// Rebuilds never fail: a database that cannot be inspected, or a table
/// whose sample row cannot be fetched, degrades to a note line.
async fn build_description(registry: &ConnectionRegistry) -> String {
    let mut out = String::from("You have access to the following databases:\n");

    for (name, pool) in registry.iter() {
        out.push_str(&format!(
            "\nDatabase `{}` ({}) contains the following tables:\n",
            name,
            pool.db_type()
        ));

        let tables = match SchemaInspector::list_tables(pool).await {
            Ok(tables) => tables,
            Err(e) => {
                warn!(database = %name, error = %e, "Failed to list tables");
                out.push_str(&format!("  (failed to list tables: {})\n", e));
                continue;
            }
        };

        for table in &tables {
            describe_table(pool, table, &mut out).await;
        }
    }

    out
}

async fn describe_table(pool: &DbPool, table: &str, out: &mut String) {
    match SchemaInspector::list_columns(pool, table).await {
        Ok(columns) => {
            out.push_str(&format!("- `{}({})`\n", table, columns.join(", ")));
        }
        Err(e) => {
            warn!(table = %table, error = %e, "Failed to list columns");
            out.push_str(&format!("- `{}` (could not list columns)\n", table));
            return;
        }
    }

    match SchemaInspector::sample_row(pool, table).await {
        Ok(Some(sample)) => {
            let pairs: Vec<String> = sample
                .columns
                .iter()
                .zip(&sample.values)
                .map(|(col, value)| format!("{}={}", col, format_value(value)))
                .collect();
            out.push_str(&format!("   Example: {}\n", pairs.join(", ")));
        }
        Ok(None) => {}
        Err(e) => {
            warn!(table = %table, error = %e, "Failed to fetch sample row");
            out.push_str("   Could not retrieve sample row\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn fixture_registry() -> ConnectionRegistry {
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

        let mut registry = ConnectionRegistry::new();
        registry.register("fixture", DbPool::SQLite(pool));
        registry
    }

    #[tokio::test]
    async fn test_description_contains_tables_and_example() {
        let registry = fixture_registry().await;
        let mut cache = SchemaCache::new();

        let description = cache.description(&registry, false).await;
        assert!(description.contains("Database `fixture`"));
        assert!(description.contains("t(a, b)"));
        assert!(description.contains("Example: a=1, b=hello"));
    }

    #[tokio::test]
    async fn test_description_is_cached_until_refreshed() {
        let registry = fixture_registry().await;
        let mut cache = SchemaCache::new();

        let first = cache.description(&registry, false).await;
        assert!(cache.is_cached());

        // A table added behind the cache's back is invisible until refresh
        if let Some(DbPool::SQLite(pool)) = registry.get("fixture") {
            sqlx::query("CREATE TABLE added_later (x TEXT)")
                .execute(pool)
                .await
                .unwrap();
        }

        let stale = cache.description(&registry, false).await;
        assert_eq!(first, stale);
        assert!(!stale.contains("added_later"));

        let refreshed = cache.description(&registry, true).await;
        assert!(refreshed.contains("added_later"));
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let registry = fixture_registry().await;
        let mut cache = SchemaCache::new();

        cache.description(&registry, false).await;
        cache.invalidate();
        assert!(!cache.is_cached());

        let rebuilt = cache.description(&registry, false).await;
        assert!(rebuilt.contains("t(a, b)"));
    }

    #[tokio::test]
    async fn test_empty_table_has_no_example_line() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE bare (x TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        let mut registry = ConnectionRegistry::new();
        registry.register("db", DbPool::SQLite(pool));

        let mut cache = SchemaCache::new();
        let description = cache.description(&registry, false).await;
        assert!(description.contains("bare(x)"));
        assert!(!description.contains("Example:"));
    }
}
