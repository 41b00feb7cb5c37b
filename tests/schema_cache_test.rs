//! Integration tests for the schema description cache.

use chatdb::db::registry::{ConnectionRegistry, DbPool};
use chatdb::schema::SchemaCache;
use sqlx::sqlite::SqlitePoolOptions;

async fn memory_pool() -> sqlx::SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

#[tokio::test]
async fn test_round_trip_table_and_example_line() {
    let pool = memory_pool().await;
    sqlx::query("CREATE TABLE t (a INTEGER, b TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO t VALUES (1, 'x')")
        .execute(&pool)
        .await
        .unwrap();

    let mut registry = ConnectionRegistry::new();
    registry.register("main", DbPool::SQLite(pool));

    let mut cache = SchemaCache::new();
    let description = cache.description(&registry, false).await;

    assert!(description.contains("t(a, b)"));
    assert!(description.contains("Example: a=1, b=x"));
}

#[tokio::test]
async fn test_databases_listed_in_name_order() {
    let pool_a = memory_pool().await;
    sqlx::query("CREATE TABLE first_t (x TEXT)")
        .execute(&pool_a)
        .await
        .unwrap();
    let pool_b = memory_pool().await;
    sqlx::query("CREATE TABLE second_t (y TEXT)")
        .execute(&pool_b)
        .await
        .unwrap();

    let mut registry = ConnectionRegistry::new();
    registry.register("zoo", DbPool::SQLite(pool_b));
    registry.register("aquarium", DbPool::SQLite(pool_a));

    let mut cache = SchemaCache::new();
    let description = cache.description(&registry, false).await;

    let first = description.find("Database `aquarium`").unwrap();
    let second = description.find("Database `zoo`").unwrap();
    assert!(first < second);
    assert!(description.contains("first_t(x)"));
    assert!(description.contains("second_t(y)"));
}

#[tokio::test]
async fn test_forced_refresh_sees_new_tables() {
    let pool = memory_pool().await;
    sqlx::query("CREATE TABLE before_t (a TEXT)")
        .execute(&pool)
        .await
        .unwrap();

    let mut registry = ConnectionRegistry::new();
    registry.register("main", DbPool::SQLite(pool));

    let mut cache = SchemaCache::new();
    let initial = cache.description(&registry, false).await;
    assert!(initial.contains("before_t"));

    if let Some(DbPool::SQLite(pool)) = registry.get("main") {
        sqlx::query("CREATE TABLE after_t (b TEXT)")
            .execute(pool)
            .await
            .unwrap();
    }

    // Without refresh: the cached description is served unchanged
    let cached = cache.description(&registry, false).await;
    assert!(!cached.contains("after_t"));

    // With refresh: the rebuild reflects the new table
    let refreshed = cache.description(&registry, true).await;
    assert!(refreshed.contains("after_t"));
}
