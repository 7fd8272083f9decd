//! Integration tests for database migrations and connection pooling.
//!
//! Each test creates a unique temporary database in the shared PostgreSQL
//! instance (see `planhub-test-utils`) and drops it on completion.

use sqlx::Row;
use uuid::Uuid;

use planhub_db::config::DbConfig;
use planhub_db::models::OrgRole;
use planhub_db::pool;
use planhub_db::queries::plans;
use planhub_test_utils::{create_test_db, drop_test_db, pg_url, seed_fixture};

/// Expected tables created by the initial migration.
const EXPECTED_TABLES: &[&str] = &["orgs", "orgs_users", "plans", "projects", "users"];

#[tokio::test]
async fn migrations_create_all_tables() {
    let (pool, db_name) = create_test_db().await;

    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT tablename::text FROM pg_tables \
         WHERE schemaname = 'public' \
         ORDER BY tablename",
    )
    .fetch_all(&pool)
    .await
    .expect("should list tables");

    let user_tables: Vec<&str> = rows
        .iter()
        .map(|(name,)| name.as_str())
        .filter(|t| !t.starts_with("_sqlx"))
        .collect();

    assert_eq!(
        user_tables, EXPECTED_TABLES,
        "migration should create exactly the expected tables"
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (pool, db_name) = create_test_db().await;

    // create_test_db already migrated; a second run must be a no-op.
    pool::run_migrations(&pool)
        .await
        .expect("second migration run should succeed (idempotent)");

    for table in EXPECTED_TABLES {
        let query = format!("SELECT COUNT(*) AS cnt FROM {table}");
        let row = sqlx::query(&query)
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("failed to count {table}: {e}"));
        let count: i64 = row.get("cnt");
        assert_eq!(count, 0, "table {table} should be empty after migrations");
    }

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn summarize_counts_rows_and_plan_states() {
    let (pool, db_name) = create_test_db().await;

    let empty = pool::summarize(&pool)
        .await
        .expect("summarize should succeed");
    assert_eq!(empty, pool::DbSummary::default());

    let fx = seed_fixture(&pool, OrgRole::Owner, false).await;
    let mut inserted = Vec::new();
    for name in ["draft", "alpha", "beta"] {
        let plan = plans::insert_plan(&pool, fx.org.id, fx.project.id, fx.user.id, name)
            .await
            .expect("insert should succeed")
            .expect("name should be free");
        inserted.push(plan);
    }
    plans::set_plan_archived(&pool, inserted[2].id, true)
        .await
        .expect("archive should succeed");

    let summary = pool::summarize(&pool)
        .await
        .expect("summarize should succeed");
    assert_eq!(
        summary,
        pool::DbSummary {
            orgs: 1,
            users: 1,
            projects: 1,
            plans: 3,
            drafts: 1,
            archived: 1,
        }
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn ensure_database_exists_is_idempotent() {
    let db_name = format!("planhub_test_{}", Uuid::new_v4().simple());
    let base_url = pg_url().await;
    let config = DbConfig::new(format!("{base_url}/{db_name}"));

    pool::ensure_database_exists(&config)
        .await
        .expect("first ensure should succeed");

    pool::ensure_database_exists(&config)
        .await
        .expect("second ensure should succeed (idempotent)");

    let created = pool::create_pool(&config)
        .await
        .expect("should connect to the created database");
    created.close().await;

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn ensure_database_exists_rejects_unsafe_names() {
    let base_url = pg_url().await;
    let config = DbConfig::new(format!("{base_url}/bad-name;drop"));

    let err = pool::ensure_database_exists(&config)
        .await
        .expect_err("unsafe name should be rejected");
    assert!(
        format!("{err:#}").contains("invalid characters"),
        "unexpected error: {err:#}"
    );
}
