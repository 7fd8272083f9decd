use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/planhub-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Postgres truncates identifiers past this many bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await
        .with_context(|| format!("failed to connect to database at {url}"))
}

/// Create a connection pool for the configured database.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    connect(&config.database_url, config.max_connections).await
}

/// Run all pending embedded migrations against the pool.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    info!(migrations = MIGRATOR.iter().count(), "migrations applied");
    Ok(())
}

/// Check that `name` can be spliced into `CREATE DATABASE` unquoted.
pub fn validate_database_name(name: &str) -> Result<()> {
    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("database name {name:?} contains invalid characters");
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        bail!("database name {name:?} is longer than {MAX_IDENTIFIER_LEN} bytes");
    }
    Ok(())
}

/// Create the configured database through the `postgres` maintenance
/// database unless it already exists.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<()> {
    let db_name = config
        .database_name()
        .context("could not determine database name from URL")?;
    validate_database_name(db_name)?;

    let maint_pool = connect(&config.maintenance_url(), 1).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&maint_pool)
            .await
            .context("failed to query pg_database")?;

    if exists {
        info!(db = db_name, "database already exists");
    } else {
        maint_pool
            .execute(format!("CREATE DATABASE {db_name}").as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        info!(db = db_name, "database created");
    }

    maint_pool.close().await;
    Ok(())
}

/// Row counts reported by `planhub db-init`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct DbSummary {
    pub orgs: i64,
    pub users: i64,
    pub projects: i64,
    pub plans: i64,
    pub drafts: i64,
    pub archived: i64,
}

/// Count orgs, users, projects and plans (with drafts and archived plans
/// broken out) in one round trip.
pub async fn summarize(pool: &PgPool) -> Result<DbSummary> {
    sqlx::query_as::<_, DbSummary>(
        "SELECT \
             (SELECT COUNT(*) FROM orgs) AS orgs, \
             (SELECT COUNT(*) FROM users) AS users, \
             (SELECT COUNT(*) FROM projects) AS projects, \
             COUNT(p.id) AS plans, \
             COUNT(p.id) FILTER (WHERE p.is_draft) AS drafts, \
             COUNT(p.id) FILTER (WHERE p.archived_at IS NOT NULL) AS archived \
         FROM plans p",
    )
    .fetch_one(pool)
    .await
    .context("failed to summarize database")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        for name in ["planhub", "planhub_test_0af3", "_scratch"] {
            validate_database_name(name).unwrap();
        }
    }

    #[test]
    fn rejects_names_needing_quotes() {
        for name in ["bad-name;drop", "1planhub", "", "plan hub", "plänhub"] {
            let err = validate_database_name(name).unwrap_err();
            assert!(err.to_string().contains("invalid characters"), "{name}");
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let name = "p".repeat(MAX_IDENTIFIER_LEN + 1);
        let err = validate_database_name(&name).unwrap_err();
        assert!(err.to_string().contains("longer than"));
    }
}
