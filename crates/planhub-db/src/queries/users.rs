//! Database query functions for the `users` table.
//!
//! Every query returns [`User`] rows with `num_non_draft_plans` computed from
//! the `plans` table.

use anyhow::{Context, Result};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::User;

/// Insert a new user. Accepts a pool or an open transaction.
pub async fn insert_user<'e>(
    executor: impl PgExecutor<'e>,
    email: &str,
    name: &str,
    is_trial: bool,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "WITH u AS ( \
             INSERT INTO users (email, name, is_trial) VALUES ($1, $2, $3) RETURNING * \
         ) \
         SELECT u.*, 0::BIGINT AS num_non_draft_plans FROM u",
    )
    .bind(email)
    .bind(name)
    .bind(is_trial)
    .fetch_one(executor)
    .await
    .with_context(|| format!("failed to insert user {email}"))?;

    Ok(user)
}

/// Fetch a user by ID together with their current non-draft plan count.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT u.*, \
                (SELECT COUNT(*) FROM plans p WHERE p.owner_id = u.id AND NOT p.is_draft) \
                    AS num_non_draft_plans \
         FROM users u \
         WHERE u.id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch user")?;

    Ok(user)
}

/// Move a user on or off the trial tier.
pub async fn set_user_trial(pool: &PgPool, id: Uuid, is_trial: bool) -> Result<()> {
    let result = sqlx::query("UPDATE users SET is_trial = $1 WHERE id = $2")
        .bind(is_trial)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update user trial flag")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("user {id} not found");
    }

    Ok(())
}
