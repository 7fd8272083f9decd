//! Database query functions for the `orgs` and `orgs_users` tables.

use anyhow::{Context, Result};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{Org, OrgRole};

/// Insert a new organization.
pub async fn insert_org(pool: &PgPool, name: &str) -> Result<Org> {
    let org = sqlx::query_as::<_, Org>("INSERT INTO orgs (name) VALUES ($1) RETURNING *")
        .bind(name)
        .fetch_one(pool)
        .await
        .context("failed to insert org")?;

    Ok(org)
}

/// Fetch an organization by its ID.
pub async fn get_org(pool: &PgPool, id: Uuid) -> Result<Option<Org>> {
    let org = sqlx::query_as::<_, Org>("SELECT * FROM orgs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch org")?;

    Ok(org)
}

/// Add a user to an organization, or change their role if already a member.
///
/// Accepts a pool or an open transaction.
pub async fn upsert_org_user<'e>(
    executor: impl PgExecutor<'e>,
    org_id: Uuid,
    user_id: Uuid,
    role: OrgRole,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO orgs_users (org_id, user_id, role) VALUES ($1, $2, $3) \
         ON CONFLICT (org_id, user_id) DO UPDATE SET role = EXCLUDED.role",
    )
    .bind(org_id)
    .bind(user_id)
    .bind(role)
    .execute(executor)
    .await
    .with_context(|| format!("failed to add user {user_id} to org {org_id}"))?;

    Ok(())
}

/// Look up a user's role in an organization. `None` means not a member.
pub async fn get_org_role(pool: &PgPool, org_id: Uuid, user_id: Uuid) -> Result<Option<OrgRole>> {
    let role: Option<(OrgRole,)> =
        sqlx::query_as("SELECT role FROM orgs_users WHERE org_id = $1 AND user_id = $2")
            .bind(org_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch org role")?;

    Ok(role.map(|(r,)| r))
}
