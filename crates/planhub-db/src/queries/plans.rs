//! Database query functions for the `plans` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Plan, PlanStatus};

/// Selects the plans owned by one user in one project.
#[derive(Debug, Clone, Copy)]
pub struct PlanFilter {
    pub project_id: Uuid,
    pub owner_id: Uuid,
    /// `true` lists only archived plans, `false` only live ones.
    pub archived: bool,
    pub status: Option<PlanStatus>,
}

impl PlanFilter {
    /// Live (non-archived) plans of any status.
    pub fn live(project_id: Uuid, owner_id: Uuid) -> Self {
        Self {
            project_id,
            owner_id,
            archived: false,
            status: None,
        }
    }

    /// Archived plans of any status.
    pub fn archived(project_id: Uuid, owner_id: Uuid) -> Self {
        Self {
            archived: true,
            ..Self::live(project_id, owner_id)
        }
    }

    /// Restrict the filter to one status.
    pub fn with_status(self, status: PlanStatus) -> Self {
        Self {
            status: Some(status),
            ..self
        }
    }
}

/// Insert a new plan row.
///
/// Returns `None` without inserting when the (project, owner, name) key is
/// already taken, so callers can tell a lost naming race from a real failure.
pub async fn insert_plan(
    pool: &PgPool,
    org_id: Uuid,
    project_id: Uuid,
    owner_id: Uuid,
    name: &str,
) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "INSERT INTO plans (org_id, project_id, owner_id, name) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT ON CONSTRAINT plans_project_owner_name_key DO NOTHING \
         RETURNING *",
    )
    .bind(org_id)
    .bind(project_id)
    .bind(owner_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to insert plan {name:?}"))?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan(pool: &PgPool, id: Uuid) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plan")?;

    Ok(plan)
}

/// Count plans with exactly this name in a (project, owner) scope.
pub async fn count_plans_by_name(
    pool: &PgPool,
    project_id: Uuid,
    owner_id: Uuid,
    name: &str,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM plans WHERE project_id = $1 AND owner_id = $2 AND name = $3",
    )
    .bind(project_id)
    .bind(owner_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .context("failed to check whether plan exists")?;

    Ok(count)
}

/// List plans matching a filter, most recently updated first.
pub async fn list_owned_plans(pool: &PgPool, filter: &PlanFilter) -> Result<Vec<Plan>> {
    let plans = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans \
         WHERE project_id = $1 \
           AND owner_id = $2 \
           AND (archived_at IS NOT NULL) = $3 \
           AND ($4::text IS NULL OR status = $4) \
         ORDER BY updated_at DESC, created_at DESC",
    )
    .bind(filter.project_id)
    .bind(filter.owner_id)
    .bind(filter.archived)
    .bind(filter.status)
    .fetch_all(pool)
    .await
    .context("failed to list plans")?;

    Ok(plans)
}

/// Delete a single plan row. Returns the number of rows removed.
pub async fn delete_plan(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM plans WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete plan {id}"))?;

    Ok(result.rows_affected())
}

/// Delete every draft plan of an owner in a project. Returns the removed IDs.
pub async fn delete_draft_plans(
    pool: &PgPool,
    org_id: Uuid,
    project_id: Uuid,
    owner_id: Uuid,
) -> Result<Vec<Uuid>> {
    let ids: Vec<(Uuid,)> = sqlx::query_as(
        "DELETE FROM plans \
         WHERE org_id = $1 AND project_id = $2 AND owner_id = $3 AND is_draft \
         RETURNING id",
    )
    .bind(org_id)
    .bind(project_id)
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .context("failed to delete draft plans")?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
}

/// Delete every plan of an owner in a project. Returns the removed IDs.
pub async fn delete_owner_plans(
    pool: &PgPool,
    org_id: Uuid,
    project_id: Uuid,
    owner_id: Uuid,
) -> Result<Vec<Uuid>> {
    let ids: Vec<(Uuid,)> = sqlx::query_as(
        "DELETE FROM plans \
         WHERE org_id = $1 AND project_id = $2 AND owner_id = $3 \
         RETURNING id",
    )
    .bind(org_id)
    .bind(project_id)
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .context("failed to delete owner plans")?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
}

/// Archive or unarchive a plan. Archiving an archived plan keeps its
/// original `archived_at`. Returns `None` if the plan does not exist.
pub async fn set_plan_archived(pool: &PgPool, id: Uuid, archived: bool) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE plans \
         SET archived_at = CASE WHEN $2 THEN COALESCE(archived_at, now()) ELSE NULL END, \
             updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(archived)
    .fetch_optional(pool)
    .await
    .context("failed to update plan archive state")?;

    Ok(plan)
}

/// Update the status of a plan. Returns `None` if the plan does not exist.
pub async fn update_plan_status(
    pool: &PgPool,
    id: Uuid,
    status: PlanStatus,
) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE plans SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(pool)
    .await
    .context("failed to update plan status")?;

    Ok(plan)
}
