//! Database query functions for the `projects` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Project;

/// Insert a new project into an organization.
pub async fn insert_project(pool: &PgPool, org_id: Uuid, name: &str) -> Result<Project> {
    let project = sqlx::query_as::<_, Project>(
        "INSERT INTO projects (org_id, name) VALUES ($1, $2) RETURNING *",
    )
    .bind(org_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .context("failed to insert project")?;

    Ok(project)
}

/// Fetch a project by its ID.
pub async fn get_project(pool: &PgPool, id: Uuid) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch project")?;

    Ok(project)
}

/// List an organization's projects by name.
pub async fn list_projects_for_org(pool: &PgPool, org_id: Uuid) -> Result<Vec<Project>> {
    let projects =
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE org_id = $1 ORDER BY name")
            .bind(org_id)
            .fetch_all(pool)
            .await
            .context("failed to list projects")?;

    Ok(projects)
}
