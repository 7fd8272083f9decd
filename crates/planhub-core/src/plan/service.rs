//! Plan service layer.
//!
//! Each operation takes an authenticated [`AuthContext`], authorizes the
//! target project or plan, and then talks to the store and the plan
//! directories. Handlers are expected to call
//! [`authorize_plan_creation`] before parsing a creation request body.

use anyhow::Context;
use uuid::Uuid;

use planhub_db::models::{Plan, PlanStatus, Project};
use planhub_db::queries::plans::PlanFilter;

use super::dirs::PlanDirs;
use super::naming::{NameResolution, resolve_plan_name};
use super::quota::{CreationPolicy, evaluate_trial_quota};
use crate::auth::{
    AuthContext, Permission, authorize_plan, authorize_plan_delete, authorize_project,
};
use crate::error::PlanError;
use crate::store::{AccountStore, PlanStore};

/// Times the whole name resolution is repeated when the insert loses a race
/// for the chosen name.
pub const MAX_CREATE_ATTEMPTS: u32 = 3;

/// Run every check that precedes plan creation: the `CreatePlan` permission,
/// project access, and (in cloud mode) the trial quota.
pub async fn authorize_plan_creation<S>(
    store: &S,
    auth: &AuthContext,
    policy: &CreationPolicy,
    project_id: Uuid,
) -> Result<Project, PlanError>
where
    S: AccountStore + ?Sized,
{
    auth.require_permission(Permission::CreatePlan)?;
    let project = authorize_project(store, auth, project_id).await?;

    if policy.cloud_mode {
        // Re-read so the count reflects plans created since authentication.
        let user = store
            .get_user(auth.user_id())
            .await?
            .ok_or_else(|| PlanError::unauthorized("user no longer exists"))?;
        evaluate_trial_quota(policy, &user)?;
    }

    Ok(project)
}

/// Create a plan in `project` owned by the caller.
///
/// `project` must come from [`authorize_plan_creation`]. An empty
/// `requested_name` creates a draft, replacing any previous drafts of the
/// caller in the project.
pub async fn create_plan<S>(
    store: &S,
    dirs: &PlanDirs,
    auth: &AuthContext,
    project: &Project,
    requested_name: &str,
) -> Result<Plan, PlanError>
where
    S: PlanStore + ?Sized,
{
    let owner_id = auth.user_id();

    for attempt in 1..=MAX_CREATE_ATTEMPTS {
        let resolution = resolve_plan_name(store, project.id, owner_id, requested_name).await?;

        if resolution == NameResolution::Draft {
            let removed = store
                .delete_draft_plans(auth.org_id, project.id, owner_id)
                .await?;
            remove_plan_dirs(dirs, auth.org_id, &removed).await?;
            if !removed.is_empty() {
                tracing::debug!(
                    project_id = %project.id,
                    count = removed.len(),
                    "replaced previous drafts"
                );
            }
        }

        let name = resolution.name();
        let Some(plan) = store
            .create_plan(auth.org_id, project.id, owner_id, name)
            .await?
        else {
            tracing::warn!(
                project_id = %project.id,
                name,
                attempt,
                "plan name taken concurrently, resolving again"
            );
            continue;
        };

        if let Err(e) = dirs.create(plan.org_id, plan.id).await {
            discard_plan_row(store, plan.id).await;
            return Err(anyhow::Error::new(e)
                .context(format!("failed to create directory for plan {}", plan.id))
                .into());
        }

        tracing::info!(
            plan_id = %plan.id,
            project_id = %project.id,
            name = %plan.name,
            "plan created"
        );
        return Ok(plan);
    }

    Err(PlanError::Conflict(format!(
        "could not reserve a name for plan {:?} after {MAX_CREATE_ATTEMPTS} attempts",
        requested_name
    )))
}

async fn discard_plan_row<S>(store: &S, plan_id: Uuid)
where
    S: PlanStore + ?Sized,
{
    if let Err(e) = store.delete_plan(plan_id).await {
        tracing::warn!(
            plan_id = %plan_id,
            error = %e,
            "failed to remove plan row after directory error"
        );
    }
}

/// Fetch a plan visible to the caller.
pub async fn get_plan<S>(store: &S, auth: &AuthContext, plan_id: Uuid) -> Result<Plan, PlanError>
where
    S: PlanStore + ?Sized,
{
    authorize_plan(store, auth, plan_id).await
}

/// Delete one of the caller's plans and its directory.
pub async fn delete_plan<S>(
    store: &S,
    dirs: &PlanDirs,
    auth: &AuthContext,
    plan_id: Uuid,
) -> Result<(), PlanError>
where
    S: PlanStore + ?Sized,
{
    let plan = authorize_plan_delete(store, auth, plan_id).await?;

    let deleted = store
        .delete_plan(plan_id)
        .await
        .with_context(|| format!("failed to delete plan {plan_id}"))?;
    if deleted == 0 {
        return Err(PlanError::not_found(format!("plan {plan_id} not found")));
    }

    dirs.remove(plan.org_id, plan.id)
        .await
        .map_err(|source| PlanError::PlanDirCleanup { plan_id, source })?;

    tracing::info!(plan_id = %plan_id, "plan deleted");
    Ok(())
}

/// Delete every plan the caller owns in a project, drafts included.
///
/// Returns the ids of the deleted plans.
pub async fn delete_owner_plans<S>(
    store: &S,
    dirs: &PlanDirs,
    auth: &AuthContext,
    project_id: Uuid,
) -> Result<Vec<Uuid>, PlanError>
where
    S: AccountStore + PlanStore + ?Sized,
{
    authorize_project(store, auth, project_id).await?;

    let removed = store
        .delete_owner_plans(auth.org_id, project_id, auth.user_id())
        .await?;
    remove_plan_dirs(dirs, auth.org_id, &removed).await?;

    tracing::info!(project_id = %project_id, count = removed.len(), "deleted owned plans");
    Ok(removed)
}

/// Remove the directories of already-deleted plans.
///
/// Every directory is attempted; the first failure is returned.
async fn remove_plan_dirs(
    dirs: &PlanDirs,
    org_id: Uuid,
    plan_ids: &[Uuid],
) -> Result<(), PlanError> {
    let mut first_err = None;
    for &plan_id in plan_ids {
        if let Err(source) = dirs.remove(org_id, plan_id).await {
            tracing::warn!(plan_id = %plan_id, error = %source, "failed to remove plan directory");
            first_err.get_or_insert(PlanError::PlanDirCleanup { plan_id, source });
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// The caller's live (non-archived) plans in a project, newest first.
pub async fn list_plans<S>(
    store: &S,
    auth: &AuthContext,
    project_id: Uuid,
) -> Result<Vec<Plan>, PlanError>
where
    S: AccountStore + PlanStore + ?Sized,
{
    list_filtered(store, auth, project_id, PlanFilter::live(project_id, auth.user_id())).await
}

/// The caller's archived plans in a project.
pub async fn list_archived_plans<S>(
    store: &S,
    auth: &AuthContext,
    project_id: Uuid,
) -> Result<Vec<Plan>, PlanError>
where
    S: AccountStore + PlanStore + ?Sized,
{
    list_filtered(
        store,
        auth,
        project_id,
        PlanFilter::archived(project_id, auth.user_id()),
    )
    .await
}

/// The caller's live plans in a project whose status is `running`.
pub async fn list_running_plans<S>(
    store: &S,
    auth: &AuthContext,
    project_id: Uuid,
) -> Result<Vec<Plan>, PlanError>
where
    S: AccountStore + PlanStore + ?Sized,
{
    let filter = PlanFilter::live(project_id, auth.user_id()).with_status(PlanStatus::Running);
    list_filtered(store, auth, project_id, filter).await
}

async fn list_filtered<S>(
    store: &S,
    auth: &AuthContext,
    project_id: Uuid,
    filter: PlanFilter,
) -> Result<Vec<Plan>, PlanError>
where
    S: AccountStore + PlanStore + ?Sized,
{
    authorize_project(store, auth, project_id).await?;
    Ok(store.list_owned_plans(&filter).await?)
}

/// Archive or unarchive a plan. Allowed for the owner and for holders of
/// [`Permission::ManageAnyPlans`].
pub async fn set_archived<S>(
    store: &S,
    auth: &AuthContext,
    plan_id: Uuid,
    archived: bool,
) -> Result<Plan, PlanError>
where
    S: PlanStore + ?Sized,
{
    let plan = authorize_manage(store, auth, plan_id).await?;
    let updated = store
        .set_plan_archived(plan.id, archived)
        .await?
        .ok_or_else(|| PlanError::not_found(format!("plan {plan_id} not found")))?;

    tracing::info!(plan_id = %plan_id, archived, "plan archive state changed");
    Ok(updated)
}

/// Change a plan's status. Same access rule as [`set_archived`].
pub async fn set_status<S>(
    store: &S,
    auth: &AuthContext,
    plan_id: Uuid,
    status: PlanStatus,
) -> Result<Plan, PlanError>
where
    S: PlanStore + ?Sized,
{
    let plan = authorize_manage(store, auth, plan_id).await?;
    let updated = store
        .set_plan_status(plan.id, status)
        .await?
        .ok_or_else(|| PlanError::not_found(format!("plan {plan_id} not found")))?;

    tracing::info!(plan_id = %plan_id, %status, "plan status changed");
    Ok(updated)
}

/// Load a plan the caller may archive or change the status of.
pub async fn authorize_manage<S>(
    store: &S,
    auth: &AuthContext,
    plan_id: Uuid,
) -> Result<Plan, PlanError>
where
    S: PlanStore + ?Sized,
{
    let plan = authorize_plan(store, auth, plan_id).await?;
    if !auth.can_manage(&plan) {
        return Err(PlanError::forbidden(format!(
            "user may not modify plan {plan_id}"
        )));
    }
    Ok(plan)
}
