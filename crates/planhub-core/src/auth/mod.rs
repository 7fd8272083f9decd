//! Caller authentication and resource authorization.
//!
//! [`authenticate`] turns a bearer token into an [`AuthContext`]; the
//! `authorize_*` functions check that the context may touch a project or
//! plan. Authentication failures are [`PlanError::Unauthorized`];
//! authorization failures are [`PlanError::NotFound`] for missing resources
//! and [`PlanError::Forbidden`] for resources in another organization.

use tracing::debug;
use uuid::Uuid;

use planhub_db::models::{OrgRole, Plan, Project, User};

use crate::error::PlanError;
use crate::store::{AccountStore, PlanStore};
use crate::token::{self, TokenConfig};

/// An action gated by org role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    CreatePlan,
    /// Archive or change the status of plans owned by other members.
    ManageAnyPlans,
}

/// Permissions granted to each role.
pub fn permissions_for(role: OrgRole) -> &'static [Permission] {
    match role {
        OrgRole::Owner | OrgRole::Admin => &[Permission::CreatePlan, Permission::ManageAnyPlans],
        OrgRole::Member => &[Permission::CreatePlan],
        OrgRole::Viewer => &[],
    }
}

/// The authenticated caller acting within one organization.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub org_id: Uuid,
    pub role: OrgRole,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        permissions_for(self.role).contains(&permission)
    }

    /// Fail with `Forbidden` unless the caller holds `permission`.
    pub fn require_permission(&self, permission: Permission) -> Result<(), PlanError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(PlanError::forbidden(format!(
                "user does not have permission {permission:?} (role {})",
                self.role
            )))
        }
    }

    /// Whether the caller may modify `plan`: owners always, others only with
    /// [`Permission::ManageAnyPlans`].
    pub fn can_manage(&self, plan: &Plan) -> bool {
        plan.owner_id == self.user.id || self.has_permission(Permission::ManageAnyPlans)
    }
}

/// Resolve the `Authorization` header value into an [`AuthContext`].
pub async fn authenticate<S>(
    store: &S,
    tokens: &TokenConfig,
    authorization: Option<&str>,
) -> Result<AuthContext, PlanError>
where
    S: AccountStore + ?Sized,
{
    let header = authorization
        .ok_or_else(|| PlanError::unauthorized("missing authorization header"))?;
    let bearer =
        token::parse_bearer(header).map_err(|e| PlanError::unauthorized(e.to_string()))?;
    let claims = token::validate_token(tokens, bearer)
        .map_err(|e| PlanError::unauthorized(e.to_string()))?;

    let user = store
        .get_user(claims.user_id)
        .await?
        .ok_or_else(|| PlanError::unauthorized("token refers to an unknown user"))?;

    let role = store
        .get_org_role(claims.org_id, user.id)
        .await?
        .ok_or_else(|| PlanError::unauthorized("user is not a member of the token's org"))?;

    debug!(user_id = %user.id, org_id = %claims.org_id, %role, "authenticated");

    Ok(AuthContext {
        user,
        org_id: claims.org_id,
        role,
    })
}

/// Check that the project exists and belongs to the caller's org.
pub async fn authorize_project<S>(
    store: &S,
    auth: &AuthContext,
    project_id: Uuid,
) -> Result<Project, PlanError>
where
    S: AccountStore + ?Sized,
{
    let project = store
        .get_project(project_id)
        .await?
        .ok_or_else(|| PlanError::not_found(format!("project {project_id} not found")))?;

    if project.org_id != auth.org_id {
        return Err(PlanError::forbidden(format!(
            "user does not have access to project {project_id}"
        )));
    }

    Ok(project)
}

/// Check that the plan exists and belongs to the caller's org.
pub async fn authorize_plan<S>(
    store: &S,
    auth: &AuthContext,
    plan_id: Uuid,
) -> Result<Plan, PlanError>
where
    S: PlanStore + ?Sized,
{
    let plan = store
        .get_plan(plan_id)
        .await?
        .ok_or_else(|| PlanError::not_found(format!("plan {plan_id} not found")))?;

    if plan.org_id != auth.org_id {
        return Err(PlanError::forbidden(format!(
            "user does not have access to plan {plan_id}"
        )));
    }

    Ok(plan)
}

/// [`authorize_plan`], then require that the caller owns the plan.
pub async fn authorize_plan_delete<S>(
    store: &S,
    auth: &AuthContext,
    plan_id: Uuid,
) -> Result<Plan, PlanError>
where
    S: PlanStore + ?Sized,
{
    let plan = authorize_plan(store, auth, plan_id).await?;
    if plan.owner_id != auth.user_id() {
        return Err(PlanError::forbidden(format!(
            "only the owner may delete plan {plan_id}"
        )));
    }
    Ok(plan)
}
