//! Persistence seams used by the auth and plan services.
//!
//! Both traits are implemented for [`PgPool`] by delegating to
//! [`planhub_db::queries`]. Tests substitute in-memory stores.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use planhub_db::models::{OrgRole, Plan, PlanStatus, Project, User};
use planhub_db::queries::plans::PlanFilter;
use planhub_db::queries::{orgs, plans, projects, users};

/// Users, org membership and projects.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch a user with a current `num_non_draft_plans`.
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;

    /// The user's role in the org, or `None` if they are not a member.
    async fn get_org_role(&self, org_id: Uuid, user_id: Uuid) -> Result<Option<OrgRole>>;

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>>;
}

/// Plan rows.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn get_plan(&self, plan_id: Uuid) -> Result<Option<Plan>>;

    async fn count_plans_by_name(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
        name: &str,
    ) -> Result<i64>;

    /// Insert a plan. `Ok(None)` means the name is already taken in the
    /// (project, owner) scope and nothing was written.
    async fn create_plan(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<Plan>>;

    /// Delete one plan, returning the number of rows removed.
    async fn delete_plan(&self, plan_id: Uuid) -> Result<u64>;

    async fn delete_draft_plans(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<Uuid>>;

    async fn delete_owner_plans(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<Uuid>>;

    async fn list_owned_plans(&self, filter: &PlanFilter) -> Result<Vec<Plan>>;

    async fn set_plan_archived(&self, plan_id: Uuid, archived: bool) -> Result<Option<Plan>>;

    async fn set_plan_status(&self, plan_id: Uuid, status: PlanStatus) -> Result<Option<Plan>>;
}

#[async_trait]
impl AccountStore for PgPool {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        users::get_user(self, user_id).await
    }

    async fn get_org_role(&self, org_id: Uuid, user_id: Uuid) -> Result<Option<OrgRole>> {
        orgs::get_org_role(self, org_id, user_id).await
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>> {
        projects::get_project(self, project_id).await
    }
}

#[async_trait]
impl PlanStore for PgPool {
    async fn get_plan(&self, plan_id: Uuid) -> Result<Option<Plan>> {
        plans::get_plan(self, plan_id).await
    }

    async fn count_plans_by_name(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
        name: &str,
    ) -> Result<i64> {
        plans::count_plans_by_name(self, project_id, owner_id, name).await
    }

    async fn create_plan(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<Plan>> {
        plans::insert_plan(self, org_id, project_id, owner_id, name).await
    }

    async fn delete_plan(&self, plan_id: Uuid) -> Result<u64> {
        plans::delete_plan(self, plan_id).await
    }

    async fn delete_draft_plans(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        plans::delete_draft_plans(self, org_id, project_id, owner_id).await
    }

    async fn delete_owner_plans(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        plans::delete_owner_plans(self, org_id, project_id, owner_id).await
    }

    async fn list_owned_plans(&self, filter: &PlanFilter) -> Result<Vec<Plan>> {
        plans::list_owned_plans(self, filter).await
    }

    async fn set_plan_archived(&self, plan_id: Uuid, archived: bool) -> Result<Option<Plan>> {
        plans::set_plan_archived(self, plan_id, archived).await
    }

    async fn set_plan_status(&self, plan_id: Uuid, status: PlanStatus) -> Result<Option<Plan>> {
        plans::update_plan_status(self, plan_id, status).await
    }
}
