//! Plan name resolution.
//!
//! An empty requested name becomes the draft name. Any other name is made
//! unique within its (project, owner) scope by appending `.2`, `.3`, ... until
//! the store reports a free candidate.

use uuid::Uuid;

use planhub_db::models::DRAFT_PLAN_NAME;

use crate::error::PlanError;
use crate::store::PlanStore;

/// Highest suffix tried before giving up. `name` itself counts as the first
/// candidate, so at most this many names are checked.
pub const MAX_NAME_SUFFIX: u32 = 10_000;

/// Outcome of resolving a requested plan name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameResolution {
    /// Create a draft. Existing drafts in the scope must be deleted first.
    Draft,
    /// Create a plan with this name, which was free when checked.
    Unique(String),
}

impl NameResolution {
    pub fn name(&self) -> &str {
        match self {
            Self::Draft => DRAFT_PLAN_NAME,
            Self::Unique(name) => name,
        }
    }
}

/// Draft name substituted for an empty request.
pub fn effective_name(requested: &str) -> &str {
    if requested.is_empty() {
        DRAFT_PLAN_NAME
    } else {
        requested
    }
}

/// `name.n`
pub fn suffixed(name: &str, n: u32) -> String {
    format!("{name}.{n}")
}

/// Pick the name a new plan should be created with.
///
/// Drafts never enter the suffix loop. The check is advisory: a concurrent
/// insert can still take the returned name, which the caller detects at
/// insert time.
pub async fn resolve_plan_name<S>(
    store: &S,
    project_id: Uuid,
    owner_id: Uuid,
    requested: &str,
) -> Result<NameResolution, PlanError>
where
    S: PlanStore + ?Sized,
{
    let name = effective_name(requested);
    if name == DRAFT_PLAN_NAME {
        return Ok(NameResolution::Draft);
    }

    if store.count_plans_by_name(project_id, owner_id, name).await? == 0 {
        return Ok(NameResolution::Unique(name.to_string()));
    }

    for n in 2..=MAX_NAME_SUFFIX {
        let candidate = suffixed(name, n);
        if store
            .count_plans_by_name(project_id, owner_id, &candidate)
            .await?
            == 0
        {
            return Ok(NameResolution::Unique(candidate));
        }
    }

    Err(PlanError::NameSpaceExhausted {
        name: name.to_string(),
        attempts: MAX_NAME_SUFFIX,
    })
}
