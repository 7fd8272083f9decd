//! Trial plan quota.

use planhub_db::models::User;

use crate::error::PlanError;

/// Plans a trial user may own (drafts excluded) when no limit is configured.
pub const DEFAULT_TRIAL_MAX_PLANS: u32 = 10;

/// Deployment-wide rules applied before a plan is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreationPolicy {
    /// Enables the trial quota.
    pub cloud_mode: bool,
    pub trial_max_plans: u32,
}

impl Default for CreationPolicy {
    fn default() -> Self {
        Self {
            cloud_mode: false,
            trial_max_plans: DEFAULT_TRIAL_MAX_PLANS,
        }
    }
}

/// Check whether `user` may create another plan under `policy`.
///
/// Only trial users in cloud mode are limited; they may create a plan while
/// their non-draft plan count is below `trial_max_plans`.
pub fn evaluate_trial_quota(policy: &CreationPolicy, user: &User) -> Result<(), PlanError> {
    if !policy.cloud_mode || !user.is_trial {
        return Ok(());
    }
    if user.num_non_draft_plans >= i64::from(policy.trial_max_plans) {
        return Err(PlanError::TrialPlansExceeded {
            max_plans: policy.trial_max_plans,
        });
    }
    Ok(())
}
