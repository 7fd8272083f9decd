//! Plan management: quota gate, name resolution, directories, service layer.

pub mod dirs;
pub mod naming;
pub mod quota;
pub mod service;

pub use dirs::PlanDirs;
pub use naming::{MAX_NAME_SUFFIX, NameResolution, resolve_plan_name};
pub use quota::{CreationPolicy, DEFAULT_TRIAL_MAX_PLANS, evaluate_trial_quota};
pub use service::{
    MAX_CREATE_ATTEMPTS, authorize_manage, authorize_plan_creation, create_plan, delete_owner_plans, delete_plan,
    get_plan, list_archived_plans, list_plans, list_running_plans, set_archived, set_status,
};
