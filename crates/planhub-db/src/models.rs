use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reserved plan name. At most one plan per (project, owner) carries it.
pub const DRAFT_PLAN_NAME: &str = "draft";

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Execution status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Ready,
    Running,
    Finished,
    Error,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = PlanStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(Self::Ready),
            "running" => Ok(Self::Running),
            "finished" => Ok(Self::Finished),
            "error" => Ok(Self::Error),
            other => Err(PlanStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanStatus`] string.
#[derive(Debug, Clone)]
pub struct PlanStatusParseError(pub String);

impl fmt::Display for PlanStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan status: {:?}", self.0)
    }
}

impl std::error::Error for PlanStatusParseError {}

// ---------------------------------------------------------------------------

/// A user's role within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Viewer => "viewer",
        };
        f.write_str(s)
    }
}

impl FromStr for OrgRole {
    type Err = OrgRoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "viewer" => Ok(Self::Viewer),
            other => Err(OrgRoleParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`OrgRole`] string.
#[derive(Debug, Clone)]
pub struct OrgRoleParseError(pub String);

impl fmt::Display for OrgRoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid org role: {:?}", self.0)
    }
}

impl std::error::Error for OrgRoleParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// An organization. Every project and plan belongs to exactly one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Org {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A user account.
///
/// `num_non_draft_plans` is not a column; user queries compute it from the
/// `plans` table so the trial quota always sees the current count.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_trial: bool,
    pub created_at: DateTime<Utc>,
    pub num_non_draft_plans: i64,
}

/// A project within an organization.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A plan owned by a user within a project.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub is_draft: bool,
    pub status: PlanStatus,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_status_display_roundtrip() {
        let variants = [
            PlanStatus::Ready,
            PlanStatus::Running,
            PlanStatus::Finished,
            PlanStatus::Error,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: PlanStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn plan_status_invalid() {
        let result = "bogus".parse::<PlanStatus>();
        assert!(result.is_err());
    }

    #[test]
    fn org_role_display_roundtrip() {
        let variants = [
            OrgRole::Owner,
            OrgRole::Admin,
            OrgRole::Member,
            OrgRole::Viewer,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: OrgRole = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn org_role_invalid() {
        let err = "superuser".parse::<OrgRole>().unwrap_err();
        assert_eq!(err.to_string(), "invalid org role: \"superuser\"");
    }
}
