//! Errors surfaced by plan operations.
//!
//! Every variant is terminal for the request that produced it. The HTTP layer
//! maps each kind to a status code via [`PlanError::kind`].

use uuid::Uuid;

/// Failure of a plan operation.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("user has reached max number of free trial plans ({max_plans})")]
    TrialPlansExceeded { max_plans: u32 },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("no free name for plan {name:?} after {attempts} candidates")]
    NameSpaceExhausted { name: String, attempts: u32 },

    #[error("plan {plan_id} was deleted but its directory could not be removed: {source}")]
    PlanDirCleanup {
        plan_id: Uuid,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Coarse classification of a [`PlanError`], stable across messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    TrialPlansExceeded,
    BadRequest,
    NotFound,
    Conflict,
    NameSpaceExhausted,
    Internal,
}

impl ErrorKind {
    /// Machine-readable name used in API error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::TrialPlansExceeded => "trial_plans_exceeded",
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::NameSpaceExhausted => "name_space_exhausted",
            Self::Internal => "internal",
        }
    }

    /// Whether the caller, not the server, is at fault.
    pub fn is_client_error(self) -> bool {
        !matches!(self, Self::Internal)
    }
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::TrialPlansExceeded { .. } => ErrorKind::TrialPlansExceeded,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NameSpaceExhausted { .. } => ErrorKind::NameSpaceExhausted,
            Self::PlanDirCleanup { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trial_error_carries_max() {
        let err = PlanError::TrialPlansExceeded { max_plans: 10 };
        assert_eq!(err.kind(), ErrorKind::TrialPlansExceeded);
        assert!(err.kind().is_client_error());
        assert_eq!(
            err.to_string(),
            "user has reached max number of free trial plans (10)"
        );
    }

    #[test]
    fn dir_cleanup_is_a_server_error() {
        let err = PlanError::PlanDirCleanup {
            plan_id: Uuid::nil(),
            source: std::io::Error::other("disk on fire"),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.kind().is_client_error());
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn anyhow_errors_become_internal() {
        let err: PlanError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.to_string(), "connection reset");
    }
}
