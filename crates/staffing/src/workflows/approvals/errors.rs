use crate::access::domain::Role;
use crate::access::guard::AccessError;
use crate::repository::RepositoryError;

use super::domain::{ApprovalStatus, RequestId, Stage};

/// Malformed or inconsistent input rejected before any state changes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("percentage must be between 1 and 100, got {0}")]
    PercentageOutOfRange(u8),
    #[error("overtime hours must be greater than 0 and at most 24, got {0}")]
    HoursOutOfRange(f64),
    #[error("claimed skill level must be between 1 and 5, got {0}")]
    LevelOutOfRange(u8),
    #[error("end date is before start date")]
    EndBeforeStart,
    #[error("leave window contains no working days")]
    EmptyLeaveWindow,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("a reason is required when rejecting")]
    MissingRejectionReason,
    #[error("project `{0}` is not active")]
    InactiveProject(String),
    #[error("covering user must differ from the person on leave")]
    CoveringSelf,
    #[error("skill proof `{0}` does not belong to the subject")]
    ForeignProof(String),
}

/// Outcome of the pure state machine refusing a decision.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("request is {status}: {detail}")]
    StageMismatch {
        status: ApprovalStatus,
        detail: &'static str,
    },
    #[error("{role} may not decide the {stage} stage")]
    Unauthorized { stage: Stage, role: Role },
    #[error("an actor may not decide a request about themselves")]
    OwnRequest,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl TransitionError {
    pub(crate) fn terminal(status: ApprovalStatus) -> Self {
        Self::StageMismatch {
            status,
            detail: "no further decisions are accepted",
        }
    }
}

/// Failure applying a final-approval effect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("{requested} day(s) requested but only {available} available")]
    InsufficientBalance { requested: u32, available: i64 },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors surfaced by the approval service.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("stage mismatch: {0}")]
    StageMismatch(String),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("request `{existing}` already covers this subject and resource")]
    DuplicateRequest { existing: RequestId },
    #[error("insufficient balance: {requested} day(s) requested, {available} available")]
    InsufficientBalance { requested: u32, available: i64 },
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl ApprovalError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::StageMismatch(_) => "stage_mismatch",
            Self::Validation(_) => "validation",
            Self::DuplicateRequest { .. } => "duplicate_request",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Repository(_) => "repository",
        }
    }

    /// Expected, non-retryable outcomes reported back to the caller.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }
}

impl From<RepositoryError> for ApprovalError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => Self::NotFound("record".to_string()),
            RepositoryError::Conflict => Self::Conflict("record already exists".to_string()),
            RepositoryError::StaleStatus { actual, .. } => {
                Self::StageMismatch(format!("request was concurrently moved to {actual}"))
            }
            other @ RepositoryError::Unavailable(_) => Self::Repository(other),
        }
    }
}

impl From<TransitionError> for ApprovalError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::Validation(error) => Self::Validation(error),
            error @ TransitionError::StageMismatch { .. } => Self::StageMismatch(error.to_string()),
            error @ (TransitionError::Unauthorized { .. } | TransitionError::OwnRequest) => {
                Self::Unauthorized(error.to_string())
            }
        }
    }
}

impl From<DispatchError> for ApprovalError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::InsufficientBalance {
                requested,
                available,
            } => Self::InsufficientBalance {
                requested,
                available,
            },
            DispatchError::Conflict(detail) => Self::Conflict(detail),
            DispatchError::Repository(error) => error.into(),
        }
    }
}

impl From<AccessError> for ApprovalError {
    fn from(value: AccessError) -> Self {
        match value {
            AccessError::Repository(error) => error.into(),
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_persistence_faults_are_system_errors() {
        let fault: ApprovalError = RepositoryError::Unavailable("down".to_string()).into();
        assert_eq!(fault.kind(), "repository");
        assert!(!fault.is_user_error());

        let stale: ApprovalError = RepositoryError::StaleStatus {
            expected: ApprovalStatus::PendingLm,
            actual: ApprovalStatus::PendingHr,
        }
        .into();
        assert_eq!(stale.kind(), "stage_mismatch");
        assert!(stale.is_user_error());

        let balance: ApprovalError = DispatchError::InsufficientBalance {
            requested: 5,
            available: 3,
        }
        .into();
        assert_eq!(balance.kind(), "insufficient_balance");
    }

    #[test]
    fn transition_errors_keep_their_message() {
        let error: ApprovalError = TransitionError::Unauthorized {
            stage: Stage::Hr,
            role: Role::Employee,
        }
        .into();
        assert_eq!(
            error.to_string(),
            "unauthorized: employee may not decide the hr stage"
        );
    }
}
