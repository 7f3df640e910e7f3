use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Operation / Recovery
// ---------------------------------------------------------------------------

/// The multi-step operation a [`StudioError::PartialFailure`] interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Convert,
    Deactivate,
    Reactivate,
    Delete,
    StatusChange,
    Purge,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Convert => "conversion",
            Operation::Deactivate => "deactivation",
            Operation::Reactivate => "reactivation",
            Operation::Delete => "deletion",
            Operation::StatusChange => "status change",
            Operation::Purge => "purge",
        };
        f.write_str(s)
    }
}

/// What a caller should do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Nothing was left half-done, or the operation converges on retry.
    Retry,
    /// Repeating as-is will not help. Inspect the named stage, or the identity
    /// service when it rejected the request, before trying again.
    Reconcile,
    /// The target does not exist; pick a different one.
    ChangeTarget,
    /// The input was rejected before any side effect.
    FixInput,
    /// Not a failure.
    None,
}

// ---------------------------------------------------------------------------
// StudioError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("not initialized: run 'studio init'")]
    NotInitialized,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid status '{0}': expected new, contacted, converted or removed")]
    InvalidStatus(String),

    #[error("invalid resolution '{0}': expected deactivate or delete")]
    InvalidResolution(String),

    #[error("submission {submission_id} is already converted (profile {profile_id})")]
    AlreadyConverted {
        submission_id: Uuid,
        profile_id: Uuid,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{operation} failed at stage '{failed}': {reason}")]
    PartialFailure {
        operation: Operation,
        last_completed: Option<String>,
        failed: String,
        reason: String,
    },

    #[error("identity service unavailable: {0}")]
    ExternalServiceUnavailable(String),

    #[error("identity service error: {0}")]
    Identity(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StudioError {
    pub fn partial<S: ToString>(
        operation: Operation,
        last_completed: Option<S>,
        failed: S,
        cause: &StudioError,
    ) -> Self {
        StudioError::PartialFailure {
            operation,
            last_completed: last_completed.map(|s| s.to_string()),
            failed: failed.to_string(),
            reason: cause.to_string(),
        }
    }

    /// True for outcomes that are not failures at all.
    pub fn is_noop(&self) -> bool {
        matches!(self, StudioError::AlreadyConverted { .. })
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            StudioError::AlreadyConverted { .. } => Recovery::None,
            StudioError::Validation(_)
            | StudioError::InvalidStatus(_)
            | StudioError::InvalidResolution(_) => Recovery::FixInput,
            StudioError::NotFound(_) => Recovery::ChangeTarget,
            StudioError::PartialFailure { operation, .. } => match operation {
                Operation::Convert => Recovery::Retry,
                _ => Recovery::Reconcile,
            },
            StudioError::ExternalServiceUnavailable(_) => Recovery::Retry,
            StudioError::Identity(_) => Recovery::Reconcile,
            StudioError::NotInitialized
            | StudioError::Store(_)
            | StudioError::Io(_)
            | StudioError::Yaml(_)
            | StudioError::Json(_) => Recovery::Retry,
        }
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_conversion_is_retryable() {
        let cause = StudioError::Store("timeout".into());
        let err = StudioError::partial(Operation::Convert, Some("identity"), "account_mirror", &cause);
        assert_eq!(err.recovery(), Recovery::Retry);
        assert!(err.to_string().contains("account_mirror"));
    }

    #[test]
    fn identity_rejection_is_not_retryable() {
        let err = StudioError::Identity("400 Bad Request: password too weak".into());
        assert_eq!(err.recovery(), Recovery::Reconcile);
        let down = StudioError::ExternalServiceUnavailable("503".into());
        assert_eq!(down.recovery(), Recovery::Retry);
    }

    #[test]
    fn partial_deletion_needs_reconciliation() {
        let cause = StudioError::Store("disk full".into());
        let err = StudioError::partial(Operation::Delete, Some("dogs"), "client_notes", &cause);
        assert_eq!(err.recovery(), Recovery::Reconcile);
        match err {
            StudioError::PartialFailure {
                last_completed,
                failed,
                ..
            } => {
                assert_eq!(last_completed.as_deref(), Some("dogs"));
                assert_eq!(failed, "client_notes");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn already_converted_is_noop() {
        let err = StudioError::AlreadyConverted {
            submission_id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
        };
        assert!(err.is_noop());
        assert_eq!(err.recovery(), Recovery::None);
    }

    #[test]
    fn not_found_changes_target() {
        assert_eq!(
            StudioError::NotFound("a@x.com".into()).recovery(),
            Recovery::ChangeTarget
        );
        assert_eq!(
            StudioError::Validation("missing email".into()).recovery(),
            Recovery::FixInput
        );
    }
}
