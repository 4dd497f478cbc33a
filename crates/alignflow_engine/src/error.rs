//! Engine error types.
//!
//! Every engine operation returns [`EngineError`]. Its variants keep the
//! caller-facing kinds apart: a bad input, an actor without authority, an
//! approver that cannot be resolved, and an illegal lifecycle move are
//! reported differently and never collapse into one another.

use crate::resolver::ResolveError;
use crate::store::StoreError;
use alignflow_ids::{KeyResultId, ObjectiveId, OkrId, UserId};
use alignflow_lifecycle::{LifecycleError, OkrStatus};
use serde::Serialize;
use thiserror::Error;

/// Input the caller must correct.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("an OKR needs at least one objective")]
    NoObjectives,

    #[error("objective weights sum to {0}, expected 100")]
    ObjectiveWeights(f64),

    #[error("objective '{0}' has no key results")]
    NoKeyResults(String),

    #[error("key result weights of objective '{objective}' sum to {sum}, expected 100")]
    KeyResultWeights { objective: String, sum: f64 },

    #[error("{field} must be within 0..=100, got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("{0} must not be empty")]
    Required(&'static str),

    #[error("self-assessment comment missing for {0}")]
    MissingSelfComment(String),

    #[error("a manager total score is required before approving")]
    MissingTotalScore,

    #[error("{0}")]
    Invalid(String),
}

/// Actor lacks authority for the requested operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{actor} may not {action} {target}: {reason}")]
pub struct AuthorizationError {
    pub actor: UserId,
    pub action: &'static str,
    pub target: String,
    pub reason: String,
}

impl AuthorizationError {
    pub fn new(actor: &UserId, action: &'static str, okr_id: &OkrId, reason: impl Into<String>) -> Self {
        Self::on(actor, action, format!("OKR {}", okr_id), reason)
    }

    pub fn on(
        actor: &UserId,
        action: &'static str,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.clone(),
            action,
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Stable classification of [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    AmbiguousApprover,
    ApproverNotFound,
    Lifecycle,
    NotFound,
    Conflict,
    Store,
    Directory,
    BatchBlocked,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("not authorized: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("approver resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("operation '{operation}' is not allowed in status {status}")]
    WrongStatus {
        operation: &'static str,
        status: OkrStatus,
    },

    #[error("OKR not found: {0}")]
    OkrNotFound(OkrId),

    #[error("objective not found: {0}")]
    ObjectiveNotFound(ObjectiveId),

    #[error("key result not found: {0}")]
    KeyResultNotFound(KeyResultId),

    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("OKR {id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict { id: OkrId, expected: u64, found: u64 },

    #[error("store error: {0}")]
    Store(#[source] StoreError),

    #[error("directory error: {0}")]
    Directory(#[source] anyhow::Error),

    #[error("batch approval blocked: {awaiting_scoring} record(s) still await scoring")]
    BatchBlocked { awaiting_scoring: usize },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::Authorization(_) => ErrorKind::Authorization,
            EngineError::Resolution(ResolveError::Ambiguous { .. }) => ErrorKind::AmbiguousApprover,
            EngineError::Resolution(_) => ErrorKind::ApproverNotFound,
            EngineError::Lifecycle(_) | EngineError::WrongStatus { .. } => ErrorKind::Lifecycle,
            EngineError::OkrNotFound(_)
            | EngineError::ObjectiveNotFound(_)
            | EngineError::KeyResultNotFound(_)
            | EngineError::UserNotFound(_) => ErrorKind::NotFound,
            EngineError::Conflict { .. } => ErrorKind::Conflict,
            EngineError::Store(_) => ErrorKind::Store,
            EngineError::Directory(_) => ErrorKind::Directory,
            EngineError::BatchBlocked { .. } => ErrorKind::BatchBlocked,
        }
    }

    pub(crate) fn wrong_status(operation: &'static str, status: OkrStatus) -> Self {
        EngineError::WrongStatus { operation, status }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                id,
                expected,
                found,
            } => EngineError::Conflict {
                id,
                expected,
                found,
            },
            StoreError::NotFound(id) => EngineError::OkrNotFound(id),
            other => EngineError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_stay_distinct() {
        let okr_id = OkrId::new();
        let actor = UserId::parse("u1").unwrap();

        let validation: EngineError = ValidationError::Required("adjustment reason").into();
        let auth: EngineError =
            AuthorizationError::new(&actor, "approve", &okr_id, "not the L1 approver").into();
        let ambiguous: EngineError = ResolveError::Ambiguous {
            role: crate::role::Role::TechHead,
            department: "Crypto".into(),
            scope: crate::resolver::Scope::Department,
            candidates: vec![],
        }
        .into();

        assert_eq!(validation.kind(), ErrorKind::Validation);
        assert_eq!(auth.kind(), ErrorKind::Authorization);
        assert_eq!(ambiguous.kind(), ErrorKind::AmbiguousApprover);
    }

    #[test]
    fn test_store_conflict_maps_to_conflict() {
        let id = OkrId::new();
        let err: EngineError = StoreError::Conflict {
            id: id.clone(),
            expected: 1,
            found: 2,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains(id.as_str()));
    }
}
