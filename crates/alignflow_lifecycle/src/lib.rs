//! OKR lifecycle core types and state machine.
//!
//! An OKR moves through creation approval, execution, self-assessment and
//! up to three levels of management grading. Closing a cycle does not use a
//! dedicated terminal status: the record returns to `PUBLISHED` and the
//! orthogonal `archived` flag is raised. [`Lifecycle`] keeps both axes
//! together so callers never infer one from the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// OKR Status - The workflow state set
// ============================================================================

/// Workflow status of an OKR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OkrStatus {
    /// Being written by the owner
    Draft,
    /// Submitted, waiting for the first-level approver
    PendingL1Create,
    /// First level approved, waiting for the second-level approver
    PendingL2Create,
    /// Approved goals in execution; also the resting state of an archived cycle
    Published,
    /// Self-assessment submitted, waiting for first-level grading
    PendingL1Assess,
    /// Graded at L1, waiting for second-level confirmation
    PendingL2Assess,
    /// Confirmed at L2, waiting for third-level confirmation
    PendingL3Assess,
    /// Fully graded, waiting for HR/admin archival
    PendingArchive,
}

impl OkrStatus {
    pub const ALL: [OkrStatus; 8] = [
        OkrStatus::Draft,
        OkrStatus::PendingL1Create,
        OkrStatus::PendingL2Create,
        OkrStatus::Published,
        OkrStatus::PendingL1Assess,
        OkrStatus::PendingL2Assess,
        OkrStatus::PendingL3Assess,
        OkrStatus::PendingArchive,
    ];

    /// Get the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OkrStatus::Draft => "DRAFT",
            OkrStatus::PendingL1Create => "PENDING_L1_CREATE",
            OkrStatus::PendingL2Create => "PENDING_L2_CREATE",
            OkrStatus::Published => "PUBLISHED",
            OkrStatus::PendingL1Assess => "PENDING_L1_ASSESS",
            OkrStatus::PendingL2Assess => "PENDING_L2_ASSESS",
            OkrStatus::PendingL3Assess => "PENDING_L3_ASSESS",
            OkrStatus::PendingArchive => "PENDING_ARCHIVE",
        }
    }

    /// Waiting on a creation approver.
    pub fn is_creation_pending(&self) -> bool {
        matches!(self, OkrStatus::PendingL1Create | OkrStatus::PendingL2Create)
    }

    /// Waiting on an assessment grader (any level).
    pub fn is_assessment_pending(&self) -> bool {
        matches!(
            self,
            OkrStatus::PendingL1Assess | OkrStatus::PendingL2Assess | OkrStatus::PendingL3Assess
        )
    }

    /// Approval level (1-3) this status waits on, if it is an approval stage.
    pub fn approval_level(&self) -> Option<u8> {
        match self {
            OkrStatus::PendingL1Create | OkrStatus::PendingL1Assess => Some(1),
            OkrStatus::PendingL2Create | OkrStatus::PendingL2Assess => Some(2),
            OkrStatus::PendingL3Assess => Some(3),
            _ => None,
        }
    }

    /// Get valid transitions from this state.
    ///
    /// Administrative revocation to `DRAFT` is not listed; it goes through
    /// [`Lifecycle::force_transition`].
    pub fn valid_transitions(&self) -> &'static [OkrStatus] {
        match self {
            OkrStatus::Draft => &[OkrStatus::PendingL1Create, OkrStatus::Published],
            OkrStatus::PendingL1Create => &[
                OkrStatus::PendingL2Create,
                OkrStatus::Published,
                OkrStatus::Draft,
            ],
            OkrStatus::PendingL2Create => &[OkrStatus::Published, OkrStatus::Draft],
            OkrStatus::Published => &[OkrStatus::PendingL1Assess],
            OkrStatus::PendingL1Assess => &[OkrStatus::PendingL2Assess, OkrStatus::PendingArchive],
            OkrStatus::PendingL2Assess => &[
                OkrStatus::PendingL3Assess,
                OkrStatus::PendingArchive,
                OkrStatus::PendingL1Assess,
            ],
            OkrStatus::PendingL3Assess => &[OkrStatus::PendingArchive, OkrStatus::PendingL1Assess],
            OkrStatus::PendingArchive => &[OkrStatus::Published, OkrStatus::PendingL1Assess],
        }
    }

    /// Check if a transition to the target state is valid.
    pub fn can_transition_to(&self, target: OkrStatus) -> bool {
        self.valid_transitions().contains(&target)
    }
}

impl fmt::Display for OkrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when parsing an OkrStatus from string.
#[derive(Debug, Error, Clone)]
#[error("invalid status: {0}")]
pub struct StatusParseError(String);

impl std::str::FromStr for OkrStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OkrStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StatusParseError(s.to_string()))
    }
}

// ============================================================================
// Phase - Both axes folded into one view
// ============================================================================

/// Where a record sits in its cycle, derived from status and archived flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Drafting,
    CreationApproval,
    Execution,
    Assessment,
    AwaitingArchive,
    /// Archived: results locked and visible to the owner
    Closed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Drafting => "drafting",
            Phase::CreationApproval => "creation approval",
            Phase::Execution => "execution",
            Phase::Assessment => "assessment",
            Phase::AwaitingArchive => "awaiting archive",
            Phase::Closed => "closed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Status Transition
// ============================================================================

/// A recorded status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: OkrStatus,
    pub to: OkrStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl StatusTransition {
    pub fn new(from: OkrStatus, to: OkrStatus) -> Self {
        Self {
            from,
            to,
            timestamp: Utc::now(),
            reason: None,
            actor: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

// ============================================================================
// Lifecycle - Status + archived flag + history
// ============================================================================

/// Errors for lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: OkrStatus, to: OkrStatus },

    #[error("record is archived and locked (status {0})")]
    Archived(OkrStatus),

    #[error("cannot archive from {0}; expected PENDING_ARCHIVE")]
    NotArchivable(OkrStatus),
}

/// Two-axis lifecycle of one OKR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    status: OkrStatus,
    #[serde(default)]
    archived: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    history: Vec<StatusTransition>,
}

impl Lifecycle {
    /// A fresh draft.
    pub fn new() -> Self {
        Self::from_state(OkrStatus::Draft, false)
    }

    /// Rebuild a lifecycle at a known position, without history.
    pub fn from_state(status: OkrStatus, archived: bool) -> Self {
        Self {
            status,
            archived,
            history: Vec::new(),
        }
    }

    pub fn status(&self) -> OkrStatus {
        self.status
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub fn history(&self) -> &[StatusTransition] {
        &self.history
    }

    pub fn phase(&self) -> Phase {
        if self.archived {
            return Phase::Closed;
        }
        match self.status {
            OkrStatus::Draft => Phase::Drafting,
            OkrStatus::PendingL1Create | OkrStatus::PendingL2Create => Phase::CreationApproval,
            OkrStatus::Published => Phase::Execution,
            OkrStatus::PendingL1Assess | OkrStatus::PendingL2Assess | OkrStatus::PendingL3Assess => {
                Phase::Assessment
            }
            OkrStatus::PendingArchive => Phase::AwaitingArchive,
        }
    }

    /// Attempt to transition to a new status.
    pub fn transition(&mut self, to: OkrStatus) -> Result<StatusTransition, LifecycleError> {
        self.transition_with_reason(to, None, None)
    }

    /// Attempt to transition with reason and actor.
    pub fn transition_with_reason(
        &mut self,
        to: OkrStatus,
        reason: Option<String>,
        actor: Option<String>,
    ) -> Result<StatusTransition, LifecycleError> {
        if self.archived {
            return Err(LifecycleError::Archived(self.status));
        }

        if !self.status.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        let mut transition = StatusTransition::new(self.status, to);
        if let Some(r) = reason {
            transition = transition.with_reason(r);
        }
        if let Some(a) = actor {
            transition = transition.with_actor(a);
        }

        self.status = to;
        self.history.push(transition.clone());

        Ok(transition)
    }

    /// Close the cycle: `PENDING_ARCHIVE` becomes archived `PUBLISHED`.
    pub fn archive(&mut self, actor: Option<String>) -> Result<StatusTransition, LifecycleError> {
        if self.archived {
            return Err(LifecycleError::Archived(self.status));
        }
        if self.status != OkrStatus::PendingArchive {
            return Err(LifecycleError::NotArchivable(self.status));
        }

        let transition = self.transition_with_reason(
            OkrStatus::Published,
            Some("ARCHIVED".to_string()),
            actor,
        )?;
        self.archived = true;
        Ok(transition)
    }

    /// Force a transition (admin override). Also lifts the archive lock.
    pub fn force_transition(
        &mut self,
        to: OkrStatus,
        reason: &str,
        actor: Option<String>,
    ) -> StatusTransition {
        let mut transition =
            StatusTransition::new(self.status, to).with_reason(format!("FORCED: {}", reason));
        if let Some(a) = actor {
            transition = transition.with_actor(a);
        }
        self.status = to;
        self.archived = false;
        self.history.push(transition.clone());
        transition
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in OkrStatus::ALL {
            let parsed: OkrStatus = status.as_str().parse().unwrap();
            assert_eq!(status, parsed);
        }
        assert!("CLOSED".parse::<OkrStatus>().is_err());
    }

    #[test]
    fn test_status_serde_matches_as_str() {
        let encoded = serde_json::to_string(&OkrStatus::PendingL2Assess).unwrap();
        assert_eq!(encoded, "\"PENDING_L2_ASSESS\"");
        let decoded: OkrStatus = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, OkrStatus::PendingL2Assess);
    }

    #[test]
    fn test_valid_transitions() {
        assert!(OkrStatus::Draft.can_transition_to(OkrStatus::PendingL1Create));
        assert!(OkrStatus::Draft.can_transition_to(OkrStatus::Published));
        assert!(!OkrStatus::Draft.can_transition_to(OkrStatus::PendingL1Assess));

        assert!(OkrStatus::Published.can_transition_to(OkrStatus::PendingL1Assess));
        assert!(!OkrStatus::PendingL1Assess.can_transition_to(OkrStatus::PendingL3Assess));
        assert!(OkrStatus::PendingArchive.can_transition_to(OkrStatus::PendingL1Assess));
    }

    #[test]
    fn test_approval_level() {
        assert_eq!(OkrStatus::PendingL1Create.approval_level(), Some(1));
        assert_eq!(OkrStatus::PendingL3Assess.approval_level(), Some(3));
        assert_eq!(OkrStatus::PendingArchive.approval_level(), None);
    }

    #[test]
    fn test_lifecycle_records_history() {
        let mut lifecycle = Lifecycle::new();
        lifecycle
            .transition_with_reason(OkrStatus::PendingL1Create, None, Some("u1".into()))
            .unwrap();
        assert_eq!(lifecycle.status(), OkrStatus::PendingL1Create);
        assert_eq!(lifecycle.history().len(), 1);
        assert_eq!(lifecycle.history()[0].from, OkrStatus::Draft);
        assert_eq!(lifecycle.history()[0].actor.as_deref(), Some("u1"));
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let mut lifecycle = Lifecycle::new();
        let result = lifecycle.transition(OkrStatus::PendingArchive);
        assert!(matches!(
            result,
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert_eq!(lifecycle.status(), OkrStatus::Draft);
        assert!(lifecycle.history().is_empty());
    }

    #[test]
    fn test_archive_resets_to_published_and_locks() {
        let mut lifecycle = Lifecycle::from_state(OkrStatus::PendingArchive, false);
        lifecycle.archive(Some("hr".into())).unwrap();
        assert_eq!(lifecycle.status(), OkrStatus::Published);
        assert!(lifecycle.is_archived());
        assert_eq!(lifecycle.phase(), Phase::Closed);

        let result = lifecycle.transition(OkrStatus::PendingL1Assess);
        assert_eq!(result, Err(LifecycleError::Archived(OkrStatus::Published)));
    }

    #[test]
    fn test_archive_requires_pending_archive() {
        let mut lifecycle = Lifecycle::from_state(OkrStatus::PendingL2Assess, false);
        assert_eq!(
            lifecycle.archive(None),
            Err(LifecycleError::NotArchivable(OkrStatus::PendingL2Assess))
        );
        assert!(!lifecycle.is_archived());
    }

    #[test]
    fn test_force_transition_unlocks() {
        let mut lifecycle = Lifecycle::from_state(OkrStatus::Published, true);
        let transition = lifecycle.force_transition(OkrStatus::Draft, "admin revoke", None);
        assert_eq!(lifecycle.status(), OkrStatus::Draft);
        assert!(!lifecycle.is_archived());
        assert_eq!(transition.reason.as_deref(), Some("FORCED: admin revoke"));
    }

    #[test]
    fn test_phase_keys_off_both_axes() {
        assert_eq!(
            Lifecycle::from_state(OkrStatus::Published, false).phase(),
            Phase::Execution
        );
        assert_eq!(
            Lifecycle::from_state(OkrStatus::Published, true).phase(),
            Phase::Closed
        );
        assert_eq!(
            Lifecycle::from_state(OkrStatus::PendingL2Create, false).phase(),
            Phase::CreationApproval
        );
    }
}
