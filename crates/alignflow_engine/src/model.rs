//! OKR aggregate and the records it references.

use crate::role::Role;
use alignflow_ids::{KeyResultId, ObjectiveId, OkrId, UserId};
use alignflow_lifecycle::{Lifecycle, OkrStatus, Phase};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Users
// ============================================================================

/// A directory user as the engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub department: String,
    /// Tie-breaker flag when several users share a role in a department
    #[serde(default)]
    pub is_primary_approver: bool,
}

impl User {
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        role: Role,
        department: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            department: department.into(),
            is_primary_approver: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary_approver = true;
        self
    }
}

// ============================================================================
// Grades
// ============================================================================

/// Final performance grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    S,
    A,
    B,
    C,
    /// Not yet determined
    Pending,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::Pending => "PENDING",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S" => Ok(Grade::S),
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "PENDING" => Ok(Grade::Pending),
            other => Err(format!("invalid grade: {}", other)),
        }
    }
}

// ============================================================================
// Objectives and key results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyResult {
    pub id: KeyResultId,
    pub content: String,
    /// Share of the objective, 0-100
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_comment: Option<String>,
}

impl KeyResult {
    pub fn new(content: impl Into<String>, weight: f64) -> Self {
        Self {
            id: KeyResultId::new(),
            content: content.into(),
            weight,
            self_score: None,
            self_comment: None,
            manager_score: None,
            manager_comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: ObjectiveId,
    pub content: String,
    /// Share of the OKR, 0-100
    pub weight: f64,
    #[serde(default)]
    pub key_results: Vec<KeyResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_comment: Option<String>,
    /// Rolled up from key results, or overridden by the grader
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_comment: Option<String>,
}

impl Objective {
    pub fn new(content: impl Into<String>, weight: f64) -> Self {
        Self {
            id: ObjectiveId::new(),
            content: content.into(),
            weight,
            key_results: Vec::new(),
            self_score: None,
            self_comment: None,
            manager_score: None,
            manager_comment: None,
        }
    }

    pub fn with_key_result(mut self, key_result: KeyResult) -> Self {
        self.key_results.push(key_result);
        self
    }
}

/// Score and comment pair for the whole OKR.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    pub score: f64,
    pub comment: String,
}

/// Advisory feedback from a CC-role holder or invited peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CcFeedback {
    pub user_id: UserId,
    pub user_name: String,
    /// Role label at the time of writing
    pub role: String,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_grade: Option<Grade>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Approval stamps
// ============================================================================

/// Stage an approval was given at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStage {
    L1Create,
    L2Create,
    L1Assess,
    L2Assess,
    L3Assess,
}

impl ApprovalStage {
    /// Stage a status waits on.
    pub fn for_status(status: OkrStatus) -> Option<Self> {
        match status {
            OkrStatus::PendingL1Create => Some(ApprovalStage::L1Create),
            OkrStatus::PendingL2Create => Some(ApprovalStage::L2Create),
            OkrStatus::PendingL1Assess => Some(ApprovalStage::L1Assess),
            OkrStatus::PendingL2Assess => Some(ApprovalStage::L2Assess),
            OkrStatus::PendingL3Assess => Some(ApprovalStage::L3Assess),
            _ => None,
        }
    }

    pub fn level(&self) -> ApproverLevel {
        match self {
            ApprovalStage::L1Create | ApprovalStage::L1Assess => ApproverLevel::L1,
            ApprovalStage::L2Create | ApprovalStage::L2Assess => ApproverLevel::L2,
            ApprovalStage::L3Assess => ApproverLevel::L3,
        }
    }

    pub fn is_creation(&self) -> bool {
        matches!(self, ApprovalStage::L1Create | ApprovalStage::L2Create)
    }
}

/// Approver level within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApproverLevel {
    L1,
    L2,
    L3,
}

impl fmt::Display for ApproverLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApproverLevel::L1 => "L1",
            ApproverLevel::L2 => "L2",
            ApproverLevel::L3 => "L3",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStamp {
    pub stage: ApprovalStage,
    pub actor: UserId,
    pub at: DateTime<Utc>,
}

// ============================================================================
// OKR aggregate
// ============================================================================

/// Organizational level of an OKR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OkrLevel {
    Company,
    Department,
    Personal,
}

impl OkrLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OkrLevel::Company => "COMPANY",
            OkrLevel::Department => "DEPARTMENT",
            OkrLevel::Personal => "PERSONAL",
        }
    }

    fn title_word(&self) -> &'static str {
        match self {
            OkrLevel::Company => "Company",
            OkrLevel::Department => "Department",
            OkrLevel::Personal => "Personal",
        }
    }
}

impl std::str::FromStr for OkrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COMPANY" => Ok(OkrLevel::Company),
            "DEPARTMENT" => Ok(OkrLevel::Department),
            "PERSONAL" => Ok(OkrLevel::Personal),
            other => Err(format!("invalid OKR level: {}", other)),
        }
    }
}

/// Default period label for a new OKR created at `now`.
pub fn default_period(level: OkrLevel, now: DateTime<Utc>) -> String {
    let year = now.year();
    match level {
        OkrLevel::Company => format!("{} Annual", year),
        _ if now.month() <= 6 => format!("{} H1", year),
        _ => format!("{} H2", year),
    }
}

/// The OKR aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Okr {
    pub id: OkrId,
    pub user_id: UserId,
    pub user_name: String,
    pub department: String,
    pub level: OkrLevel,
    pub title: String,
    pub period: String,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub objectives: Vec<Objective>,
    /// Alignment link; advisory only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_okr_id: Option<OkrId>,
    #[serde(default)]
    pub peer_reviewers: Vec<UserId>,
    #[serde(default)]
    pub cc_feedback: Vec<CcFeedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_self_assessment: Option<OverallAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_manager_assessment: Option<OverallAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_grade: Option<Grade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment_reason: Option<String>,
    #[serde(default)]
    pub approvals: Vec<ApprovalStamp>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency stamp; 0 until first persisted
    #[serde(default)]
    pub version: u64,
}

impl Okr {
    /// A new draft owned by `owner`, with default title and period.
    pub fn draft(owner: &User, level: OkrLevel) -> Self {
        let now = Utc::now();
        Self {
            id: OkrId::new(),
            user_id: owner.id.clone(),
            user_name: owner.name.clone(),
            department: owner.department.clone(),
            level,
            title: format!("{}'s {} OKR", owner.name, level.title_word()),
            period: default_period(level, now),
            lifecycle: Lifecycle::new(),
            objectives: Vec::new(),
            parent_okr_id: None,
            peer_reviewers: Vec::new(),
            cc_feedback: Vec::new(),
            overall_self_assessment: None,
            overall_manager_assessment: None,
            total_score: None,
            final_grade: None,
            adjustment_reason: None,
            approvals: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn status(&self) -> OkrStatus {
        self.lifecycle.status()
    }

    pub fn is_archived(&self) -> bool {
        self.lifecycle.is_archived()
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    pub fn is_owned_by(&self, user: &User) -> bool {
        self.user_id == user.id
    }

    pub fn objective_mut(&mut self, id: &ObjectiveId) -> Option<&mut Objective> {
        self.objectives.iter_mut().find(|o| &o.id == id)
    }

    /// Find a key result and the index of its objective.
    pub fn key_result_mut(&mut self, id: &KeyResultId) -> Option<(usize, &mut KeyResult)> {
        self.objectives
            .iter_mut()
            .enumerate()
            .find_map(|(idx, objective)| {
                objective
                    .key_results
                    .iter_mut()
                    .find(|kr| &kr.id == id)
                    .map(|kr| (idx, kr))
            })
    }

    /// Adjustment reason, if one with content is recorded.
    pub fn adjustment_reason(&self) -> Option<&str> {
        self.adjustment_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}
