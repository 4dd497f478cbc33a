//! Score and comment edits during the assessment cycle, and advisory
//! feedback.
//!
//! Edits arrive as serde-tagged enums so the CLI can read them from JSON:
//!
//! ```json
//! [
//!   {"kind": "key_result_score", "key_result": "…", "score": 85},
//!   {"kind": "overall_comment", "comment": "Strong half"}
//! ]
//! ```

use crate::authority::{authorize_stage, can_give_feedback, Rules};
use crate::error::{AuthorizationError, EngineError, Result, ValidationError};
use crate::model::{ApprovalStage, CcFeedback, Grade, Okr};
use crate::scoring::{refresh_manager_total, refresh_objective_manager_score, refresh_self_scores};
use crate::session::Session;
use crate::transitions::{check_score, require_reason};
use alignflow_ids::{KeyResultId, ObjectiveId};
use alignflow_lifecycle::{LifecycleError, OkrStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Owner edit of their own self-assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelfEdit {
    KeyResult {
        key_result: KeyResultId,
        #[serde(default)]
        score: Option<f64>,
        #[serde(default)]
        comment: Option<String>,
    },
    ObjectiveComment {
        objective: ObjectiveId,
        comment: String,
    },
    OverallComment {
        comment: String,
    },
}

/// Grader edit at an assessment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManagerEdit {
    KeyResultScore { key_result: KeyResultId, score: f64 },
    KeyResultComment { key_result: KeyResultId, comment: String },
    /// Overrides the rolled-up objective score
    ObjectiveScore { objective: ObjectiveId, score: f64 },
    ObjectiveComment { objective: ObjectiveId, comment: String },
    OverallComment { comment: String },
    /// Overrides the banded grade
    FinalGrade { grade: Grade },
}

fn non_empty_comment(comment: &str) -> Option<String> {
    let trimmed = comment.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ============================================================================
// Self-assessment edits
// ============================================================================

pub fn apply_self_edits(session: &Session, okr: &mut Okr, edits: &[SelfEdit]) -> Result<()> {
    if !okr.is_owned_by(&session.actor) {
        return Err(AuthorizationError::new(
            session.actor_id(),
            "edit self-assessment",
            &okr.id,
            "only the owner may self-assess",
        )
        .into());
    }
    if okr.is_archived() {
        return Err(LifecycleError::Archived(okr.status()).into());
    }
    if okr.status() != OkrStatus::Published {
        return Err(EngineError::wrong_status("edit self-assessment", okr.status()));
    }

    // Validate everything against a scratch copy so a bad edit changes nothing
    let mut draft = okr.clone();
    for edit in edits {
        match edit {
            SelfEdit::KeyResult {
                key_result,
                score,
                comment,
            } => {
                let score = score.map(|s| check_score("self score", s)).transpose()?;
                let (_, kr) = draft
                    .key_result_mut(key_result)
                    .ok_or_else(|| EngineError::KeyResultNotFound(key_result.clone()))?;
                if let Some(score) = score {
                    kr.self_score = Some(score);
                }
                if let Some(comment) = comment {
                    kr.self_comment = non_empty_comment(comment);
                }
            }
            SelfEdit::ObjectiveComment { objective, comment } => {
                let target = draft
                    .objective_mut(objective)
                    .ok_or_else(|| EngineError::ObjectiveNotFound(objective.clone()))?;
                target.self_comment = non_empty_comment(comment);
            }
            SelfEdit::OverallComment { comment } => {
                draft
                    .overall_self_assessment
                    .get_or_insert_with(Default::default)
                    .comment = comment.trim().to_string();
            }
        }
    }

    refresh_self_scores(&mut draft);
    draft.updated_at = Utc::now();
    *okr = draft;
    debug!("Applied {} self-assessment edits to OKR {}", edits.len(), okr.id);
    Ok(())
}

// ============================================================================
// Manager edits
// ============================================================================

/// Apply grader edits. At second and third level stages a non-empty
/// `adjustment_reason` is required and recorded.
pub fn apply_manager_edits(
    rules: &Rules<'_>,
    session: &Session,
    okr: &mut Okr,
    edits: &[ManagerEdit],
    adjustment_reason: Option<&str>,
) -> Result<()> {
    let grant = authorize_stage(rules, &session.actor, okr, "score")?;
    if grant.stage.is_creation() {
        return Err(EngineError::wrong_status("score", okr.status()));
    }

    let cross_level = matches!(grant.stage, ApprovalStage::L2Assess | ApprovalStage::L3Assess);
    let reason = match adjustment_reason {
        Some(reason) => Some(require_reason(reason)?),
        None if cross_level => {
            return Err(ValidationError::Required("adjustment reason").into());
        }
        None => None,
    };

    let mut draft = okr.clone();
    let mut rescore = false;
    let mut grade_override = None;
    for edit in edits {
        match edit {
            ManagerEdit::KeyResultScore { key_result, score } => {
                let score = check_score("manager score", *score)?;
                let (idx, kr) = draft
                    .key_result_mut(key_result)
                    .ok_or_else(|| EngineError::KeyResultNotFound(key_result.clone()))?;
                kr.manager_score = Some(score);
                refresh_objective_manager_score(&mut draft.objectives[idx]);
                rescore = true;
            }
            ManagerEdit::KeyResultComment {
                key_result,
                comment,
            } => {
                let (_, kr) = draft
                    .key_result_mut(key_result)
                    .ok_or_else(|| EngineError::KeyResultNotFound(key_result.clone()))?;
                kr.manager_comment = non_empty_comment(comment);
            }
            ManagerEdit::ObjectiveScore { objective, score } => {
                let score = check_score("objective score", *score)?;
                draft
                    .objective_mut(objective)
                    .ok_or_else(|| EngineError::ObjectiveNotFound(objective.clone()))?
                    .manager_score = Some(score);
                rescore = true;
            }
            ManagerEdit::ObjectiveComment { objective, comment } => {
                draft
                    .objective_mut(objective)
                    .ok_or_else(|| EngineError::ObjectiveNotFound(objective.clone()))?
                    .manager_comment = non_empty_comment(comment);
            }
            ManagerEdit::OverallComment { comment } => {
                draft
                    .overall_manager_assessment
                    .get_or_insert_with(Default::default)
                    .comment = comment.trim().to_string();
            }
            ManagerEdit::FinalGrade { grade } => {
                grade_override = Some(*grade);
            }
        }
    }

    if rescore {
        refresh_manager_total(&mut draft, rules.grading);
    }
    if let Some(grade) = grade_override {
        draft.final_grade = Some(grade);
    }
    if let Some(reason) = reason {
        draft.adjustment_reason = Some(reason);
    }
    draft.updated_at = Utc::now();
    *okr = draft;

    info!(
        "{} scored OKR {} at {} (total {:?}, grade {:?})",
        session.actor.id,
        okr.id,
        okr.status(),
        okr.total_score,
        okr.final_grade
    );
    Ok(())
}

// ============================================================================
// Feedback
// ============================================================================

/// Upsert the actor's advisory feedback.
pub fn submit_feedback(
    rules: &Rules<'_>,
    session: &Session,
    okr: &mut Okr,
    comment: &str,
    recommended_grade: Option<Grade>,
) -> Result<()> {
    let comment = non_empty_comment(comment).ok_or(ValidationError::Required("feedback comment"))?;
    if !can_give_feedback(rules, &session.actor, okr) {
        return Err(AuthorizationError::new(
            session.actor_id(),
            "comment on",
            &okr.id,
            "feedback is open to invited peers and CC roles during review stages",
        )
        .into());
    }

    let entry = CcFeedback {
        user_id: session.actor.id.clone(),
        user_name: session.actor.name.clone(),
        role: session.actor.role.default_label().to_string(),
        comment,
        recommended_grade,
        created_at: Utc::now(),
    };

    match okr
        .cc_feedback
        .iter_mut()
        .find(|f| f.user_id == session.actor.id)
    {
        Some(existing) => *existing = entry,
        None => okr.cc_feedback.push(entry),
    }
    okr.updated_at = Utc::now();
    debug!("Recorded feedback from {} on OKR {}", session.actor.id, okr.id);
    Ok(())
}
