//! Draft content edits and deletion rights.

use crate::authority::{is_admin, Rules};
use crate::error::{AuthorizationError, EngineError, Result, ValidationError};
use crate::model::{Objective, Okr};
use crate::session::Session;
use alignflow_ids::{OkrId, UserId};
use alignflow_lifecycle::{LifecycleError, OkrStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Replacement values for the editable parts of an OKR. Absent fields are
/// left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_okr_id: Option<OkrId>,
    /// Drop the alignment link
    #[serde(default)]
    pub clear_parent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<Vec<Objective>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_reviewers: Option<Vec<UserId>>,
}

impl ContentUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.period.is_none()
            && self.parent_okr_id.is_none()
            && !self.clear_parent
            && self.objectives.is_none()
            && self.peer_reviewers.is_none()
    }
}

fn check_weight(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::OutOfRange { field, value }.into());
    }
    Ok(())
}

fn required_text(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field).into());
    }
    Ok(trimmed.to_string())
}

/// Owner while in draft, or an admin on any unarchived record.
pub fn can_edit_content(rules: &Rules<'_>, session: &Session, okr: &Okr) -> bool {
    if okr.is_archived() {
        return false;
    }
    is_admin(rules, &session.actor)
        || (okr.is_owned_by(&session.actor) && okr.status() == OkrStatus::Draft)
}

/// Owner while in draft, or an admin at any time.
pub fn can_delete(rules: &Rules<'_>, session: &Session, okr: &Okr) -> bool {
    is_admin(rules, &session.actor)
        || (okr.is_owned_by(&session.actor) && okr.status() == OkrStatus::Draft && !okr.is_archived())
}

pub fn apply_content_update(
    rules: &Rules<'_>,
    session: &Session,
    okr: &mut Okr,
    update: &ContentUpdate,
) -> Result<()> {
    if okr.is_archived() {
        return Err(LifecycleError::Archived(okr.status()).into());
    }
    if !can_edit_content(rules, session, okr) {
        if okr.is_owned_by(&session.actor) {
            return Err(EngineError::wrong_status("edit", okr.status()));
        }
        return Err(AuthorizationError::new(
            session.actor_id(),
            "edit",
            &okr.id,
            "only the owner may edit a draft",
        )
        .into());
    }
    if update.is_empty() {
        return Err(ValidationError::Invalid("nothing to update".to_string()).into());
    }

    let title = update
        .title
        .as_deref()
        .map(|t| required_text("title", t))
        .transpose()?;
    let period = update
        .period
        .as_deref()
        .map(|p| required_text("period", p))
        .transpose()?;
    if update.parent_okr_id.as_ref() == Some(&okr.id) {
        return Err(ValidationError::Invalid("an OKR cannot align to itself".to_string()).into());
    }
    if let Some(objectives) = &update.objectives {
        for objective in objectives {
            check_weight("objective weight", objective.weight)?;
            for kr in &objective.key_results {
                check_weight("key result weight", kr.weight)?;
            }
        }
    }

    if let Some(title) = title {
        okr.title = title;
    }
    if let Some(period) = period {
        okr.period = period;
    }
    if update.clear_parent {
        okr.parent_okr_id = None;
    } else if let Some(parent) = &update.parent_okr_id {
        okr.parent_okr_id = Some(parent.clone());
    }
    if let Some(objectives) = &update.objectives {
        okr.objectives = objectives.clone();
    }
    if let Some(reviewers) = &update.peer_reviewers {
        let mut reviewers: Vec<UserId> = reviewers
            .iter()
            .filter(|id| **id != okr.user_id)
            .cloned()
            .collect();
        reviewers.sort();
        reviewers.dedup();
        okr.peer_reviewers = reviewers;
    }
    okr.updated_at = Utc::now();
    debug!("Updated content of OKR {}", okr.id);
    Ok(())
}
