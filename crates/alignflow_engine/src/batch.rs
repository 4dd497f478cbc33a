//! Team board and the batch approval gate.
//!
//! A manager's team is every record on which they are the resolved approver
//! at some level. The board splits the team's assessments into four
//! partitions; "approve all" is only open when nothing the manager still
//! has to score is left behind.

use crate::authority::{can_act_on_stage, Rules};
use crate::error::EngineError;
use crate::model::{ApproverLevel, Okr, User};
use alignflow_ids::OkrId;
use alignflow_lifecycle::{OkrStatus, StatusTransition};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardScope {
    /// Owners that manage nobody
    Members,
    /// Owners whose role is a cadre role
    Leaders,
    #[default]
    All,
}

impl std::str::FromStr for BoardScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "members" => Ok(BoardScope::Members),
            "leaders" => Ok(BoardScope::Leaders),
            "all" => Ok(BoardScope::All),
            other => Err(format!("invalid board scope: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BatchGate {
    /// This many records can be approved together
    Ready { count: usize },
    /// Records still lack the manager's score
    Blocked { awaiting_scoring: usize },
    /// Nothing to approve
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamBoard {
    pub awaiting_self_assessment: Vec<Okr>,
    pub awaiting_scoring: Vec<Okr>,
    pub scored_awaiting_submission: Vec<Okr>,
    pub awaiting_higher_approval: Vec<Okr>,
}

impl TeamBoard {
    /// Records a batch approval would act on.
    pub fn actionable(&self) -> &[Okr] {
        &self.scored_awaiting_submission
    }

    pub fn gate(&self) -> BatchGate {
        if !self.awaiting_scoring.is_empty() {
            BatchGate::Blocked {
                awaiting_scoring: self.awaiting_scoring.len(),
            }
        } else if self.scored_awaiting_submission.is_empty() {
            BatchGate::Empty
        } else {
            BatchGate::Ready {
                count: self.scored_awaiting_submission.len(),
            }
        }
    }

    pub fn total(&self) -> usize {
        self.awaiting_self_assessment.len()
            + self.awaiting_scoring.len()
            + self.scored_awaiting_submission.len()
            + self.awaiting_higher_approval.len()
    }
}

fn level_rank(level: ApproverLevel) -> u8 {
    match level {
        ApproverLevel::L1 => 1,
        ApproverLevel::L2 => 2,
        ApproverLevel::L3 => 3,
    }
}

/// Lowest level at which `manager` is the resolved approver of `okr`.
pub fn chain_level(rules: &Rules<'_>, manager: &User, okr: &Okr) -> Option<ApproverLevel> {
    if okr.is_owned_by(manager) {
        return None;
    }
    if rules
        .resolver
        .primaries()
        .is_department_primary(&okr.department, &manager.id)
    {
        return Some(ApproverLevel::L1);
    }

    let roles = rules.approver_roles(okr).ok()?;
    [ApproverLevel::L1, ApproverLevel::L2, ApproverLevel::L3]
        .into_iter()
        .find(|level| {
            roles.at(*level).is_some_and(|role| {
                role == &manager.role
                    && rules
                        .resolver
                        .resolve_users(role, &okr.department)
                        .is_ok_and(|resolved| resolved.user.id == manager.id)
            })
        })
}

fn in_scope(rules: &Rules<'_>, okr: &Okr, scope: BoardScope) -> bool {
    let owner_role = match rules.resolver.find_user(&okr.user_id) {
        Some(owner) => &owner.role,
        None => return false,
    };
    match scope {
        BoardScope::All => true,
        BoardScope::Leaders => rules.registry.is_cadre(owner_role),
        BoardScope::Members => !rules.registry.is_cadre(owner_role),
    }
}

/// Approves at some level, is the fallback approver, or holds a designation.
fn heads_a_team(rules: &Rules<'_>, manager: &User) -> bool {
    rules.registry.is_approver(&manager.role)
        || rules.registry.fallback_approver() == &manager.role
        || rules.resolver.primaries().iter().any(|(_, id)| id == &manager.id)
}

/// Leader assessments are visible to admins, the top executive and roles
/// approving some cadre.
pub fn can_view_leaders(rules: &Rules<'_>, manager: &User) -> bool {
    rules.policy.is_admin(&manager.role)
        || rules.policy.is_top_executive(&manager.role)
        || rules.registry.can_assess_leaders(&manager.role)
}

/// Partition the manager's team for the current assessment cycle.
pub fn team_board(rules: &Rules<'_>, manager: &User, okrs: &[Okr], scope: BoardScope) -> TeamBoard {
    let mut board = TeamBoard::default();
    if !heads_a_team(rules, manager)
        || (scope == BoardScope::Leaders && !can_view_leaders(rules, manager))
    {
        return board;
    }

    for okr in okrs {
        if okr.is_archived() || !in_scope(rules, okr, scope) {
            continue;
        }
        let Some(level) = chain_level(rules, manager, okr) else {
            continue;
        };

        let status = okr.status();
        if status == OkrStatus::Published {
            board.awaiting_self_assessment.push(okr.clone());
        } else if status.is_assessment_pending() && can_act_on_stage(rules, manager, okr) {
            if okr.total_score.is_none() {
                board.awaiting_scoring.push(okr.clone());
            } else {
                board.scored_awaiting_submission.push(okr.clone());
            }
        } else if status == OkrStatus::PendingArchive
            || status
                .approval_level()
                .is_some_and(|stage| status.is_assessment_pending() && stage > level_rank(level))
        {
            board.awaiting_higher_approval.push(okr.clone());
        }
    }
    board
}

// ============================================================================
// Batch results
// ============================================================================

/// Outcome of one record in a batch operation.
#[derive(Debug)]
pub struct BatchItem {
    pub okr_id: OkrId,
    pub owner: String,
    pub result: Result<StatusTransition, EngineError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }
}
