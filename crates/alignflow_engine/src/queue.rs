//! Per-user work queues and badge counts.
//!
//! Everything here is derived from the current records on each call; there
//! is no cached queue state to go stale.

use crate::authority::{can_act_on_stage, can_archive, can_give_feedback, Rules};
use crate::model::{ApprovalStage, Okr, User};
use alignflow_lifecycle::OkrStatus;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ApproveCreation,
    CreationFeedback,
    SelfAssessment,
    Score,
    ApproveAssessment,
    AssessmentFeedback,
    Archive,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ApproveCreation => "approve creation",
            ActionKind::CreationFeedback => "creation feedback",
            ActionKind::SelfAssessment => "self-assessment",
            ActionKind::Score => "score",
            ActionKind::ApproveAssessment => "approve assessment",
            ActionKind::AssessmentFeedback => "assessment feedback",
            ActionKind::Archive => "archive",
        }
    }

    fn counts_as_approval(&self) -> bool {
        matches!(self, ActionKind::ApproveCreation | ActionKind::CreationFeedback)
    }

    fn counts_as_assessment(&self) -> bool {
        matches!(
            self,
            ActionKind::SelfAssessment
                | ActionKind::Score
                | ActionKind::ApproveAssessment
                | ActionKind::AssessmentFeedback
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionItem {
    pub kind: ActionKind,
    pub okr: Okr,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BadgeCounts {
    /// Creation approvals and creation feedback requests
    pub approvals: usize,
    /// Self-assessments, scoring, assessment approvals and feedback
    pub assessments: usize,
}

/// What `user` is expected to do with `okr`, if anything.
pub fn action_for(rules: &Rules<'_>, user: &User, okr: &Okr) -> Option<ActionKind> {
    if okr.is_archived() {
        return None;
    }
    let status = okr.status();

    if status == OkrStatus::Published {
        return okr.is_owned_by(user).then_some(ActionKind::SelfAssessment);
    }

    if status.is_creation_pending() {
        if can_act_on_stage(rules, user, okr) {
            return Some(ActionKind::ApproveCreation);
        }
        return can_give_feedback(rules, user, okr).then_some(ActionKind::CreationFeedback);
    }

    if status.is_assessment_pending() {
        if can_act_on_stage(rules, user, okr) {
            let unscored = ApprovalStage::for_status(status) == Some(ApprovalStage::L1Assess)
                && okr.total_score.is_none();
            return Some(if unscored {
                ActionKind::Score
            } else {
                ActionKind::ApproveAssessment
            });
        }
        return can_give_feedback(rules, user, okr).then_some(ActionKind::AssessmentFeedback);
    }

    if status == OkrStatus::PendingArchive && can_archive(rules, user) {
        return Some(ActionKind::Archive);
    }
    None
}

pub fn actionable_items_for(rules: &Rules<'_>, user: &User, okrs: &[Okr]) -> Vec<ActionItem> {
    okrs.iter()
        .filter_map(|okr| {
            action_for(rules, user, okr).map(|kind| ActionItem {
                kind,
                okr: okr.clone(),
            })
        })
        .collect()
}

pub fn badge_counts(items: &[ActionItem]) -> BadgeCounts {
    items.iter().fold(BadgeCounts::default(), |mut counts, item| {
        if item.kind.counts_as_approval() {
            counts.approvals += 1;
        } else if item.kind.counts_as_assessment() {
            counts.assessments += 1;
        }
        counts
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OkrLevel;
    use crate::registry::WorkflowRegistry;
    use crate::resolver::ApproverResolver;
    use crate::role::{Role, RolePolicy};
    use crate::scoring::GradeBands;
    use alignflow_ids::UserId;
    use alignflow_lifecycle::Lifecycle;

    fn user(id: &str, role: Role, dept: &str) -> User {
        User::new(UserId::parse(id).unwrap(), id, role, dept)
    }

    fn okr(owner: &User, status: OkrStatus, scored: bool) -> Okr {
        let mut okr = Okr::draft(owner, OkrLevel::Personal);
        okr.lifecycle = Lifecycle::from_state(status, false);
        if scored {
            okr.total_score = Some(90.0);
        }
        okr
    }

    #[test]
    fn test_queue_and_badges() {
        let e1 = user("e1", Role::RdEmployee, "Crypto");
        let e2 = user("e2", Role::QaEmployee, "Crypto");
        let h1 = user("h1", Role::TechHead, "Crypto");
        let tm = user("tm", Role::TechManager, "Crypto");
        let hr = user("hr", Role::Hrbp, "HQ");
        let users = vec![e1.clone(), e2.clone(), h1.clone(), tm.clone(), hr.clone()];

        let registry = WorkflowRegistry::with_defaults(Role::Hrbp);
        let resolver = ApproverResolver::new(users);
        let policy = RolePolicy::default();
        let grading = GradeBands::default();
        let rules = Rules {
            registry: &registry,
            resolver: &resolver,
            policy: &policy,
            grading: &grading,
        };

        let okrs = vec![
            okr(&e1, OkrStatus::PendingL1Create, false),
            okr(&e2, OkrStatus::PendingL1Assess, false),
            okr(&e1, OkrStatus::PendingL1Assess, true),
            okr(&e1, OkrStatus::PendingArchive, true),
            okr(&h1, OkrStatus::Published, false),
        ];

        let items = actionable_items_for(&rules, &h1, &okrs);
        let kinds: Vec<ActionKind> = items.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::ApproveCreation,
                ActionKind::Score,
                ActionKind::ApproveAssessment,
                ActionKind::SelfAssessment,
            ]
        );
        assert_eq!(
            badge_counts(&items),
            BadgeCounts {
                approvals: 1,
                assessments: 3
            }
        );

        let tm_items = actionable_items_for(&rules, &tm, &okrs);
        assert_eq!(tm_items.len(), 2);
        assert!(tm_items
            .iter()
            .all(|i| matches!(i.kind, ActionKind::CreationFeedback | ActionKind::AssessmentFeedback)));

        let hr_items = actionable_items_for(&rules, &hr, &okrs);
        assert_eq!(hr_items.len(), 1);
        assert_eq!(hr_items[0].kind, ActionKind::Archive);
        assert_eq!(badge_counts(&hr_items), BadgeCounts::default());
    }
}
