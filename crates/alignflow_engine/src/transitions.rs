//! Lifecycle operations on a single OKR.
//!
//! Each function checks authority and preconditions, then mutates the
//! aggregate in place. Nothing is mutated when a check fails. Persisting the
//! result is the caller's job.

use crate::authority::{self, authorize_stage, Rules, StageAuthority};
use crate::error::{AuthorizationError, EngineError, Result, ValidationError};
use crate::model::{ApprovalStage, ApprovalStamp, Okr};
use crate::scoring::{refresh_self_scores, round1};
use crate::session::Session;
use alignflow_lifecycle::{LifecycleError, OkrStatus, StatusTransition};
use chrono::Utc;
use tracing::info;

const WEIGHT_TOTAL: f64 = 100.0;
const WEIGHT_EPSILON: f64 = 1e-6;

// ============================================================================
// Shared checks
// ============================================================================

fn require_owner(session: &Session, okr: &Okr, action: &'static str) -> Result<()> {
    if !okr.is_owned_by(&session.actor) {
        return Err(AuthorizationError::new(
            session.actor_id(),
            action,
            &okr.id,
            "only the owner may do this",
        )
        .into());
    }
    Ok(())
}

fn require_unarchived(okr: &Okr) -> Result<()> {
    if okr.is_archived() {
        return Err(LifecycleError::Archived(okr.status()).into());
    }
    Ok(())
}

fn require_status(okr: &Okr, expected: OkrStatus, action: &'static str) -> Result<()> {
    if okr.status() != expected {
        return Err(EngineError::wrong_status(action, okr.status()));
    }
    Ok(())
}

pub(crate) fn require_reason(reason: &str) -> Result<String> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required("adjustment reason").into());
    }
    Ok(trimmed.to_string())
}

pub(crate) fn check_score(field: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::OutOfRange { field, value }.into());
    }
    Ok(value)
}

fn not_blank(text: Option<&str>) -> bool {
    text.map(|t| !t.trim().is_empty()).unwrap_or(false)
}

fn touch(okr: &mut Okr) {
    okr.updated_at = Utc::now();
}

fn stamp(okr: &mut Okr, stage: ApprovalStage, session: &Session) {
    okr.approvals.push(ApprovalStamp {
        stage,
        actor: session.actor.id.clone(),
        at: Utc::now(),
    });
}

fn clear_assessment_stamps(okr: &mut Okr) {
    okr.approvals.retain(|s| s.stage.is_creation());
}

/// Weight rules every OKR must satisfy before it is submitted.
pub fn validate_weights(okr: &Okr) -> std::result::Result<(), ValidationError> {
    if okr.objectives.is_empty() {
        return Err(ValidationError::NoObjectives);
    }

    for objective in &okr.objectives {
        if !(0.0..=WEIGHT_TOTAL).contains(&objective.weight) {
            return Err(ValidationError::OutOfRange {
                field: "objective weight",
                value: objective.weight,
            });
        }
    }
    let total: f64 = okr.objectives.iter().map(|o| o.weight).sum();
    if (total - WEIGHT_TOTAL).abs() > WEIGHT_EPSILON {
        return Err(ValidationError::ObjectiveWeights(round1(total)));
    }

    for objective in &okr.objectives {
        if objective.key_results.is_empty() {
            return Err(ValidationError::NoKeyResults(objective.content.clone()));
        }
        if let Some(kr) = objective
            .key_results
            .iter()
            .find(|kr| !(0.0..=WEIGHT_TOTAL).contains(&kr.weight))
        {
            return Err(ValidationError::OutOfRange {
                field: "key result weight",
                value: kr.weight,
            });
        }
        let sum: f64 = objective.key_results.iter().map(|kr| kr.weight).sum();
        if (sum - WEIGHT_TOTAL).abs() > WEIGHT_EPSILON {
            return Err(ValidationError::KeyResultWeights {
                objective: objective.content.clone(),
                sum: round1(sum),
            });
        }
    }
    Ok(())
}

/// Comment rules for a self-assessment.
pub fn validate_self_assessment(okr: &Okr) -> std::result::Result<(), ValidationError> {
    for objective in &okr.objectives {
        for kr in &objective.key_results {
            if !not_blank(kr.self_comment.as_deref()) {
                return Err(ValidationError::MissingSelfComment(format!(
                    "key result '{}'",
                    kr.content
                )));
            }
        }
        if !not_blank(objective.self_comment.as_deref()) {
            return Err(ValidationError::MissingSelfComment(format!(
                "objective '{}'",
                objective.content
            )));
        }
    }
    let overall = okr
        .overall_self_assessment
        .as_ref()
        .map(|a| a.comment.as_str());
    if !not_blank(overall) {
        return Err(ValidationError::MissingSelfComment("overall summary".to_string()));
    }
    Ok(())
}

// ============================================================================
// Creation
// ============================================================================

/// Owner submits a draft for approval, or publishes it directly when the
/// owner holds an executive role.
pub fn submit(rules: &Rules<'_>, session: &Session, okr: &mut Okr) -> Result<StatusTransition> {
    require_owner(session, okr, "submit")?;
    require_unarchived(okr)?;
    require_status(okr, OkrStatus::Draft, "submit")?;
    validate_weights(okr)?;

    let target = if rules.policy.is_executive(&session.actor.role) {
        OkrStatus::Published
    } else {
        OkrStatus::PendingL1Create
    };

    let transition = okr
        .lifecycle
        .transition_with_reason(target, None, session.history_actor())?;
    touch(okr);
    info!("Submitted OKR {} ({} -> {})", okr.id, transition.from, transition.to);
    Ok(transition)
}

pub fn approve_creation(rules: &Rules<'_>, session: &Session, okr: &mut Okr) -> Result<StatusTransition> {
    let grant = authorize_stage(rules, &session.actor, okr, "approve")?;
    if !grant.stage.is_creation() {
        return Err(EngineError::wrong_status("approve creation", okr.status()));
    }

    let target = match grant.stage {
        ApprovalStage::L1Create if rules.approver_roles(okr)?.l2.is_some() => {
            OkrStatus::PendingL2Create
        }
        _ => OkrStatus::Published,
    };

    let transition = okr
        .lifecycle
        .transition_with_reason(target, None, session.history_actor())?;
    stamp(okr, grant.stage, session);
    touch(okr);
    info!(
        "Approved creation of OKR {} ({} -> {})",
        okr.id, transition.from, transition.to
    );
    Ok(transition)
}

/// Back to draft; the approval chain starts over.
pub fn reject_creation(
    rules: &Rules<'_>,
    session: &Session,
    okr: &mut Okr,
    reason: Option<&str>,
) -> Result<StatusTransition> {
    let grant = authorize_stage(rules, &session.actor, okr, "reject")?;
    if !grant.stage.is_creation() {
        return Err(EngineError::wrong_status("reject creation", okr.status()));
    }

    let reason = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);
    let transition = okr.lifecycle.transition_with_reason(
        OkrStatus::Draft,
        reason,
        session.history_actor(),
    )?;
    okr.approvals.clear();
    touch(okr);
    info!("Rejected creation of OKR {}; returned to draft", okr.id);
    Ok(transition)
}

// ============================================================================
// Assessment
// ============================================================================

pub fn submit_self_assessment(session: &Session, okr: &mut Okr) -> Result<StatusTransition> {
    require_owner(session, okr, "submit self-assessment")?;
    require_unarchived(okr)?;
    require_status(okr, OkrStatus::Published, "submit self-assessment")?;
    validate_self_assessment(okr)?;

    refresh_self_scores(okr);
    let transition = okr.lifecycle.transition_with_reason(
        OkrStatus::PendingL1Assess,
        None,
        session.history_actor(),
    )?;
    clear_assessment_stamps(okr);
    touch(okr);
    info!("Self-assessment submitted for OKR {}", okr.id);
    Ok(transition)
}

pub fn approve_assessment(rules: &Rules<'_>, session: &Session, okr: &mut Okr) -> Result<StatusTransition> {
    let grant = authorize_stage(rules, &session.actor, okr, "approve")?;
    if grant.stage.is_creation() {
        return Err(EngineError::wrong_status("approve assessment", okr.status()));
    }
    if grant.stage == ApprovalStage::L1Assess && okr.total_score.is_none() {
        return Err(ValidationError::MissingTotalScore.into());
    }

    let target = if grant.authority == StageAuthority::TopExecutive {
        OkrStatus::PendingArchive
    } else {
        let roles = rules.approver_roles(okr)?;
        match grant.stage {
            ApprovalStage::L1Assess if roles.l2.is_some() => OkrStatus::PendingL2Assess,
            ApprovalStage::L2Assess if roles.l3.is_some() => OkrStatus::PendingL3Assess,
            _ => OkrStatus::PendingArchive,
        }
    };

    let transition = okr
        .lifecycle
        .transition_with_reason(target, None, session.history_actor())?;
    stamp(okr, grant.stage, session);
    touch(okr);
    info!(
        "Approved assessment of OKR {} ({} -> {})",
        okr.id, transition.from, transition.to
    );
    Ok(transition)
}

/// Second or third level sends the assessment back to first-level scoring.
pub fn reject_assessment(
    rules: &Rules<'_>,
    session: &Session,
    okr: &mut Okr,
    reason: &str,
) -> Result<StatusTransition> {
    let reason = require_reason(reason)?;
    let grant = authorize_stage(rules, &session.actor, okr, "reject")?;
    if !matches!(grant.stage, ApprovalStage::L2Assess | ApprovalStage::L3Assess) {
        return Err(EngineError::wrong_status("reject assessment", okr.status()));
    }

    let transition = okr.lifecycle.transition_with_reason(
        OkrStatus::PendingL1Assess,
        Some(reason.clone()),
        session.history_actor(),
    )?;
    okr.adjustment_reason = Some(reason);
    clear_assessment_stamps(okr);
    touch(okr);
    info!("Rejected assessment of OKR {}; back to L1 scoring", okr.id);
    Ok(transition)
}

/// Out-of-turn rejection of a graded assessment awaiting archive.
pub fn veto(rules: &Rules<'_>, session: &Session, okr: &mut Okr, reason: &str) -> Result<StatusTransition> {
    let reason = require_reason(reason)?;
    require_unarchived(okr)?;
    require_status(okr, OkrStatus::PendingArchive, "veto")?;
    if !authority::can_veto(rules, &session.actor, okr) {
        return Err(AuthorizationError::new(
            session.actor_id(),
            "veto",
            &okr.id,
            "veto requires a second or third level approver role",
        )
        .into());
    }

    let transition = okr.lifecycle.transition_with_reason(
        OkrStatus::PendingL1Assess,
        Some(reason.clone()),
        session.history_actor(),
    )?;
    okr.adjustment_reason = Some(reason);
    clear_assessment_stamps(okr);
    touch(okr);
    info!("Vetoed OKR {} by {}", okr.id, session.actor.id);
    Ok(transition)
}

/// Close the cycle: archived and back to PUBLISHED.
pub fn archive(rules: &Rules<'_>, session: &Session, okr: &mut Okr) -> Result<StatusTransition> {
    if !authority::can_archive(rules, &session.actor) {
        return Err(AuthorizationError::new(
            session.actor_id(),
            "archive",
            &okr.id,
            "archiving requires an HR or admin role",
        )
        .into());
    }
    let transition = okr.lifecycle.archive(session.history_actor())?;
    touch(okr);
    info!("Archived OKR {}", okr.id);
    Ok(transition)
}

/// Administrative override back to draft from any other position.
pub fn admin_revoke(
    rules: &Rules<'_>,
    session: &Session,
    okr: &mut Okr,
    reason: Option<&str>,
) -> Result<StatusTransition> {
    if !authority::is_admin(rules, &session.actor) {
        return Err(AuthorizationError::new(
            session.actor_id(),
            "revoke",
            &okr.id,
            "revocation requires an admin role",
        )
        .into());
    }
    if okr.status() == OkrStatus::Draft && !okr.is_archived() {
        return Err(EngineError::wrong_status("revoke", okr.status()));
    }

    let reason = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("administrative revoke");
    let transition = okr
        .lifecycle
        .force_transition(OkrStatus::Draft, reason, session.history_actor());
    okr.approvals.clear();
    touch(okr);
    info!("Revoked OKR {} to draft (was {})", okr.id, transition.from);
    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{KeyResult, Objective, OkrLevel, OverallAssessment, User};
    use crate::registry::WorkflowRegistry;
    use crate::resolver::ApproverResolver;
    use crate::role::{Role, RolePolicy};
    use crate::scoring::GradeBands;
    use alignflow_ids::UserId;
    use alignflow_lifecycle::Lifecycle;

    struct Org {
        registry: WorkflowRegistry,
        resolver: ApproverResolver,
        policy: RolePolicy,
        grading: GradeBands,
    }

    impl Org {
        fn new() -> Self {
            let users = vec![
                user("e1", Role::RdEmployee, "Crypto"),
                user("h1", Role::TechHead, "Crypto"),
                user("gm", Role::TechGm, "R&D"),
                user("vp", Role::VpTech, "HQ"),
                user("hr", Role::Hrbp, "HQ"),
                user("admin", Role::Admin, "HQ"),
                user("dev", Role::RdEmployee, "Crypto"),
            ];
            Self {
                registry: WorkflowRegistry::with_defaults(Role::Hrbp),
                resolver: ApproverResolver::new(users),
                policy: RolePolicy::default(),
                grading: GradeBands::default(),
            }
        }

        fn rules(&self) -> Rules<'_> {
            Rules {
                registry: &self.registry,
                resolver: &self.resolver,
                policy: &self.policy,
                grading: &self.grading,
            }
        }

        fn session(&self, id: &str) -> Session {
            Session::new(
                self.resolver
                    .find_user(&UserId::parse(id).unwrap())
                    .unwrap()
                    .clone(),
            )
        }
    }

    fn user(id: &str, role: Role, dept: &str) -> User {
        User::new(UserId::parse(id).unwrap(), id, role, dept)
    }

    fn valid_okr(owner: &User) -> Okr {
        let mut okr = Okr::draft(owner, OkrLevel::Personal);
        okr.objectives.push(
            Objective::new("Reliability", 60.0)
                .with_key_result(KeyResult::new("99.9% uptime", 50.0))
                .with_key_result(KeyResult::new("MTTR < 1h", 50.0)),
        );
        okr.objectives
            .push(Objective::new("Growth", 40.0).with_key_result(KeyResult::new("Hire 2", 100.0)));
        okr
    }

    fn at(okr: &mut Okr, status: OkrStatus) {
        okr.lifecycle = Lifecycle::from_state(status, false);
    }

    #[test]
    fn test_weight_validation() {
        let org = Org::new();
        let owner = org.session("e1");

        let mut okr = valid_okr(&owner.actor);
        okr.objectives[1].weight = 30.0;
        let err = submit(&org.rules(), &owner, &mut okr).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::ObjectiveWeights(w)) if w == 90.0
        ));
        assert_eq!(okr.status(), OkrStatus::Draft);

        let mut okr = valid_okr(&owner.actor);
        okr.objectives[0].key_results[1].weight = 40.0;
        let err = submit(&org.rules(), &owner, &mut okr).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::KeyResultWeights { .. })
        ));

        let mut okr = valid_okr(&owner.actor);
        okr.objectives[1].key_results.clear();
        let err = submit(&org.rules(), &owner, &mut okr).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::NoKeyResults(_))
        ));
        assert!(okr.lifecycle.history().is_empty());
    }

    #[test]
    fn test_submit_routes_by_owner_role() {
        let org = Org::new();
        let owner = org.session("e1");
        let mut okr = valid_okr(&owner.actor);
        let t = submit(&org.rules(), &owner, &mut okr).unwrap();
        assert_eq!(t.to, OkrStatus::PendingL1Create);

        let vp = org.session("vp");
        let mut okr = valid_okr(&vp.actor);
        submit(&org.rules(), &vp, &mut okr).unwrap();
        assert_eq!(okr.status(), OkrStatus::Published);
    }

    #[test]
    fn test_only_owner_submits() {
        let org = Org::new();
        let mut okr = valid_okr(&org.session("e1").actor);
        let err = submit(&org.rules(), &org.session("h1"), &mut okr).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn test_creation_chain() {
        let org = Org::new();
        let mut okr = valid_okr(&org.session("e1").actor);
        submit(&org.rules(), &org.session("e1"), &mut okr).unwrap();

        approve_creation(&org.rules(), &org.session("h1"), &mut okr).unwrap();
        assert_eq!(okr.status(), OkrStatus::PendingL2Create);

        // L1 approver cannot also approve L2
        assert!(approve_creation(&org.rules(), &org.session("h1"), &mut okr).is_err());

        approve_creation(&org.rules(), &org.session("gm"), &mut okr).unwrap();
        assert_eq!(okr.status(), OkrStatus::Published);
        assert_eq!(okr.approvals.len(), 2);
    }

    #[test]
    fn test_reject_creation_discards_chain() {
        let org = Org::new();
        let mut okr = valid_okr(&org.session("e1").actor);
        submit(&org.rules(), &org.session("e1"), &mut okr).unwrap();
        approve_creation(&org.rules(), &org.session("h1"), &mut okr).unwrap();

        reject_creation(&org.rules(), &org.session("gm"), &mut okr, Some("rescope")).unwrap();
        assert_eq!(okr.status(), OkrStatus::Draft);
        assert!(okr.approvals.is_empty());
        assert_eq!(
            okr.lifecycle.history().last().unwrap().reason.as_deref(),
            Some("rescope")
        );
    }

    #[test]
    fn test_self_assessment_requires_comments() {
        let org = Org::new();
        let owner = org.session("e1");
        let mut okr = valid_okr(&owner.actor);
        at(&mut okr, OkrStatus::Published);

        let err = submit_self_assessment(&owner, &mut okr).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::MissingSelfComment(_))
        ));

        for objective in &mut okr.objectives {
            objective.self_comment = Some("done".into());
            for kr in &mut objective.key_results {
                kr.self_comment = Some("met".into());
                kr.self_score = Some(80.0);
            }
        }
        assert!(submit_self_assessment(&owner, &mut okr).is_err());

        okr.overall_self_assessment = Some(OverallAssessment {
            score: 0.0,
            comment: "Solid half".into(),
        });
        submit_self_assessment(&owner, &mut okr).unwrap();
        assert_eq!(okr.status(), OkrStatus::PendingL1Assess);
        assert_eq!(okr.overall_self_assessment.unwrap().score, 80.0);
    }

    #[test]
    fn test_l1_approval_requires_total_score() {
        let org = Org::new();
        let mut okr = valid_okr(&org.session("e1").actor);
        at(&mut okr, OkrStatus::PendingL1Assess);

        let err = approve_assessment(&org.rules(), &org.session("h1"), &mut okr).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::MissingTotalScore)
        ));

        okr.total_score = Some(88.0);
        approve_assessment(&org.rules(), &org.session("h1"), &mut okr).unwrap();
        assert_eq!(okr.status(), OkrStatus::PendingL2Assess);

        approve_assessment(&org.rules(), &org.session("gm"), &mut okr).unwrap();
        assert_eq!(okr.status(), OkrStatus::PendingArchive);
    }

    #[test]
    fn test_blank_reason_rejects_without_change() {
        let org = Org::new();
        let mut okr = valid_okr(&org.session("e1").actor);
        at(&mut okr, OkrStatus::PendingL2Assess);

        let err = reject_assessment(&org.rules(), &org.session("gm"), &mut okr, "   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(okr.status(), OkrStatus::PendingL2Assess);

        at(&mut okr, OkrStatus::PendingArchive);
        let err = veto(&org.rules(), &org.session("gm"), &mut okr, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(okr.status(), OkrStatus::PendingArchive);
    }

    #[test]
    fn test_reject_assessment_returns_to_l1() {
        let org = Org::new();
        let mut okr = valid_okr(&org.session("e1").actor);
        at(&mut okr, OkrStatus::PendingL2Assess);

        reject_assessment(&org.rules(), &org.session("gm"), &mut okr, "scores too generous").unwrap();
        assert_eq!(okr.status(), OkrStatus::PendingL1Assess);
        assert_eq!(okr.adjustment_reason(), Some("scores too generous"));
    }

    #[test]
    fn test_veto_requires_cross_level_role() {
        let org = Org::new();
        let mut okr = valid_okr(&org.session("e1").actor);
        at(&mut okr, OkrStatus::PendingArchive);

        // RD_EMPLOYEE approves nothing
        let err = veto(&org.rules(), &org.session("dev"), &mut okr, "no").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        veto(&org.rules(), &org.session("vp"), &mut okr, "recalibrate").unwrap();
        assert_eq!(okr.status(), OkrStatus::PendingL1Assess);
    }

    #[test]
    fn test_archive_and_lock() {
        let org = Org::new();
        let mut okr = valid_okr(&org.session("e1").actor);
        at(&mut okr, OkrStatus::PendingArchive);

        let err = archive(&org.rules(), &org.session("gm"), &mut okr).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        archive(&org.rules(), &org.session("hr"), &mut okr).unwrap();
        assert_eq!(okr.status(), OkrStatus::Published);
        assert!(okr.is_archived());

        let err = veto(&org.rules(), &org.session("vp"), &mut okr, "late").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lifecycle);
        let err = submit_self_assessment(&org.session("e1"), &mut okr).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lifecycle);
    }

    #[test]
    fn test_admin_revoke() {
        let org = Org::new();
        let mut okr = valid_okr(&org.session("e1").actor);

        let err = admin_revoke(&org.rules(), &org.session("admin"), &mut okr, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lifecycle);

        okr.lifecycle = Lifecycle::from_state(OkrStatus::Published, true);
        let err = admin_revoke(&org.rules(), &org.session("hr"), &mut okr, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        admin_revoke(&org.rules(), &org.session("admin"), &mut okr, Some("wrong period")).unwrap();
        assert_eq!(okr.status(), OkrStatus::Draft);
        assert!(!okr.is_archived());
        assert_eq!(
            okr.lifecycle.history().last().unwrap().reason.as_deref(),
            Some("FORCED: wrong period")
        );
    }

    #[test]
    fn test_scores_are_range_checked() {
        assert!(check_score("score", 100.0).is_ok());
        assert!(check_score("score", -0.5).is_err());
        assert!(check_score("score", f64::NAN).is_err());
        assert!(check_score("score", 100.1).is_err());
    }
}
