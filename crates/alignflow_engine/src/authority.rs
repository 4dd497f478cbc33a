//! Who may act on an OKR at its current stage.
//!
//! The stage approver is a concrete user: the one [`ApproverResolver`]
//! resolves for the stage role in the OKR's department. Holding the role is
//! not enough when resolution lands on someone else, and an ambiguous or
//! empty resolution blocks the stage instead of guessing.

use crate::error::{AuthorizationError, EngineError, Result};
use crate::model::{ApprovalStage, ApproverLevel, Okr, OkrLevel, User};
use crate::registry::WorkflowRegistry;
use crate::resolver::{ApproverResolver, ApproverRoles};
use crate::role::RolePolicy;
use crate::scoring::GradeBands;
use tracing::debug;

/// Read-only organization state every rule is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Rules<'a> {
    pub registry: &'a WorkflowRegistry,
    pub resolver: &'a ApproverResolver,
    pub policy: &'a RolePolicy,
    pub grading: &'a GradeBands,
}

impl<'a> Rules<'a> {
    pub fn approver_roles(&self, okr: &Okr) -> Result<ApproverRoles> {
        Ok(self.resolver.resolve_approvers(self.registry, okr)?)
    }
}

/// Why an actor may act at a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageAuthority {
    /// The resolved approver for the stage
    Resolved(ApproverLevel),
    /// Administrative override at creation stages
    Admin,
    /// Department primary approver at first-level assessment
    DepartmentPrimary,
    /// Top executive shortcut; assessment goes straight to archive
    TopExecutive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageGrant {
    pub stage: ApprovalStage,
    pub authority: StageAuthority,
}

fn deny(actor: &User, action: &'static str, okr: &Okr, reason: impl Into<String>) -> EngineError {
    AuthorizationError::new(&actor.id, action, &okr.id, reason).into()
}

/// Authority of `actor` over the stage `okr` currently waits on.
pub fn authorize_stage(rules: &Rules<'_>, actor: &User, okr: &Okr, action: &'static str) -> Result<StageGrant> {
    let stage = ApprovalStage::for_status(okr.status())
        .ok_or_else(|| EngineError::wrong_status(action, okr.status()))?;

    if okr.is_owned_by(actor) {
        return Err(deny(actor, action, okr, "owners cannot act on their own OKR"));
    }

    let roles = rules.approver_roles(okr)?;
    let level = stage.level();
    let required = roles.at(level).ok_or_else(|| {
        deny(
            actor,
            action,
            okr,
            format!("no {} approver role is configured for {}", level, okr.user_name),
        )
    })?;

    let grant = |authority| StageGrant { stage, authority };

    if stage.is_creation() && rules.policy.is_admin(&actor.role) {
        return Ok(grant(StageAuthority::Admin));
    }
    if stage == ApprovalStage::L1Assess
        && rules
            .resolver
            .primaries()
            .is_department_primary(&okr.department, &actor.id)
    {
        return Ok(grant(StageAuthority::DepartmentPrimary));
    }
    if !stage.is_creation()
        && rules.policy.is_top_executive(&actor.role)
        && (&actor.role == required || okr.level == OkrLevel::Department)
    {
        return Ok(grant(StageAuthority::TopExecutive));
    }

    if &actor.role != required {
        return Err(deny(
            actor,
            action,
            okr,
            format!("{} approval requires role {}", level, required),
        ));
    }

    let resolved = rules.resolver.resolve_users(required, &okr.department)?;
    if resolved.user.id != actor.id {
        return Err(deny(
            actor,
            action,
            okr,
            format!("{} approver for {} is {}", level, okr.department, resolved.user.id),
        ));
    }

    debug!("{} authorized as {} for OKR {}", actor.id, level, okr.id);
    Ok(grant(StageAuthority::Resolved(level)))
}

/// Non-erroring form of [`authorize_stage`] for queries.
pub fn can_act_on_stage(rules: &Rules<'_>, actor: &User, okr: &Okr) -> bool {
    authorize_stage(rules, actor, okr, "review").is_ok()
}

/// May `actor` leave advisory feedback on `okr` now.
pub fn can_give_feedback(rules: &Rules<'_>, actor: &User, okr: &Okr) -> bool {
    let status = okr.status();
    if okr.is_archived()
        || okr.is_owned_by(actor)
        || !(status.is_creation_pending() || status.is_assessment_pending())
    {
        return false;
    }
    if okr.peer_reviewers.contains(&actor.id) {
        return true;
    }
    rules
        .approver_roles(okr)
        .map(|roles| roles.cc.contains(&actor.role))
        .unwrap_or(false)
}

/// Veto right: an L2/L3 role anywhere in the registry.
pub fn can_veto(rules: &Rules<'_>, actor: &User, okr: &Okr) -> bool {
    !okr.is_owned_by(actor) && rules.registry.is_cross_level_approver(&actor.role)
}

pub fn can_archive(rules: &Rules<'_>, actor: &User) -> bool {
    rules.policy.can_archive(&actor.role)
}

pub fn is_admin(rules: &Rules<'_>, actor: &User) -> bool {
    rules.policy.is_admin(&actor.role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::role::Role;
    use alignflow_ids::UserId;
    use alignflow_lifecycle::{Lifecycle, OkrStatus};

    fn user(id: &str, role: Role, dept: &str) -> User {
        User::new(UserId::parse(id).unwrap(), id, role, dept)
    }

    struct Fixture {
        registry: WorkflowRegistry,
        resolver: ApproverResolver,
        policy: RolePolicy,
        grading: GradeBands,
    }

    impl Fixture {
        fn new(users: Vec<User>) -> Self {
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

        fn user(&self, id: &str) -> User {
            self.resolver
                .find_user(&UserId::parse(id).unwrap())
                .unwrap()
                .clone()
        }
    }

    fn okr_at(owner: &User, status: OkrStatus) -> Okr {
        let mut okr = Okr::draft(owner, OkrLevel::Personal);
        okr.lifecycle = Lifecycle::from_state(status, false);
        okr
    }

    fn team() -> Fixture {
        Fixture::new(vec![
            user("e1", Role::RdEmployee, "Crypto"),
            user("h1", Role::TechHead, "Crypto"),
            user("gm", Role::TechGm, "R&D"),
            user("admin", Role::Admin, "HQ"),
            user("boss", Role::President, "HQ"),
            user("hr", Role::Hrbp, "HQ"),
        ])
    }

    #[test]
    fn test_resolved_l1_and_l2() {
        let fx = team();
        let e1 = fx.user("e1");

        let okr = okr_at(&e1, OkrStatus::PendingL1Create);
        let grant = authorize_stage(&fx.rules(), &fx.user("h1"), &okr, "approve").unwrap();
        assert_eq!(grant.authority, StageAuthority::Resolved(ApproverLevel::L1));

        let okr = okr_at(&e1, OkrStatus::PendingL2Assess);
        let grant = authorize_stage(&fx.rules(), &fx.user("gm"), &okr, "approve").unwrap();
        assert_eq!(grant.authority, StageAuthority::Resolved(ApproverLevel::L2));
    }

    #[test]
    fn test_wrong_role_is_authorization_error() {
        let fx = team();
        let okr = okr_at(&fx.user("e1"), OkrStatus::PendingL1Create);
        let err = authorize_stage(&fx.rules(), &fx.user("gm"), &okr, "approve").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn test_owner_cannot_act() {
        let fx = team();
        let h1 = fx.user("h1");
        let okr = okr_at(&h1, OkrStatus::PendingL1Assess);
        let err = authorize_stage(&fx.rules(), &h1, &okr, "approve").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn test_ambiguity_blocks_role_holder() {
        let fx = Fixture::new(vec![
            user("e1", Role::RdEmployee, "Crypto"),
            user("h1", Role::TechHead, "Crypto"),
            user("h2", Role::TechHead, "Crypto"),
        ]);
        let okr = okr_at(&fx.user("e1"), OkrStatus::PendingL1Create);
        let err = authorize_stage(&fx.rules(), &fx.user("h1"), &okr, "approve").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousApprover);
    }

    #[test]
    fn test_admin_override_only_at_creation() {
        let fx = team();
        let e1 = fx.user("e1");
        let admin = fx.user("admin");

        let okr = okr_at(&e1, OkrStatus::PendingL2Create);
        let grant = authorize_stage(&fx.rules(), &admin, &okr, "approve").unwrap();
        assert_eq!(grant.authority, StageAuthority::Admin);

        let okr = okr_at(&e1, OkrStatus::PendingL1Assess);
        assert!(authorize_stage(&fx.rules(), &admin, &okr, "approve").is_err());
    }

    #[test]
    fn test_department_primary_at_l1_assess() {
        let fx = Fixture::new(vec![
            user("e1", Role::RdEmployee, "Crypto"),
            user("h1", Role::TechHead, "Crypto"),
            user("m1", Role::TechManager, "Crypto").primary(),
        ]);
        let e1 = fx.user("e1");
        let m1 = fx.user("m1");

        let okr = okr_at(&e1, OkrStatus::PendingL1Assess);
        let grant = authorize_stage(&fx.rules(), &m1, &okr, "approve").unwrap();
        assert_eq!(grant.authority, StageAuthority::DepartmentPrimary);

        let okr = okr_at(&e1, OkrStatus::PendingL1Create);
        assert!(authorize_stage(&fx.rules(), &m1, &okr, "approve").is_err());
    }

    #[test]
    fn test_top_executive_shortcut() {
        let fx = team();
        let boss = fx.user("boss");
        let mut okr = okr_at(&fx.user("e1"), OkrStatus::PendingL1Assess);
        assert!(authorize_stage(&fx.rules(), &boss, &okr, "approve").is_err());

        okr.level = OkrLevel::Department;
        let grant = authorize_stage(&fx.rules(), &boss, &okr, "approve").unwrap();
        assert_eq!(grant.authority, StageAuthority::TopExecutive);
    }

    #[test]
    fn test_not_pending_is_lifecycle_error() {
        let fx = team();
        let okr = okr_at(&fx.user("e1"), OkrStatus::Published);
        let err = authorize_stage(&fx.rules(), &fx.user("h1"), &okr, "approve").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lifecycle);
    }

    #[test]
    fn test_feedback_rights() {
        let fx = Fixture::new(vec![
            user("e1", Role::RdEmployee, "Crypto"),
            user("tm", Role::TechManager, "Crypto"),
            user("peer", Role::RdEmployee, "Crypto"),
            user("qa", Role::QaManager, "Crypto"),
        ]);
        let e1 = fx.user("e1");
        let mut okr = okr_at(&e1, OkrStatus::PendingL1Create);
        okr.peer_reviewers.push(fx.user("peer").id);

        assert!(can_give_feedback(&fx.rules(), &fx.user("tm"), &okr));
        assert!(can_give_feedback(&fx.rules(), &fx.user("peer"), &okr));
        assert!(!can_give_feedback(&fx.rules(), &fx.user("qa"), &okr));
        assert!(!can_give_feedback(&fx.rules(), &e1, &okr));

        okr.lifecycle = Lifecycle::from_state(OkrStatus::Published, false);
        assert!(!can_give_feedback(&fx.rules(), &fx.user("tm"), &okr));
    }
}
