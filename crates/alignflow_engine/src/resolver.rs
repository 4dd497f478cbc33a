//! Approver resolution.
//!
//! Two questions are answered here:
//!
//! - which *roles* approve an OKR at each level ([`resolve_approvers`]), a
//!   pure registry lookup keyed by the owner's role;
//! - which *user* holds a role for a department
//!   ([`ApproverResolver::resolve_users`]), searching the department first
//!   and the whole organization second, using designated primary approvers
//!   to break ties.
//!
//! Ties with no designation are reported as [`ResolveError::Ambiguous`]; the
//! resolver never picks one user over another on its own.

use crate::model::{ApproverLevel, Okr, User};
use crate::registry::WorkflowRegistry;
use crate::role::Role;
use alignflow_ids::UserId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

// ============================================================================
// Role-level resolution
// ============================================================================

/// Approver roles for one OKR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApproverRoles {
    pub l1: Role,
    pub l2: Option<Role>,
    pub l3: Option<Role>,
    pub cc: Vec<Role>,
}

impl ApproverRoles {
    pub fn at(&self, level: ApproverLevel) -> Option<&Role> {
        match level {
            ApproverLevel::L1 => Some(&self.l1),
            ApproverLevel::L2 => self.l2.as_ref(),
            ApproverLevel::L3 => self.l3.as_ref(),
        }
    }

    /// Level `role` holds in this chain, lowest first.
    pub fn level_of(&self, role: &Role) -> Option<ApproverLevel> {
        [ApproverLevel::L1, ApproverLevel::L2, ApproverLevel::L3]
            .into_iter()
            .find(|level| self.at(*level) == Some(role))
    }
}

/// Approver roles for a given owner role.
pub fn resolve_approvers_for_role(registry: &WorkflowRegistry, owner_role: &Role) -> ApproverRoles {
    let wf = registry.get_workflow(owner_role);
    ApproverRoles {
        l1: wf.approver_role_l1,
        l2: wf.approver_role_l2,
        l3: wf.approver_role_l3,
        cc: wf.cc_roles,
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Where a candidate search ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Department,
    Global,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Department => f.write_str("department"),
            Scope::Global => f.write_str("organization"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(
        "{} users hold role {role} in {scope} scope ({department}) and none is designated primary approver",
        candidates.len()
    )]
    Ambiguous {
        role: Role,
        department: String,
        scope: Scope,
        candidates: Vec<UserId>,
    },

    #[error("no user holds role {role} (searched {department} and the whole organization)")]
    NotFound { role: Role, department: String },

    #[error("OKR owner {0} is not in the user directory")]
    UnknownOwner(UserId),
}

// ============================================================================
// Designated primary approvers
// ============================================================================

/// Explicit `(department, role) -> user` designations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryApprovers {
    designations: BTreeMap<(String, Role), UserId>,
    conflicts: BTreeMap<(String, Role), Vec<UserId>>,
}

impl PrimaryApprovers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive designations from users' `is_primary_approver` flags.
    ///
    /// Two flagged users on the same key designate nobody; the key is kept
    /// in [`conflicts`](Self::conflicts).
    pub fn from_users(users: &[User]) -> Self {
        let mut flagged: BTreeMap<(String, Role), Vec<UserId>> = BTreeMap::new();
        for user in users.iter().filter(|u| u.is_primary_approver) {
            flagged
                .entry((user.department.clone(), user.role.clone()))
                .or_default()
                .push(user.id.clone());
        }

        let mut relation = Self::new();
        for (key, mut ids) in flagged {
            if ids.len() == 1 {
                if let Some(id) = ids.pop() {
                    relation.designations.insert(key, id);
                }
            } else {
                warn!(
                    "{} users flagged primary for {} in {}; no designation made",
                    ids.len(),
                    key.1,
                    key.0
                );
                relation.conflicts.insert(key, ids);
            }
        }
        relation
    }

    /// Designate `user` for `(department, role)`, replacing any prior holder.
    pub fn designate(&mut self, department: &str, role: Role, user: UserId) -> Option<UserId> {
        let key = (department.to_string(), role);
        self.conflicts.remove(&key);
        self.designations.insert(key, user)
    }

    pub fn revoke(&mut self, department: &str, role: &Role) -> Option<UserId> {
        self.designations
            .remove(&(department.to_string(), role.clone()))
    }

    pub fn get(&self, department: &str, role: &Role) -> Option<&UserId> {
        self.designations.get(&(department.to_string(), role.clone()))
    }

    /// Holds any designation in `department`.
    pub fn is_department_primary(&self, department: &str, user: &UserId) -> bool {
        self.designations
            .iter()
            .any(|((dept, _), holder)| dept == department && holder == user)
    }

    /// Designations for `role` across all departments.
    pub fn for_role<'a>(&'a self, role: &'a Role) -> impl Iterator<Item = &'a UserId> + 'a {
        self.designations
            .iter()
            .filter(move |((_, r), _)| r == role)
            .map(|(_, id)| id)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = (&(String, Role), &Vec<UserId>)> {
        self.conflicts.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(String, Role), &UserId)> {
        self.designations.iter()
    }
}

// ============================================================================
// User-level resolution
// ============================================================================

/// A user resolved for a role.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedApprover {
    pub user: User,
    pub scope: Scope,
    /// Chosen through a primary designation among several candidates
    pub designated: bool,
    pub candidates: Vec<UserId>,
}

/// Who heads a department for reporting purposes.
#[derive(Debug, Clone, PartialEq)]
pub enum TeamResponsible {
    Resolved(User),
    Ambiguous(Vec<User>),
    Unconfigured,
}

/// Resolver over one directory snapshot.
#[derive(Debug, Clone)]
pub struct ApproverResolver {
    users: Vec<User>,
    primaries: PrimaryApprovers,
}

impl ApproverResolver {
    /// Snapshot of `users`, with designations derived from their flags.
    pub fn new(users: Vec<User>) -> Self {
        let primaries = PrimaryApprovers::from_users(&users);
        Self { users, primaries }
    }

    /// Snapshot with explicit designations layered over the flags.
    pub fn with_designations(users: Vec<User>, explicit: &PrimaryApprovers) -> Self {
        let mut resolver = Self::new(users);
        for ((department, role), user) in explicit.iter() {
            resolver
                .primaries
                .designate(department, role.clone(), user.clone());
        }
        resolver
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn primaries(&self) -> &PrimaryApprovers {
        &self.primaries
    }

    pub fn find_user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }

    /// Approver roles for `okr`, keyed by its owner's current role.
    pub fn resolve_approvers(
        &self,
        registry: &WorkflowRegistry,
        okr: &Okr,
    ) -> Result<ApproverRoles, ResolveError> {
        let owner = self
            .find_user(&okr.user_id)
            .ok_or_else(|| ResolveError::UnknownOwner(okr.user_id.clone()))?;
        Ok(resolve_approvers_for_role(registry, &owner.role))
    }

    /// Concrete user holding `role` for `department`.
    pub fn resolve_users(&self, role: &Role, department: &str) -> Result<ResolvedApprover, ResolveError> {
        let local: Vec<&User> = self
            .users
            .iter()
            .filter(|u| &u.role == role && u.department == department)
            .collect();

        if !local.is_empty() {
            return self.pick(role, department, Scope::Department, local);
        }

        let global: Vec<&User> = self.users.iter().filter(|u| &u.role == role).collect();
        if global.is_empty() {
            return Err(ResolveError::NotFound {
                role: role.clone(),
                department: department.to_string(),
            });
        }
        self.pick(role, department, Scope::Global, global)
    }

    fn pick(
        &self,
        role: &Role,
        department: &str,
        scope: Scope,
        candidates: Vec<&User>,
    ) -> Result<ResolvedApprover, ResolveError> {
        let ids: Vec<UserId> = candidates.iter().map(|u| u.id.clone()).collect();

        if let [only] = candidates.as_slice() {
            return Ok(ResolvedApprover {
                user: (*only).clone(),
                scope,
                designated: false,
                candidates: ids,
            });
        }

        let designated: Vec<&User> = match scope {
            Scope::Department => self
                .primaries
                .get(department, role)
                .and_then(|id| candidates.iter().copied().find(|u| &u.id == id))
                .into_iter()
                .collect(),
            Scope::Global => {
                let conflicting = self
                    .primaries
                    .conflicts()
                    .filter(|((_, r), _)| r == role)
                    .flat_map(|(_, ids)| ids.iter());
                let mut found: Vec<&User> = Vec::new();
                for id in self.primaries.for_role(role).chain(conflicting) {
                    if let Some(user) = candidates.iter().copied().find(|u| &u.id == id) {
                        if !found.iter().any(|f| f.id == user.id) {
                            found.push(user);
                        }
                    }
                }
                found
            }
        };

        match designated.as_slice() {
            [chosen] => {
                debug!(
                    "Resolved {} for {} via primary designation: {}",
                    role, department, chosen.id
                );
                Ok(ResolvedApprover {
                    user: (*chosen).clone(),
                    scope,
                    designated: true,
                    candidates: ids,
                })
            }
            _ => {
                warn!(
                    "Ambiguous approver: {} users hold {} in {} scope for {}",
                    ids.len(),
                    role,
                    scope,
                    department
                );
                Err(ResolveError::Ambiguous {
                    role: role.clone(),
                    department: department.to_string(),
                    scope,
                    candidates: ids,
                })
            }
        }
    }

    /// Highest-seniority user of `department`, for "who owns this team" views.
    pub fn team_responsible(&self, department: &str) -> TeamResponsible {
        let members: Vec<&User> = self
            .users
            .iter()
            .filter(|u| u.department == department && u.role.seniority().rank() > 0)
            .collect();

        let Some(top) = members.iter().map(|u| u.role.seniority()).max() else {
            return TeamResponsible::Unconfigured;
        };

        let leaders: Vec<&User> = members
            .into_iter()
            .filter(|u| u.role.seniority() == top)
            .collect();

        if let [only] = leaders.as_slice() {
            return TeamResponsible::Resolved((*only).clone());
        }

        let designated: Vec<&User> = leaders
            .iter()
            .copied()
            .filter(|u| self.primaries.is_department_primary(department, &u.id))
            .collect();

        match designated.as_slice() {
            [chosen] => TeamResponsible::Resolved((*chosen).clone()),
            _ => TeamResponsible::Ambiguous(leaders.into_iter().cloned().collect()),
        }
    }
}
