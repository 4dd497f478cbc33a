//! Workflow registry: owner role -> approver roles per stage.
//!
//! Every role has an approval path. Roles without an explicit entry get a
//! synthetic fallback whose only approver is the configured fallback role.
//! The cadre predicates are computed from the current entries on every call.

use crate::model::ApproverLevel;
use crate::role::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Approval chain for one target role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    pub target_role: Role,
    pub approver_role_l1: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_role_l2: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_role_l3: Option<Role>,
    /// Invited to comment, never gate a transition
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc_roles: Vec<Role>,
}

impl ApprovalWorkflow {
    pub fn new(target_role: Role, l1: Role) -> Self {
        Self {
            target_role,
            approver_role_l1: l1,
            approver_role_l2: None,
            approver_role_l3: None,
            cc_roles: Vec::new(),
        }
    }

    pub fn with_l2(mut self, role: Role) -> Self {
        self.approver_role_l2 = Some(role);
        self
    }

    pub fn with_l3(mut self, role: Role) -> Self {
        self.approver_role_l3 = Some(role);
        self
    }

    pub fn with_cc(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.cc_roles.extend(roles);
        self
    }

    pub fn approver(&self, level: ApproverLevel) -> Option<&Role> {
        match level {
            ApproverLevel::L1 => Some(&self.approver_role_l1),
            ApproverLevel::L2 => self.approver_role_l2.as_ref(),
            ApproverLevel::L3 => self.approver_role_l3.as_ref(),
        }
    }
}

/// Error raised when building a registry from a list with duplicates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate workflow entry for role {0}")]
pub struct DuplicateWorkflow(pub Role);

/// Role-keyed workflow table with a default fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRegistry {
    entries: BTreeMap<Role, ApprovalWorkflow>,
    fallback_approver: Role,
}

impl WorkflowRegistry {
    /// Empty registry: every role falls back.
    pub fn new(fallback_approver: Role) -> Self {
        Self {
            entries: BTreeMap::new(),
            fallback_approver,
        }
    }

    /// Build from a list, rejecting two entries for the same role.
    pub fn from_entries(
        entries: impl IntoIterator<Item = ApprovalWorkflow>,
        fallback_approver: Role,
    ) -> Result<Self, DuplicateWorkflow> {
        let mut registry = Self::new(fallback_approver);
        for entry in entries {
            if registry.entries.contains_key(&entry.target_role) {
                return Err(DuplicateWorkflow(entry.target_role));
            }
            registry.entries.insert(entry.target_role.clone(), entry);
        }
        Ok(registry)
    }

    /// The shipped organization chart.
    pub fn with_defaults(fallback_approver: Role) -> Self {
        let mut registry = Self::new(fallback_approver);
        for entry in default_workflows() {
            registry.upsert(entry);
        }
        registry
    }

    pub fn fallback_approver(&self) -> &Role {
        &self.fallback_approver
    }

    /// Workflow for `role`, or the synthetic fallback.
    pub fn get_workflow(&self, role: &Role) -> ApprovalWorkflow {
        self.entries
            .get(role)
            .cloned()
            .unwrap_or_else(|| ApprovalWorkflow::new(role.clone(), self.fallback_approver.clone()))
    }

    /// Explicit entry only.
    pub fn entry(&self, role: &Role) -> Option<&ApprovalWorkflow> {
        self.entries.get(role)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ApprovalWorkflow> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace the entry for its target role.
    pub fn upsert(&mut self, workflow: ApprovalWorkflow) -> Option<ApprovalWorkflow> {
        self.entries.insert(workflow.target_role.clone(), workflow)
    }

    pub fn remove(&mut self, role: &Role) -> Option<ApprovalWorkflow> {
        self.entries.remove(role)
    }

    /// Referential cleanup after a role definition is deleted.
    ///
    /// Drops the role's own entry and any entry it was the L1 approver of,
    /// and clears it from L2/L3/cc positions elsewhere. Returns the number of
    /// entries touched.
    pub fn remove_role(&mut self, role: &Role) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|target, wf| target != role && &wf.approver_role_l1 != role);
        let mut touched = before - self.entries.len();

        for wf in self.entries.values_mut() {
            let mut changed = false;
            if wf.approver_role_l2.as_ref() == Some(role) {
                // L3 moves up so the chain stays contiguous
                wf.approver_role_l2 = wf.approver_role_l3.take();
                changed = true;
            }
            if wf.approver_role_l3.as_ref() == Some(role) {
                wf.approver_role_l3 = None;
                changed = true;
            }
            let cc_before = wf.cc_roles.len();
            wf.cc_roles.retain(|r| r != role);
            changed |= wf.cc_roles.len() != cc_before;
            if changed {
                touched += 1;
            }
        }
        touched
    }

    // ------------------------------------------------------------------------
    // Hierarchy predicates
    // ------------------------------------------------------------------------

    /// Manager/cadre: L1 or L2 approver in some entry.
    pub fn is_cadre(&self, role: &Role) -> bool {
        self.entries.values().any(|wf| {
            &wf.approver_role_l1 == role || wf.approver_role_l2.as_ref() == Some(role)
        })
    }

    /// L2 or L3 approver in some entry. Carries the veto right.
    pub fn is_cross_level_approver(&self, role: &Role) -> bool {
        self.entries.values().any(|wf| {
            wf.approver_role_l2.as_ref() == Some(role) || wf.approver_role_l3.as_ref() == Some(role)
        })
    }

    /// Approver at any level of some entry.
    pub fn is_approver(&self, role: &Role) -> bool {
        self.entries.values().any(|wf| {
            [ApproverLevel::L1, ApproverLevel::L2, ApproverLevel::L3]
                .iter()
                .any(|level| wf.approver(*level) == Some(role))
        })
    }

    /// Approves some workflow whose target role is itself a cadre.
    pub fn can_assess_leaders(&self, role: &Role) -> bool {
        self.entries.values().any(|wf| {
            let approves = [ApproverLevel::L1, ApproverLevel::L2, ApproverLevel::L3]
                .iter()
                .any(|level| wf.approver(*level) == Some(role));
            approves && self.is_cadre(&wf.target_role)
        })
    }
}

/// Default workflow table.
pub fn default_workflows() -> Vec<ApprovalWorkflow> {
    use Role::*;
    vec![
        ApprovalWorkflow::new(ProductEmployee, BusinessHead).with_l2(ProductGm),
        ApprovalWorkflow::new(RdEmployee, TechHead)
            .with_l2(TechGm)
            .with_cc([TechManager]),
        ApprovalWorkflow::new(QaEmployee, TechHead)
            .with_l2(TechGm)
            .with_cc([QaManager, QaHead]),
        ApprovalWorkflow::new(ProjectManager, TechHead).with_l2(QualityGm),
        ApprovalWorkflow::new(QaHead, TechGm).with_cc([TechHead]),
        ApprovalWorkflow::new(TechManager, TechHead).with_l2(TechGm),
        ApprovalWorkflow::new(BusinessHead, ProductGm).with_l2(VpProduct),
        ApprovalWorkflow::new(TechHead, TechGm).with_l2(VpTech),
        ApprovalWorkflow::new(VpTech, President),
        ApprovalWorkflow::new(VpProduct, President),
        ApprovalWorkflow::new(VpMarket, President),
        ApprovalWorkflow::new(QualityGm, VpProduct),
        ApprovalWorkflow::new(ProjectDeptGm, VpMarket),
        ApprovalWorkflow::new(ProductGm, VpProduct),
        ApprovalWorkflow::new(TechGm, VpTech),
        ApprovalWorkflow::new(Hrbp, President),
        ApprovalWorkflow::new(TechExpert, GeneralOfficeDirector),
        ApprovalWorkflow::new(GeneralOfficeDirector, VpTech),
        ApprovalWorkflow::new(Employee, Hrbp),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> WorkflowRegistry {
        WorkflowRegistry::with_defaults(Role::Hrbp)
    }

    #[test]
    fn test_explicit_entry() {
        let wf = registry().get_workflow(&Role::RdEmployee);
        assert_eq!(wf.approver_role_l1, Role::TechHead);
        assert_eq!(wf.approver_role_l2, Some(Role::TechGm));
        assert_eq!(wf.approver_role_l3, None);
        assert_eq!(wf.cc_roles, vec![Role::TechManager]);
    }

    #[test]
    fn test_fallback_for_unknown_role() {
        let role = Role::Custom("DATA_STEWARD".into());
        let wf = registry().get_workflow(&role);
        assert_eq!(wf.target_role, role);
        assert_eq!(wf.approver_role_l1, Role::Hrbp);
        assert!(wf.approver_role_l2.is_none());
        assert!(wf.cc_roles.is_empty());
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let result = WorkflowRegistry::from_entries(
            vec![
                ApprovalWorkflow::new(Role::TechExpert, Role::TechHead),
                ApprovalWorkflow::new(Role::TechExpert, Role::TechGm),
            ],
            Role::Hrbp,
        );
        assert_eq!(result, Err(DuplicateWorkflow(Role::TechExpert)));
    }

    #[test]
    fn test_upsert_replaces() {
        let mut reg = registry();
        let count = reg.len();
        reg.upsert(ApprovalWorkflow::new(Role::TechExpert, Role::TechGm));
        assert_eq!(reg.len(), count);
        assert_eq!(
            reg.get_workflow(&Role::TechExpert).approver_role_l1,
            Role::TechGm
        );
    }

    #[test]
    fn test_cadre_predicates() {
        let reg = registry();
        assert!(reg.is_cadre(&Role::TechHead));
        assert!(reg.is_cadre(&Role::TechGm));
        assert!(!reg.is_cadre(&Role::RdEmployee));
        assert!(!reg.is_cadre(&Role::TechManager));

        assert!(reg.is_cross_level_approver(&Role::TechGm));
        assert!(reg.is_cross_level_approver(&Role::VpTech));
        assert!(!reg.is_cross_level_approver(&Role::TechHead));
        assert!(!reg.is_cross_level_approver(&Role::President));

        assert!(reg.is_approver(&Role::President));
        assert!(!reg.is_approver(&Role::QaEmployee));
    }

    #[test]
    fn test_can_assess_leaders() {
        let reg = registry();
        // TECH_GM approves TECH_HEAD, itself a cadre
        assert!(reg.can_assess_leaders(&Role::TechGm));
        // BUSINESS_HEAD only approves PRODUCT_EMPLOYEE
        assert!(!reg.can_assess_leaders(&Role::BusinessHead));
    }

    #[test]
    fn test_predicates_follow_registry_changes() {
        let mut reg = registry();
        assert!(reg.is_cadre(&Role::GeneralOfficeDirector));
        reg.remove(&Role::TechExpert);
        assert!(!reg.is_cadre(&Role::GeneralOfficeDirector));
    }

    #[test]
    fn test_remove_role_cleans_references() {
        let mut reg = registry();
        reg.upsert(
            ApprovalWorkflow::new(Role::TechManager, Role::TechHead)
                .with_l2(Role::TechGm)
                .with_l3(Role::VpTech),
        );
        let touched = reg.remove_role(&Role::TechGm);
        assert!(touched > 0);

        assert!(reg.entry(&Role::TechGm).is_none());
        // QA_HEAD had TECH_GM as L1: now falls back
        assert!(reg.entry(&Role::QaHead).is_none());
        assert_eq!(
            reg.get_workflow(&Role::QaHead).approver_role_l1,
            Role::Hrbp
        );
        let tm = reg.get_workflow(&Role::TechManager);
        assert_eq!(tm.approver_role_l2, Some(Role::VpTech));
        assert_eq!(tm.approver_role_l3, None);
        assert!(!reg.is_approver(&Role::TechGm));
    }
}
