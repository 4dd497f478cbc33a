//! Organizational roles.
//!
//! Roles are a closed set of built-in variants plus `Custom` keys defined in
//! a [`RoleCatalog`]. The wire form of every role is its SCREAMING_SNAKE key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Error when parsing or registering a role key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleParseError {
    #[error("role key is empty")]
    Empty,

    #[error("invalid role key '{0}': only A-Z, 0-9 and '_' are allowed")]
    InvalidKey(String),

    #[error("role key '{0}' is built in and cannot be redefined")]
    BuiltIn(String),
}

/// An organizational role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Employee,
    RdEmployee,
    QaEmployee,
    QaManager,
    ProductEmployee,
    ProjectManager,
    TechManager,
    TechExpert,
    GeneralOfficeDirector,
    Hrbp,
    BusinessHead,
    TechHead,
    QaHead,
    ProductGm,
    TechGm,
    QualityGm,
    ProjectDeptGm,
    VpProduct,
    VpTech,
    VpMarket,
    President,
    Admin,
    /// Role defined at runtime through the catalog
    Custom(String),
}

pub static BUILT_IN_ROLES: [Role; 22] = [
    Role::Employee,
    Role::RdEmployee,
    Role::QaEmployee,
    Role::QaManager,
    Role::ProductEmployee,
    Role::ProjectManager,
    Role::TechManager,
    Role::TechExpert,
    Role::GeneralOfficeDirector,
    Role::Hrbp,
    Role::BusinessHead,
    Role::TechHead,
    Role::QaHead,
    Role::ProductGm,
    Role::TechGm,
    Role::QualityGm,
    Role::ProjectDeptGm,
    Role::VpProduct,
    Role::VpTech,
    Role::VpMarket,
    Role::President,
    Role::Admin,
];

impl Role {
    /// Canonical key.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Employee => "EMPLOYEE",
            Role::RdEmployee => "RD_EMPLOYEE",
            Role::QaEmployee => "QA_EMPLOYEE",
            Role::QaManager => "QA_MANAGER",
            Role::ProductEmployee => "PRODUCT_EMPLOYEE",
            Role::ProjectManager => "PROJECT_MANAGER",
            Role::TechManager => "TECH_MANAGER",
            Role::TechExpert => "TECH_EXPERT",
            Role::GeneralOfficeDirector => "GENERAL_OFFICE_DIRECTOR",
            Role::Hrbp => "HRBP",
            Role::BusinessHead => "BUSINESS_HEAD",
            Role::TechHead => "TECH_HEAD",
            Role::QaHead => "QA_HEAD",
            Role::ProductGm => "PRODUCT_GM",
            Role::TechGm => "TECH_GM",
            Role::QualityGm => "QUALITY_GM",
            Role::ProjectDeptGm => "PROJECT_DEPT_GM",
            Role::VpProduct => "VP_PRODUCT",
            Role::VpTech => "VP_TECH",
            Role::VpMarket => "VP_MARKET",
            Role::President => "PRESIDENT",
            Role::Admin => "ADMIN",
            Role::Custom(key) => key,
        }
    }

    /// Default display label. Custom roles fall back to their key; use
    /// [`RoleCatalog::label`] to get the configured label.
    pub fn default_label(&self) -> &str {
        match self {
            Role::Employee => "Employee",
            Role::RdEmployee => "R&D Engineer",
            Role::QaEmployee => "QA Engineer",
            Role::QaManager => "QA Lead",
            Role::ProductEmployee => "Product Specialist",
            Role::ProjectManager => "Project Manager",
            Role::TechManager => "Tech Manager",
            Role::TechExpert => "Tech Expert",
            Role::GeneralOfficeDirector => "General Office Director",
            Role::Hrbp => "HRBP",
            Role::BusinessHead => "Business Head",
            Role::TechHead => "R&D Head",
            Role::QaHead => "QA Department Head",
            Role::ProductGm => "Product GM",
            Role::TechGm => "R&D GM",
            Role::QualityGm => "Quality GM",
            Role::ProjectDeptGm => "Project Dept GM",
            Role::VpProduct => "VP Product",
            Role::VpTech => "VP Technology",
            Role::VpMarket => "VP Market",
            Role::President => "President",
            Role::Admin => "Administrator",
            Role::Custom(key) => key,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Role::Custom(_))
    }

    /// Seniority tier used for "who heads this team" summaries.
    pub fn seniority(&self) -> SeniorityTier {
        match self {
            Role::President => SeniorityTier::President,
            Role::VpProduct | Role::VpTech | Role::VpMarket => SeniorityTier::VicePresident,
            Role::ProductGm
            | Role::TechGm
            | Role::QualityGm
            | Role::ProjectDeptGm
            | Role::GeneralOfficeDirector => SeniorityTier::GeneralManager,
            Role::BusinessHead | Role::TechHead | Role::QaHead => SeniorityTier::DepartmentHead,
            Role::QaManager | Role::TechManager => SeniorityTier::TeamManager,
            Role::ProjectManager => SeniorityTier::ProjectLead,
            _ => SeniorityTier::IndividualContributor,
        }
    }
}

fn normalize_key(value: &str) -> Result<String, RoleParseError> {
    let key = value.trim().to_ascii_uppercase();
    if key.is_empty() {
        return Err(RoleParseError::Empty);
    }
    if !key
        .chars()
        .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_')
    {
        return Err(RoleParseError::InvalidKey(value.trim().to_string()));
    }
    Ok(key)
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_key(s)?;
        Ok(BUILT_IN_ROLES
            .iter()
            .find(|role| role.as_str() == key)
            .cloned()
            .unwrap_or(Role::Custom(key)))
    }
}

impl TryFrom<String> for Role {
    type Error = RoleParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Seniority
// ============================================================================

/// Fixed seniority tiers, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeniorityTier {
    IndividualContributor,
    ProjectLead,
    TeamManager,
    DepartmentHead,
    GeneralManager,
    VicePresident,
    President,
}

impl SeniorityTier {
    pub fn rank(&self) -> u8 {
        match self {
            SeniorityTier::IndividualContributor => 0,
            SeniorityTier::ProjectLead => 50,
            SeniorityTier::TeamManager => 60,
            SeniorityTier::DepartmentHead => 70,
            SeniorityTier::GeneralManager => 80,
            SeniorityTier::VicePresident => 90,
            SeniorityTier::President => 100,
        }
    }
}

// ============================================================================
// Role Catalog - extension table
// ============================================================================

/// A role key with its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub key: Role,
    pub label: String,
}

/// Built-in roles plus runtime-defined custom roles.
#[derive(Debug, Clone, Default)]
pub struct RoleCatalog {
    custom: BTreeMap<String, String>,
}

impl RoleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or relabel) a custom role. Returns the parsed role.
    pub fn define(&mut self, key: &str, label: &str) -> Result<Role, RoleParseError> {
        let role: Role = key.parse()?;
        match &role {
            Role::Custom(key) => {
                let label = if label.trim().is_empty() {
                    key.clone()
                } else {
                    label.trim().to_string()
                };
                self.custom.insert(key.clone(), label);
                Ok(role)
            }
            built_in => Err(RoleParseError::BuiltIn(built_in.as_str().to_string())),
        }
    }

    /// Drop a custom role definition. Returns whether it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        normalize_key(key)
            .map(|key| self.custom.remove(&key).is_some())
            .unwrap_or(false)
    }

    /// Built-in roles are always known; custom roles only once defined.
    pub fn contains(&self, role: &Role) -> bool {
        match role {
            Role::Custom(key) => self.custom.contains_key(key),
            _ => true,
        }
    }

    pub fn label(&self, role: &Role) -> String {
        match role {
            Role::Custom(key) => self
                .custom
                .get(key)
                .cloned()
                .unwrap_or_else(|| key.clone()),
            other => other.default_label().to_string(),
        }
    }

    /// All definitions, built-in first.
    pub fn definitions(&self) -> Vec<RoleDefinition> {
        BUILT_IN_ROLES
            .iter()
            .map(|role| RoleDefinition {
                key: role.clone(),
                label: role.default_label().to_string(),
            })
            .chain(self.custom.iter().map(|(key, label)| RoleDefinition {
                key: Role::Custom(key.clone()),
                label: label.clone(),
            }))
            .collect()
    }
}

// ============================================================================
// Role Policy - which roles carry special powers
// ============================================================================

/// Role-based powers that are not expressed through workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePolicy {
    /// Owners with these roles publish directly on submit
    #[serde(default = "default_executive_roles")]
    pub executive_roles: Vec<Role>,

    /// Approving as this role sends an assessment straight to archive
    #[serde(default = "default_top_executive")]
    pub top_executive: Role,

    /// Roles allowed to archive graded assessments
    #[serde(default = "default_archive_roles")]
    pub archive_roles: Vec<Role>,

    /// Roles holding administrative override
    #[serde(default = "default_admin_roles")]
    pub admin_roles: Vec<Role>,

    /// L1 approver for roles without a workflow entry
    #[serde(default = "default_fallback_approver")]
    pub fallback_approver: Role,
}

fn default_executive_roles() -> Vec<Role> {
    vec![Role::VpProduct, Role::VpTech, Role::VpMarket, Role::President]
}

fn default_top_executive() -> Role {
    Role::President
}

fn default_archive_roles() -> Vec<Role> {
    vec![Role::Hrbp, Role::Admin]
}

fn default_admin_roles() -> Vec<Role> {
    vec![Role::Admin]
}

fn default_fallback_approver() -> Role {
    Role::Hrbp
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self {
            executive_roles: default_executive_roles(),
            top_executive: default_top_executive(),
            archive_roles: default_archive_roles(),
            admin_roles: default_admin_roles(),
            fallback_approver: default_fallback_approver(),
        }
    }
}

impl RolePolicy {
    pub fn is_executive(&self, role: &Role) -> bool {
        self.executive_roles.contains(role)
    }

    pub fn is_top_executive(&self, role: &Role) -> bool {
        &self.top_executive == role
    }

    pub fn can_archive(&self, role: &Role) -> bool {
        self.archive_roles.contains(role)
    }

    pub fn is_admin(&self, role: &Role) -> bool {
        self.admin_roles.contains(role)
    }
}
