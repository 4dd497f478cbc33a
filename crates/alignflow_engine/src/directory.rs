//! Read-only views of the organization: users, departments and roles.
//!
//! The engine never edits these; it snapshots them when it needs to resolve
//! approvers. [`StaticDirectory`] backs both traits from an `org.toml` file.

use crate::model::User;
use crate::resolver::{ApproverResolver, PrimaryApprovers};
use crate::role::{Role, RoleCatalog, RoleDefinition};
use alignflow_ids::UserId;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub trait UserDirectory: Send + Sync {
    fn list_users(&self) -> Result<Vec<User>>;

    fn find_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.list_users()?.into_iter().find(|u| &u.id == id))
    }

    /// Explicit primary approver designations, on top of user flags.
    fn primary_approvers(&self) -> Result<PrimaryApprovers> {
        Ok(PrimaryApprovers::new())
    }
}

pub trait OrgCatalog: Send + Sync {
    fn list_departments(&self) -> Result<Vec<String>>;

    fn list_roles(&self) -> Result<Vec<RoleDefinition>>;
}

/// Resolver over a fresh snapshot of `directory`.
pub fn snapshot_resolver(directory: &dyn UserDirectory) -> Result<ApproverResolver> {
    let users = directory.list_users().context("Failed to list users")?;
    let designations = directory
        .primary_approvers()
        .context("Failed to list primary approver designations")?;
    Ok(ApproverResolver::with_designations(users, &designations))
}

// ============================================================================
// org.toml
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRole {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Designation {
    pub department: String,
    pub role: Role,
    pub user: UserId,
}

/// On-disk shape of `org.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgFile {
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    pub roles: Vec<CustomRole>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub primary_approvers: Vec<Designation>,
}

/// In-memory directory and catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    departments: Vec<String>,
    catalog: RoleCatalog,
    users: Vec<User>,
    designations: PrimaryApprovers,
}

impl StaticDirectory {
    pub fn new(users: Vec<User>) -> Self {
        let mut departments: Vec<String> = Vec::new();
        for user in &users {
            if !departments.contains(&user.department) {
                departments.push(user.department.clone());
            }
        }
        Self {
            departments,
            catalog: RoleCatalog::new(),
            users,
            designations: PrimaryApprovers::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read organization file: {}", path.display()))?;
        let file: OrgFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse organization file: {}", path.display()))?;
        let directory = Self::from_file(file)?;
        debug!(
            "Loaded {} users in {} departments from {}",
            directory.users.len(),
            directory.departments.len(),
            path.display()
        );
        Ok(directory)
    }

    pub fn from_file(file: OrgFile) -> Result<Self> {
        let mut catalog = RoleCatalog::new();
        for role in &file.roles {
            catalog
                .define(&role.key, &role.label)
                .with_context(|| format!("Invalid custom role '{}'", role.key))?;
        }

        for user in &file.users {
            if !catalog.contains(&user.role) {
                bail!("User {} has undefined role {}", user.id, user.role);
            }
            if file.users.iter().filter(|u| u.id == user.id).count() > 1 {
                bail!("Duplicate user id {}", user.id);
            }
        }

        for user in file.users.iter().filter(|u| u.is_primary_approver) {
            let rivals: Vec<&str> = file
                .users
                .iter()
                .filter(|u| {
                    u.is_primary_approver
                        && u.id != user.id
                        && u.role == user.role
                        && u.department == user.department
                })
                .map(|u| u.id.as_str())
                .collect();
            if !rivals.is_empty() {
                bail!(
                    "Users {} and {} are both flagged primary approver for {} in {}",
                    user.id,
                    rivals.join(", "),
                    user.role,
                    user.department
                );
            }
        }

        let mut departments = file.departments;
        for user in &file.users {
            if !departments.contains(&user.department) {
                departments.push(user.department.clone());
            }
        }

        let mut designations = PrimaryApprovers::new();
        for d in file.primary_approvers {
            let Some(holder) = file.users.iter().find(|u| u.id == d.user) else {
                bail!("Primary approver {} is not a known user", d.user);
            };
            if holder.role != d.role {
                bail!(
                    "Primary approver {} holds role {}, not {}",
                    d.user,
                    holder.role,
                    d.role
                );
            }
            designations.designate(&d.department, d.role, d.user);
        }

        Ok(Self {
            departments,
            catalog,
            users: file.users,
            designations,
        })
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn designate(&mut self, department: &str, role: Role, user: UserId) {
        self.designations.designate(department, role, user);
    }
}

impl UserDirectory for StaticDirectory {
    fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.clone())
    }

    fn primary_approvers(&self) -> Result<PrimaryApprovers> {
        Ok(self.designations.clone())
    }
}

impl OrgCatalog for StaticDirectory {
    fn list_departments(&self) -> Result<Vec<String>> {
        Ok(self.departments.clone())
    }

    fn list_roles(&self) -> Result<Vec<RoleDefinition>> {
        Ok(self.catalog.definitions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORG: &str = r#"
departments = ["Crypto", "R&D"]

[[roles]]
key = "DATA_STEWARD"
label = "Data Steward"

[[users]]
id = "u1"
name = "Li"
role = "RD_EMPLOYEE"
department = "Crypto"

[[users]]
id = "h1"
name = "Zhou"
role = "TECH_HEAD"
department = "Crypto"

[[users]]
id = "h2"
name = "Wu"
role = "TECH_HEAD"
department = "Crypto"

[[users]]
id = "d1"
name = "Sun"
role = "DATA_STEWARD"
department = "Data"

[[primary_approvers]]
department = "Crypto"
role = "TECH_HEAD"
user = "h2"
"#;

    #[test]
    fn test_org_file_parses() {
        let file: OrgFile = toml::from_str(ORG).unwrap();
        let directory = StaticDirectory::from_file(file).unwrap();

        assert_eq!(
            directory.list_departments().unwrap(),
            vec!["Crypto".to_string(), "R&D".to_string(), "Data".to_string()]
        );
        assert!(directory
            .list_roles()
            .unwrap()
            .iter()
            .any(|r| r.label == "Data Steward"));

        let resolver = snapshot_resolver(&directory).unwrap();
        let resolved = resolver.resolve_users(&Role::TechHead, "Crypto").unwrap();
        assert_eq!(resolved.user.id, UserId::parse("h2").unwrap());
    }

    #[test]
    fn test_undefined_custom_role_rejected() {
        let file: OrgFile = toml::from_str(
            r#"
[[users]]
id = "x"
name = "X"
role = "GHOST_ROLE"
department = "Nowhere"
"#,
        )
        .unwrap();
        assert!(StaticDirectory::from_file(file).is_err());
    }

    #[test]
    fn test_conflicting_primary_flags_rejected() {
        let file: OrgFile = toml::from_str(
            r#"
[[users]]
id = "h1"
name = "Zhou"
role = "TECH_HEAD"
department = "Crypto"
is_primary_approver = true

[[users]]
id = "h2"
name = "Wu"
role = "TECH_HEAD"
department = "Crypto"
is_primary_approver = true

[[users]]
id = "h3"
name = "Qian"
role = "TECH_HEAD"
department = "Data"
is_primary_approver = true
"#,
        )
        .unwrap();
        let err = StaticDirectory::from_file(file).unwrap_err().to_string();
        assert!(err.contains("h1"), "{}", err);
        assert!(err.contains("h2"), "{}", err);
        assert!(err.contains("Crypto"), "{}", err);
    }

    #[test]
    fn test_designation_role_must_match() {
        let file: OrgFile = toml::from_str(
            r#"
[[users]]
id = "u1"
name = "Li"
role = "RD_EMPLOYEE"
department = "Crypto"

[[primary_approvers]]
department = "Crypto"
role = "TECH_HEAD"
user = "u1"
"#,
        )
        .unwrap();
        assert!(StaticDirectory::from_file(file).is_err());
    }
}
