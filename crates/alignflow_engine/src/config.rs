//! Engine configuration.
//!
//! Reads `$ALIGNFLOW_HOME/config.toml`:
//!
//! ```toml
//! [storage]
//! data_dir = "/var/lib/alignflow"
//!
//! [roles]
//! executive_roles = ["VP_TECH", "PRESIDENT"]
//! fallback_approver = "HRBP"
//!
//! [grading]
//! fallback_grade = "B"
//!
//! [[grading.bands]]
//! grade = "S"
//! min_score = 90.0
//! max_score = 100.0
//!
//! [[workflows]]
//! target_role = "RD_EMPLOYEE"
//! approver_role_l1 = "TECH_HEAD"
//! approver_role_l2 = "TECH_GM"
//! ```

use crate::registry::{default_workflows, ApprovalWorkflow, WorkflowRegistry};
use crate::role::RolePolicy;
use crate::scoring::GradeBands;
use alignflow_logging::alignflow_home;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Error type for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Config not found at: {0}")]
    NotFound(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    alignflow_home().join("config.toml")
}

/// Storage locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one JSON file per OKR under `okrs/`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Append-only JSONL audit log
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,
}

fn default_data_dir() -> PathBuf {
    alignflow_home().join("data")
}

fn default_audit_log() -> PathBuf {
    alignflow_home().join("audit.jsonl")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            audit_log: default_audit_log(),
        }
    }
}

impl StorageConfig {
    pub fn okr_dir(&self) -> PathBuf {
        self.data_dir.join("okrs")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub roles: RolePolicy,

    #[serde(default)]
    pub grading: GradeBands,

    /// Replaces the built-in registry when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workflows: Vec<ApprovalWorkflow>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            roles: RolePolicy::default(),
            grading: GradeBands::default(),
            workflows: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.grading.bands.is_empty() {
            return Err(ConfigError::Invalid("grading.bands is empty".to_string()));
        }
        for band in &self.grading.bands {
            if !(band.min_score.is_finite() && band.max_score.is_finite())
                || band.min_score > band.max_score
            {
                return Err(ConfigError::Invalid(format!(
                    "grade band {} has range {}..={}",
                    band.grade, band.min_score, band.max_score
                )));
            }
        }
        self.registry().map(|_| ())
    }

    /// Workflow registry described by this config.
    pub fn registry(&self) -> Result<WorkflowRegistry> {
        let entries = if self.workflows.is_empty() {
            default_workflows()
        } else {
            self.workflows.clone()
        };
        WorkflowRegistry::from_entries(entries, self.roles.fallback_approver.clone())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
