//! Command context: config, organization, engine and acting user.

use crate::cli::error::HelpfulError;
use alignflow_engine::config::default_config_path;
use alignflow_engine::{EngineConfig, Okr, OkrEngine, OkrId, Session, StaticDirectory, UserDirectory, UserId};
use alignflow_logging::alignflow_home;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Config and organization file locations.
#[derive(Debug, Clone)]
pub struct Paths {
    pub config: PathBuf,
    pub org: PathBuf,
}

impl Paths {
    pub fn resolve(config: Option<PathBuf>, org: Option<PathBuf>) -> Self {
        Self {
            config: config.unwrap_or_else(default_config_path),
            org: org.unwrap_or_else(default_org_path),
        }
    }
}

/// Default organization file: ~/.alignflow/org.toml
pub fn default_org_path() -> PathBuf {
    alignflow_home().join("org.toml")
}

pub struct AppContext {
    pub paths: Paths,
    pub config: EngineConfig,
    pub directory: Arc<StaticDirectory>,
    pub engine: OkrEngine,
    acting: Option<String>,
}

impl AppContext {
    pub fn load(paths: Paths, acting: Option<String>) -> Result<Self> {
        let config = EngineConfig::load_or_default(&paths.config)
            .with_context(|| format!("Failed to load config: {}", paths.config.display()))?;

        if !paths.org.exists() {
            return Err(HelpfulError::org_not_found(&paths.org).into());
        }
        let directory = Arc::new(StaticDirectory::load(&paths.org)?);
        let shared: Arc<dyn UserDirectory> = directory.clone();
        let engine = OkrEngine::open(&config, shared)?;
        debug!(
            "Opened OKR store at {} with {} users",
            config.storage.okr_dir().display(),
            directory.users().len()
        );

        Ok(Self {
            paths,
            config,
            directory,
            engine,
            acting,
        })
    }

    /// Session of the `--as` user.
    pub fn session(&self) -> Result<Session> {
        let raw = self
            .acting
            .as_deref()
            .ok_or_else(HelpfulError::no_acting_user)?;
        let id = UserId::parse(raw).map_err(|e| HelpfulError::invalid_id("user", raw, &e.to_string()))?;
        Ok(self.engine.session_for(&id)?)
    }

    /// Record by full id or unique id prefix.
    pub fn find_okr(&self, id_or_prefix: &str) -> Result<Okr> {
        if let Ok(id) = OkrId::parse(id_or_prefix) {
            if let Ok(okr) = self.engine.get(&id) {
                return Ok(okr);
            }
        }

        let prefix = id_or_prefix.trim();
        let mut matches: Vec<Okr> = self
            .engine
            .list()?
            .into_iter()
            .filter(|okr| okr.id.as_str().starts_with(prefix))
            .collect();
        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(HelpfulError::okr_not_found(prefix).into()),
            n => Err(HelpfulError::ambiguous_prefix(prefix, n).into()),
        }
    }
}
