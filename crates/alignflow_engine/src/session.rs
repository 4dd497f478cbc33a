//! The acting user of an operation.

use crate::directory::UserDirectory;
use crate::error::{EngineError, Result};
use crate::model::User;
use alignflow_ids::UserId;

/// Who is acting. Passed explicitly into every engine operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub actor: User,
}

impl Session {
    pub fn new(actor: User) -> Self {
        Self { actor }
    }

    /// Session for a directory user.
    pub fn for_user(directory: &dyn UserDirectory, id: &UserId) -> Result<Self> {
        directory
            .find_user(id)
            .map_err(EngineError::Directory)?
            .map(Self::new)
            .ok_or_else(|| EngineError::UserNotFound(id.clone()))
    }

    pub fn actor_id(&self) -> &UserId {
        &self.actor.id
    }

    /// Actor id as recorded in lifecycle history.
    pub(crate) fn history_actor(&self) -> Option<String> {
        Some(self.actor.id.to_string())
    }
}
