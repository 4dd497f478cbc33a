//! Approval routing and assessment lifecycle for OKRs.
//!
//! An OKR moves from draft through one to three levels of creation
//! approval, is self-assessed by its owner, scored and approved through the
//! same chain, and finally archived by HR. Which roles approve whom lives in
//! the [`registry`]; which concrete users hold those roles for a given
//! department is decided by the [`resolver`].
//!
//! # Layers
//!
//! - Pure rules: [`role`], [`registry`], [`resolver`], [`scoring`],
//!   [`authority`]
//! - Operations on one record: [`transitions`], [`assessment`], [`content`]
//! - Derived views: [`queue`], [`batch`]
//! - Seams: [`store`], [`audit`], [`events`], [`directory`]
//! - [`OkrEngine`] ties them together
//!
//! # Example
//!
//! ```no_run
//! use alignflow_engine::{MemoryOkrStore, OkrEngine, OkrLevel, Session, StaticDirectory};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let directory = StaticDirectory::load(std::path::Path::new("org.toml"))?;
//! let owner = directory.users()[0].clone();
//! let engine = OkrEngine::new(Arc::new(directory), Arc::new(MemoryOkrStore::new()));
//! let okr = engine.create_okr(&Session::new(owner), OkrLevel::Personal)?;
//! println!("{} is {}", okr.title, okr.status());
//! # Ok(())
//! # }
//! ```

pub mod assessment;
pub mod audit;
pub mod authority;
pub mod batch;
pub mod config;
pub mod content;
pub mod directory;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod role;
pub mod scoring;
pub mod session;
pub mod store;
pub mod transitions;

pub use assessment::{ManagerEdit, SelfEdit};
pub use audit::{AuditAction, AuditRecord, AuditSink, JsonlAuditLog, MemoryAuditLog, NullAuditSink};
pub use batch::{BatchGate, BatchItem, BatchReport, BoardScope, TeamBoard};
pub use config::{ConfigError, EngineConfig};
pub use content::ContentUpdate;
pub use directory::{OrgCatalog, StaticDirectory, UserDirectory};
pub use engine::OkrEngine;
pub use error::{AuthorizationError, EngineError, ErrorKind, ValidationError};
pub use events::{Event, EventBus};
pub use model::{
    ApprovalStage, ApproverLevel, Grade, KeyResult, Objective, Okr, OkrLevel, OverallAssessment, User,
};
pub use queue::{ActionItem, ActionKind, BadgeCounts};
pub use registry::{ApprovalWorkflow, WorkflowRegistry};
pub use resolver::{ApproverResolver, ApproverRoles, PrimaryApprovers, ResolveError, TeamResponsible};
pub use role::{Role, RoleCatalog, RolePolicy};
pub use scoring::{determine_grade, GradeBand, GradeBands};
pub use session::Session;
pub use store::{JsonOkrStore, MemoryOkrStore, OkrStore, StoreError};

pub use alignflow_ids::{KeyResultId, ObjectiveId, OkrId, UserId};
pub use alignflow_lifecycle::{Lifecycle, OkrStatus, Phase, StatusTransition};
