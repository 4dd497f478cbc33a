//! The engine facade.
//!
//! [`OkrEngine`] wires the pure operations to the outside world. Every
//! write follows the same path: snapshot the directory, load the record,
//! apply the operation to it, save with the loaded version, then write one
//! audit record and publish one event. A failing operation saves nothing.

use crate::assessment::{self, ManagerEdit, SelfEdit};
use crate::audit::{AuditAction, AuditRecord, AuditSink, JsonlAuditLog, NullAuditSink};
use crate::authority::{can_act_on_stage, can_archive, Rules};
use crate::batch::{team_board, BatchGate, BatchItem, BatchReport, BoardScope, TeamBoard};
use crate::config::EngineConfig;
use crate::content::{apply_content_update, can_delete, ContentUpdate};
use crate::directory::{snapshot_resolver, UserDirectory};
use crate::error::{AuthorizationError, EngineError, Result, ValidationError};
use crate::events::{Event, EventBus};
use crate::model::{Grade, Okr, OkrLevel, User};
use crate::queue::{self, ActionItem, BadgeCounts};
use crate::registry::WorkflowRegistry;
use crate::resolver::{ApproverResolver, ApproverRoles, ResolvedApprover, TeamResponsible};
use crate::role::{Role, RolePolicy};
use crate::scoring::GradeBands;
use crate::session::Session;
use crate::store::{JsonOkrStore, OkrStore};
use crate::transitions::{self, require_reason};
use alignflow_ids::{OkrId, UserId};
use alignflow_lifecycle::{OkrStatus, StatusTransition};
use anyhow::Context;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct OkrEngine {
    registry: WorkflowRegistry,
    policy: RolePolicy,
    grading: GradeBands,
    directory: Arc<dyn UserDirectory>,
    store: Arc<dyn OkrStore>,
    audit: Arc<dyn AuditSink>,
    events: EventBus,
}

impl OkrEngine {
    /// Engine over `store` with the default registry, policy and grading.
    pub fn new(directory: Arc<dyn UserDirectory>, store: Arc<dyn OkrStore>) -> Self {
        let policy = RolePolicy::default();
        Self {
            registry: WorkflowRegistry::with_defaults(policy.fallback_approver.clone()),
            policy,
            grading: GradeBands::default(),
            directory,
            store,
            audit: Arc::new(NullAuditSink),
            events: EventBus::new(),
        }
    }

    /// Engine configured from `config`, with caller-supplied seams.
    pub fn from_config(
        config: &EngineConfig,
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn OkrStore>,
        audit: Arc<dyn AuditSink>,
    ) -> crate::config::Result<Self> {
        Ok(Self {
            registry: config.registry()?,
            policy: config.roles.clone(),
            grading: config.grading.clone(),
            directory,
            store,
            audit,
            events: EventBus::new(),
        })
    }

    /// Engine over the JSON store and JSONL audit log named in `config`.
    pub fn open(config: &EngineConfig, directory: Arc<dyn UserDirectory>) -> anyhow::Result<Self> {
        let store = JsonOkrStore::new(config.storage.okr_dir())?;
        let audit = JsonlAuditLog::new(config.storage.audit_log.clone())?;
        Self::from_config(config, directory, Arc::new(store), Arc::new(audit))
            .context("Invalid engine configuration")
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Registry edits take effect on the next operation.
    pub fn registry_mut(&mut self) -> &mut WorkflowRegistry {
        &mut self.registry
    }

    pub fn policy(&self) -> &RolePolicy {
        &self.policy
    }

    pub fn grading(&self) -> &GradeBands {
        &self.grading
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        self.events.subscribe()
    }

    /// Session for a directory user.
    pub fn session_for(&self, id: &UserId) -> Result<Session> {
        Session::for_user(self.directory.as_ref(), id)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn snapshot(&self) -> Result<ApproverResolver> {
        snapshot_resolver(self.directory.as_ref()).map_err(EngineError::Directory)
    }

    fn rules<'a>(&'a self, resolver: &'a ApproverResolver) -> Rules<'a> {
        Rules {
            registry: &self.registry,
            resolver,
            policy: &self.policy,
            grading: &self.grading,
        }
    }

    fn load(&self, id: &OkrId) -> Result<Okr> {
        self.store
            .load(id)?
            .ok_or_else(|| EngineError::OkrNotFound(id.clone()))
    }

    fn persist(&self, session: &Session, okr: &mut Okr, action: AuditAction, details: String) -> Result<()> {
        let version = self.store.save(okr)?;
        okr.version = version;
        debug!("Saved OKR {} at version {}", okr.id, version);

        self.audit.record(AuditRecord::okr(
            session.actor.id.clone(),
            session.actor.name.clone(),
            action,
            details,
        ));
        self.events.publish(Event::OkrSaved {
            okr_id: okr.id.clone(),
            status: okr.status(),
            archived: okr.is_archived(),
        });
        Ok(())
    }

    /// Load, apply `op`, persist.
    fn commit<T>(
        &self,
        rules: &Rules<'_>,
        session: &Session,
        id: &OkrId,
        action: AuditAction,
        op: impl FnOnce(&Rules<'_>, &mut Okr) -> Result<T>,
        details: impl FnOnce(&Okr, &T) -> String,
    ) -> Result<(Okr, T)> {
        let mut okr = self.load(id)?;
        let outcome = op(rules, &mut okr)?;
        let details = details(&okr, &outcome);
        self.persist(session, &mut okr, action, details)?;
        Ok((okr, outcome))
    }

    fn transition(
        &self,
        rules: &Rules<'_>,
        session: &Session,
        id: &OkrId,
        op: impl FnOnce(&Rules<'_>, &mut Okr) -> Result<StatusTransition>,
    ) -> Result<(Okr, StatusTransition)> {
        self.commit(rules, session, id, AuditAction::UpdateStatus, op, |okr, t| {
            let mut details = format!("{}: {} -> {}", okr.title, t.from, t.to);
            if let Some(reason) = &t.reason {
                details.push_str(&format!(" ({})", reason));
            }
            details
        })
    }

    fn transition_one(
        &self,
        session: &Session,
        id: &OkrId,
        op: impl FnOnce(&Rules<'_>, &mut Okr) -> Result<StatusTransition>,
    ) -> Result<Okr> {
        let resolver = self.snapshot()?;
        let rules = self.rules(&resolver);
        self.transition(&rules, session, id, op).map(|(okr, _)| okr)
    }

    fn edit(
        &self,
        session: &Session,
        id: &OkrId,
        action: AuditAction,
        summary: &'static str,
        op: impl FnOnce(&Rules<'_>, &mut Okr) -> Result<()>,
    ) -> Result<Okr> {
        let resolver = self.snapshot()?;
        let rules = self.rules(&resolver);
        self.commit(&rules, session, id, action, op, |okr, _| {
            format!("{}: {}", okr.title, summary)
        })
        .map(|(okr, _)| okr)
    }

    // ========================================================================
    // Records
    // ========================================================================

    pub fn create_okr(&self, session: &Session, level: OkrLevel) -> Result<Okr> {
        let mut okr = Okr::draft(&session.actor, level);
        let details = format!("Created '{}' for {}", okr.title, okr.period);
        self.persist(session, &mut okr, AuditAction::CreateOkr, details)?;
        info!("Created OKR {} for {}", okr.id, session.actor.id);
        Ok(okr)
    }

    pub fn get(&self, id: &OkrId) -> Result<Okr> {
        self.load(id)
    }

    pub fn list(&self) -> Result<Vec<Okr>> {
        Ok(self.store.load_all()?)
    }

    pub fn list_for_owner(&self, user: &User) -> Result<Vec<Okr>> {
        Ok(self
            .store
            .load_all()?
            .into_iter()
            .filter(|okr| okr.is_owned_by(user))
            .collect())
    }

    pub fn update_content(&self, session: &Session, id: &OkrId, update: &ContentUpdate) -> Result<Okr> {
        self.edit(session, id, AuditAction::UpdateOkr, "content updated", |rules, okr| {
            apply_content_update(rules, session, okr, update)
        })
    }

    pub fn delete_okr(&self, session: &Session, id: &OkrId) -> Result<()> {
        let resolver = self.snapshot()?;
        let rules = self.rules(&resolver);
        let okr = self.load(id)?;
        if !can_delete(&rules, session, &okr) {
            if okr.is_owned_by(&session.actor) {
                return Err(EngineError::wrong_status("delete", okr.status()));
            }
            return Err(AuthorizationError::new(
                session.actor_id(),
                "delete",
                id,
                "only the owner may delete a draft",
            )
            .into());
        }
        if !self.store.delete(id)? {
            return Err(EngineError::OkrNotFound(id.clone()));
        }

        self.audit.record(AuditRecord::okr(
            session.actor.id.clone(),
            session.actor.name.clone(),
            AuditAction::DeleteOkr,
            format!("Deleted '{}'", okr.title),
        ));
        self.events.publish(Event::OkrDeleted { okr_id: id.clone() });
        info!("Deleted OKR {}", id);
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn submit(&self, session: &Session, id: &OkrId) -> Result<Okr> {
        self.transition_one(session, id, |rules, okr| transitions::submit(rules, session, okr))
    }

    /// Approve the current creation or assessment stage.
    pub fn approve(&self, session: &Session, id: &OkrId) -> Result<Okr> {
        self.transition_one(session, id, |rules, okr| {
            let status = okr.status();
            if status.is_creation_pending() {
                transitions::approve_creation(rules, session, okr)
            } else if status.is_assessment_pending() {
                transitions::approve_assessment(rules, session, okr)
            } else {
                Err(EngineError::wrong_status("approve", status))
            }
        })
    }

    /// Reject the current stage. Assessment rejections need a reason.
    pub fn reject(&self, session: &Session, id: &OkrId, reason: Option<&str>) -> Result<Okr> {
        self.transition_one(session, id, |rules, okr| {
            let status = okr.status();
            if status.is_creation_pending() {
                transitions::reject_creation(rules, session, okr, reason)
            } else if status.is_assessment_pending() {
                transitions::reject_assessment(rules, session, okr, reason.unwrap_or_default())
            } else {
                Err(EngineError::wrong_status("reject", status))
            }
        })
    }

    pub fn submit_self_assessment(&self, session: &Session, id: &OkrId) -> Result<Okr> {
        self.transition_one(session, id, |_, okr| {
            transitions::submit_self_assessment(session, okr)
        })
    }

    pub fn veto(&self, session: &Session, id: &OkrId, reason: &str) -> Result<Okr> {
        self.transition_one(session, id, |rules, okr| transitions::veto(rules, session, okr, reason))
    }

    pub fn archive(&self, session: &Session, id: &OkrId) -> Result<Okr> {
        self.transition_one(session, id, |rules, okr| transitions::archive(rules, session, okr))
    }

    pub fn admin_revoke(&self, session: &Session, id: &OkrId, reason: Option<&str>) -> Result<Okr> {
        self.transition_one(session, id, |rules, okr| {
            transitions::admin_revoke(rules, session, okr, reason)
        })
    }

    // ========================================================================
    // Assessment edits and feedback
    // ========================================================================

    pub fn apply_self_edits(&self, session: &Session, id: &OkrId, edits: &[SelfEdit]) -> Result<Okr> {
        self.edit(session, id, AuditAction::UpdateAssessment, "self-assessment updated", |_, okr| {
            assessment::apply_self_edits(session, okr, edits)
        })
    }

    pub fn apply_manager_edits(
        &self,
        session: &Session,
        id: &OkrId,
        edits: &[ManagerEdit],
        adjustment_reason: Option<&str>,
    ) -> Result<Okr> {
        self.edit(session, id, AuditAction::UpdateAssessment, "assessment scored", |rules, okr| {
            assessment::apply_manager_edits(rules, session, okr, edits, adjustment_reason)
        })
    }

    pub fn submit_feedback(
        &self,
        session: &Session,
        id: &OkrId,
        comment: &str,
        recommended_grade: Option<Grade>,
    ) -> Result<Okr> {
        self.edit(session, id, AuditAction::SubmitFeedback, "feedback submitted", |rules, okr| {
            assessment::submit_feedback(rules, session, okr, comment, recommended_grade)
        })
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    pub fn resolve_approvers(&self, id: &OkrId) -> Result<ApproverRoles> {
        let resolver = self.snapshot()?;
        let okr = self.load(id)?;
        Ok(resolver.resolve_approvers(&self.registry, &okr)?)
    }

    pub fn resolve_users(&self, role: &Role, department: &str) -> Result<ResolvedApprover> {
        let resolver = self.snapshot()?;
        Ok(resolver.resolve_users(role, department)?)
    }

    pub fn team_responsible(&self, department: &str) -> Result<TeamResponsible> {
        Ok(self.snapshot()?.team_responsible(department))
    }

    // ========================================================================
    // Queues
    // ========================================================================

    pub fn actionable_items_for(&self, user: &User) -> Result<Vec<ActionItem>> {
        let resolver = self.snapshot()?;
        let rules = self.rules(&resolver);
        let okrs = self.store.load_all()?;
        Ok(queue::actionable_items_for(&rules, user, &okrs))
    }

    pub fn badge_counts(&self, user: &User) -> Result<BadgeCounts> {
        Ok(queue::badge_counts(&self.actionable_items_for(user)?))
    }

    pub fn team_board(&self, manager: &User, scope: BoardScope) -> Result<TeamBoard> {
        let resolver = self.snapshot()?;
        let rules = self.rules(&resolver);
        let okrs = self.store.load_all()?;
        Ok(team_board(&rules, manager, &okrs, scope))
    }

    // ========================================================================
    // Batch
    // ========================================================================

    fn run_batch<'a>(
        &self,
        rules: &Rules<'_>,
        session: &Session,
        okrs: impl IntoIterator<Item = &'a Okr>,
        op: impl Fn(&Rules<'_>, &mut Okr) -> Result<StatusTransition>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for okr in okrs {
            let result = self
                .transition(rules, session, &okr.id, &op)
                .map(|(_, transition)| transition);
            if let Err(err) = &result {
                warn!("Batch item {} failed: {}", okr.id, err);
            }
            report.items.push(BatchItem {
                okr_id: okr.id.clone(),
                owner: okr.user_name.clone(),
                result,
            });
        }
        info!(
            "Batch by {}: {} succeeded, {} failed",
            session.actor.id,
            report.succeeded(),
            report.failed()
        );
        report
    }

    /// Approve every scored record on the actor's board.
    pub fn batch_approve(&self, session: &Session, scope: BoardScope) -> Result<BatchReport> {
        let resolver = self.snapshot()?;
        let rules = self.rules(&resolver);
        let okrs = self.store.load_all()?;
        let board = team_board(&rules, &session.actor, &okrs, scope);

        match board.gate() {
            BatchGate::Blocked { awaiting_scoring } => {
                return Err(EngineError::BatchBlocked { awaiting_scoring })
            }
            BatchGate::Empty => {
                return Err(ValidationError::Invalid("nothing is ready for batch approval".to_string()).into())
            }
            BatchGate::Ready { count } => debug!("Batch approving {} records", count),
        }

        Ok(self.run_batch(&rules, session, board.actionable(), |rules, okr| {
            transitions::approve_assessment(rules, session, okr)
        }))
    }

    /// Send every second or third level assessment the actor holds back to
    /// first-level scoring.
    pub fn batch_reject(&self, session: &Session, reason: &str) -> Result<BatchReport> {
        let reason = require_reason(reason)?;
        let resolver = self.snapshot()?;
        let rules = self.rules(&resolver);
        let okrs = self.store.load_all()?;

        let targets: Vec<&Okr> = okrs
            .iter()
            .filter(|okr| {
                !okr.is_archived()
                    && matches!(
                        okr.status(),
                        OkrStatus::PendingL2Assess | OkrStatus::PendingL3Assess
                    )
                    && can_act_on_stage(&rules, &session.actor, okr)
            })
            .collect();
        if targets.is_empty() {
            return Err(ValidationError::Invalid("nothing to reject".to_string()).into());
        }

        Ok(self.run_batch(&rules, session, targets, |rules, okr| {
            transitions::reject_assessment(rules, session, okr, &reason)
        }))
    }

    /// Archive every record of `department` that is waiting for it.
    pub fn archive_department(&self, session: &Session, department: &str) -> Result<BatchReport> {
        let resolver = self.snapshot()?;
        let rules = self.rules(&resolver);
        if !can_archive(&rules, &session.actor) {
            return Err(AuthorizationError::on(
                session.actor_id(),
                "archive",
                format!("department {}", department),
                "archiving requires an HR or admin role",
            )
            .into());
        }

        let okrs = self.store.load_all()?;
        let targets: Vec<&Okr> = okrs
            .iter()
            .filter(|okr| {
                okr.department == department
                    && !okr.is_archived()
                    && okr.status() == OkrStatus::PendingArchive
            })
            .collect();
        if targets.is_empty() {
            return Err(ValidationError::Invalid(format!(
                "no records of {} are waiting for archive",
                department
            ))
            .into());
        }

        Ok(self.run_batch(&rules, session, targets, |rules, okr| {
            transitions::archive(rules, session, okr)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::directory::StaticDirectory;
    use crate::error::ErrorKind;
    use crate::store::MemoryOkrStore;

    fn user(id: &str, role: Role, dept: &str) -> User {
        User::new(UserId::parse(id).unwrap(), id, role, dept)
    }

    #[test]
    fn test_writes_audit_and_events() {
        let owner = user("e1", Role::RdEmployee, "Crypto");
        let directory = StaticDirectory::new(vec![owner.clone()]);
        let audit = Arc::new(MemoryAuditLog::new());
        let engine = OkrEngine::new(Arc::new(directory), Arc::new(MemoryOkrStore::new()))
            .with_audit(audit.clone());
        let events = engine.subscribe();
        let session = Session::new(owner.clone());

        let okr = engine.create_okr(&session, OkrLevel::Personal).unwrap();
        assert_eq!(okr.version, 1);
        engine.delete_okr(&session, &okr.id).unwrap();

        assert_eq!(
            audit.actions(),
            vec![AuditAction::CreateOkr, AuditAction::DeleteOkr]
        );
        assert!(matches!(events.try_recv().unwrap(), Event::OkrSaved { .. }));
        assert_eq!(
            events.try_recv().unwrap(),
            Event::OkrDeleted { okr_id: okr.id.clone() }
        );
        assert_eq!(engine.get(&okr.id).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_failed_operation_saves_nothing() {
        let owner = user("e1", Role::RdEmployee, "Crypto");
        let directory = StaticDirectory::new(vec![owner.clone()]);
        let audit = Arc::new(MemoryAuditLog::new());
        let engine = OkrEngine::new(Arc::new(directory), Arc::new(MemoryOkrStore::new()))
            .with_audit(audit.clone());
        let session = Session::new(owner);

        let okr = engine.create_okr(&session, OkrLevel::Personal).unwrap();
        let err = engine.submit(&session, &okr.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let stored = engine.get(&okr.id).unwrap();
        assert_eq!(stored.status(), OkrStatus::Draft);
        assert_eq!(stored.version, 1);
        assert_eq!(audit.records().len(), 1);
    }
}
