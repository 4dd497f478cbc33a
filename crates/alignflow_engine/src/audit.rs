//! Audit trail of engine operations.
//!
//! Sinks are fire-and-forget: a failing sink logs a warning and the
//! operation that produced the record still succeeds.
//!
//! # Log Format
//!
//! Each line is a JSON object:
//! ```json
//! {"id":"...","actor_id":"u7","actor_name":"Chen","action":"UPDATE_STATUS","module":"OKR","details":"...","timestamp":"2026-01-21T10:30:00Z"}
//! ```

use alignflow_ids::{AuditId, UserId};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub const OKR_MODULE: &str = "OKR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateOkr,
    UpdateOkr,
    DeleteOkr,
    UpdateStatus,
    UpdateAssessment,
    SubmitFeedback,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateOkr => "CREATE_OKR",
            AuditAction::UpdateOkr => "UPDATE_OKR",
            AuditAction::DeleteOkr => "DELETE_OKR",
            AuditAction::UpdateStatus => "UPDATE_STATUS",
            AuditAction::UpdateAssessment => "UPDATE_ASSESSMENT",
            AuditAction::SubmitFeedback => "SUBMIT_FEEDBACK",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub actor_id: UserId,
    pub actor_name: String,
    pub action: AuditAction,
    pub module: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn okr(actor_id: UserId, actor_name: impl Into<String>, action: AuditAction, details: impl Into<String>) -> Self {
        Self {
            id: AuditId::new(),
            actor_id,
            actor_name: actor_name.into(),
            action,
            module: OKR_MODULE.to_string(),
            details: details.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Discards everything.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: AuditRecord) {}
}

// ============================================================================
// JSONL file
// ============================================================================

/// Append-only JSONL audit log.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlAuditLog {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create audit log directory: {}", parent.display())
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open audit log: {}", path.display()))?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&self, record: &AuditRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize audit record")?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("audit log lock poisoned"))?;
        writeln!(writer, "{}", json).context("Failed to write audit record")?;
        writer.flush().context("Failed to flush audit log")?;
        Ok(())
    }

    /// Read every record back, skipping lines that fail to parse.
    pub fn read_all(path: &Path) -> Result<Vec<AuditRecord>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read audit log: {}", path.display()))?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed audit line in {}: {}", path.display(), e);
                    None
                }
            })
            .collect())
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, record: AuditRecord) {
        if let Err(e) = self.write_record(&record) {
            warn!(
                "Failed to record audit entry {} for {}: {:#}",
                record.action, record.actor_id, e
            );
        }
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.records().iter().map(|r| r.action).collect()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, record: AuditRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(_) => warn!("Memory audit log lock poisoned; dropping {}", record.action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(action: AuditAction) -> AuditRecord {
        AuditRecord::okr(UserId::parse("u7").unwrap(), "Chen", action, "details")
    }

    #[test]
    fn test_jsonl_appends_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("audit").join("audit.jsonl");
        let log = JsonlAuditLog::new(path.clone()).unwrap();

        log.record(record(AuditAction::CreateOkr));
        log.record(record(AuditAction::UpdateStatus));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"action\":\"UPDATE_STATUS\""));
        assert!(content.contains("\"module\":\"OKR\""));

        let records = JsonlAuditLog::read_all(&path).unwrap();
        assert_eq!(records[1].action, AuditAction::UpdateStatus);
    }

    #[test]
    fn test_jsonl_reopen_keeps_history() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("audit.jsonl");
        {
            let log = JsonlAuditLog::new(path.clone()).unwrap();
            log.record(record(AuditAction::CreateOkr));
        }
        let log = JsonlAuditLog::new(path.clone()).unwrap();
        log.record(record(AuditAction::DeleteOkr));
        assert_eq!(JsonlAuditLog::read_all(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_memory_log() {
        let log = MemoryAuditLog::new();
        log.record(record(AuditAction::SubmitFeedback));
        assert_eq!(log.actions(), vec![AuditAction::SubmitFeedback]);
    }
}
