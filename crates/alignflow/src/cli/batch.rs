//! `alignflow batch` - operations over many records

use crate::cli::context::AppContext;
use crate::cli::output::{print_json, print_table, short_id};
use alignflow_engine::{BatchReport, BoardScope};
use anyhow::{anyhow, Result};
use clap::Subcommand;
use serde_json::json;

#[derive(Subcommand, Debug)]
pub enum BatchCommands {
    /// Approve every scored record on your board
    Approve {
        /// members, leaders or all
        #[arg(short, long, default_value = "all")]
        scope: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send second and third level assessments back for rescoring
    Reject {
        #[arg(short, long)]
        reason: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Archive every record of a department waiting for archive
    Archive {
        department: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl BatchCommands {
    pub fn wants_json(&self) -> bool {
        match self {
            BatchCommands::Approve { json, .. }
            | BatchCommands::Reject { json, .. }
            | BatchCommands::Archive { json, .. } => *json,
        }
    }
}

pub fn run(ctx: &AppContext, action: BatchCommands) -> Result<()> {
    let session = ctx.session()?;
    let (report, json) = match action {
        BatchCommands::Approve { scope, json } => {
            let scope: BoardScope = scope.parse().map_err(|e: String| anyhow!(e))?;
            (ctx.engine.batch_approve(&session, scope)?, json)
        }
        BatchCommands::Reject { reason, json } => (ctx.engine.batch_reject(&session, &reason)?, json),
        BatchCommands::Archive { department, json } => {
            (ctx.engine.archive_department(&session, &department)?, json)
        }
    };

    if json {
        print_json(&report_json(&report))
    } else {
        print_report(&report);
        Ok(())
    }
}

fn report_json(report: &BatchReport) -> serde_json::Value {
    let items: Vec<_> = report
        .items
        .iter()
        .map(|item| match &item.result {
            Ok(transition) => json!({
                "okr_id": item.okr_id,
                "owner": item.owner,
                "status": "ok",
                "from": transition.from,
                "to": transition.to,
            }),
            Err(err) => json!({
                "okr_id": item.okr_id,
                "owner": item.owner,
                "status": "failed",
                "kind": err.kind(),
                "error": err.to_string(),
            }),
        })
        .collect();
    json!({
        "succeeded": report.succeeded(),
        "failed": report.failed(),
        "items": items,
    })
}

fn print_report(report: &BatchReport) {
    let rows = report
        .items
        .iter()
        .map(|item| {
            let result = match &item.result {
                Ok(t) => format!("{} -> {}", t.from, t.to),
                Err(e) => format!("FAILED: {}", e),
            };
            vec![short_id(&item.okr_id), item.owner.clone(), result]
        })
        .collect();
    print_table(&["ID", "Owner", "Result"], rows);
    println!("{} succeeded, {} failed", report.succeeded(), report.failed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use alignflow_engine::{BatchItem, OkrId, OkrStatus, StatusTransition, ValidationError};

    #[test]
    fn test_report_json_counts() {
        let report = BatchReport {
            items: vec![
                BatchItem {
                    okr_id: OkrId::new(),
                    owner: "Ana".into(),
                    result: Ok(StatusTransition::new(
                        OkrStatus::PendingL1Assess,
                        OkrStatus::PendingL2Assess,
                    )),
                },
                BatchItem {
                    okr_id: OkrId::new(),
                    owner: "Ben".into(),
                    result: Err(ValidationError::Required("reason").into()),
                },
            ],
        };

        let value = report_json(&report);
        assert_eq!(value["succeeded"], 1);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["items"][0]["to"], "PENDING_L2_ASSESS");
        assert_eq!(value["items"][1]["status"], "failed");
    }
}
