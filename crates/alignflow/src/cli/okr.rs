//! `alignflow okr` - record commands

use crate::cli::context::AppContext;
use crate::cli::error::HelpfulError;
use crate::cli::output::{
    format_grade, format_score, format_status, format_timestamp, okr_row, print_json, print_table,
    short_id, OKR_HEADERS,
};
use alignflow_engine::{
    ContentUpdate, Grade, ManagerEdit, Okr, OkrLevel, OkrStatus, SelfEdit,
};
use anyhow::{anyhow, Result};
use clap::Subcommand;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum OkrCommands {
    /// Start a new draft owned by the acting user
    Create {
        /// company, department or personal
        #[arg(short, long, default_value = "personal")]
        level: String,
    },

    /// List records
    List {
        /// Only records owned by the acting user
        #[arg(long)]
        mine: bool,

        /// Filter by status (e.g. PENDING_L1_ASSESS)
        #[arg(long)]
        status: Option<String>,

        /// Filter by department
        #[arg(short, long)]
        department: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one record with its objectives and history
    Show {
        /// Id or unique id prefix
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace draft content from a JSON file
    Edit {
        id: String,

        /// JSON object with title, period, objectives, peer_reviewers
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Submit a draft for approval
    Submit { id: String },

    /// Approve the current stage
    Approve { id: String },

    /// Reject the current stage
    Reject {
        id: String,

        /// Required at assessment stages
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Apply self-assessment edits from a JSON file
    SelfReview {
        id: String,

        #[arg(short, long)]
        file: PathBuf,
    },

    /// Submit the self-assessment for scoring
    SelfAssess { id: String },

    /// Apply grader scores and comments from a JSON file
    Review {
        id: String,

        #[arg(short, long)]
        file: PathBuf,

        /// Adjustment reason, required when changing another grader's scores
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Leave advisory feedback
    Feedback {
        id: String,

        #[arg(short, long)]
        comment: String,

        /// Recommended grade (S, A, B, C)
        #[arg(short, long)]
        grade: Option<String>,
    },

    /// Send an assessment back to the first grader
    Veto {
        id: String,

        #[arg(short, long)]
        reason: String,
    },

    /// Archive a record waiting for archive
    Archive { id: String },

    /// Send a record back to draft, archived or not (admin)
    Revoke {
        id: String,

        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Delete a draft
    Delete { id: String },
}

impl OkrCommands {
    pub fn wants_json(&self) -> bool {
        match self {
            OkrCommands::List { json, .. } | OkrCommands::Show { json, .. } => *json,
            _ => false,
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| HelpfulError::input_file(path, &e.to_string()))?;
    let value = serde_json::from_str(&raw)
        .map_err(|e| HelpfulError::input_file(path, &e.to_string()))?;
    Ok(value)
}

fn report(verb: &str, okr: &Okr) {
    println!(
        "{} {} \"{}\" -> {}",
        verb,
        short_id(&okr.id),
        okr.title,
        format_status(okr)
    );
}

pub fn run(ctx: &AppContext, action: OkrCommands) -> Result<()> {
    match action {
        OkrCommands::Create { level } => {
            let level: OkrLevel = level.parse().map_err(|e: String| anyhow!(e))?;
            let okr = ctx.engine.create_okr(&ctx.session()?, level)?;
            info!("Created OKR {}", okr.id);
            println!("Created {} ({})", okr.id, okr.period);
            Ok(())
        }
        OkrCommands::List {
            mine,
            status,
            department,
            json,
        } => run_list(ctx, mine, status.as_deref(), department.as_deref(), json),
        OkrCommands::Show { id, json } => run_show(ctx, &id, json),
        OkrCommands::Edit { id, file } => {
            let update: ContentUpdate = read_json(&file)?;
            let okr = ctx.find_okr(&id)?;
            let okr = ctx.engine.update_content(&ctx.session()?, &okr.id, &update)?;
            report("Updated", &okr);
            Ok(())
        }
        OkrCommands::Submit { id } => {
            let okr = ctx.find_okr(&id)?;
            report("Submitted", &ctx.engine.submit(&ctx.session()?, &okr.id)?);
            Ok(())
        }
        OkrCommands::Approve { id } => {
            let okr = ctx.find_okr(&id)?;
            report("Approved", &ctx.engine.approve(&ctx.session()?, &okr.id)?);
            Ok(())
        }
        OkrCommands::Reject { id, reason } => {
            let okr = ctx.find_okr(&id)?;
            let okr = ctx
                .engine
                .reject(&ctx.session()?, &okr.id, reason.as_deref())?;
            report("Rejected", &okr);
            Ok(())
        }
        OkrCommands::SelfReview { id, file } => {
            let edits: Vec<SelfEdit> = read_json(&file)?;
            let okr = ctx.find_okr(&id)?;
            let okr = ctx.engine.apply_self_edits(&ctx.session()?, &okr.id, &edits)?;
            println!("Applied {} self-assessment edits to {}", edits.len(), short_id(&okr.id));
            Ok(())
        }
        OkrCommands::SelfAssess { id } => {
            let okr = ctx.find_okr(&id)?;
            let okr = ctx.engine.submit_self_assessment(&ctx.session()?, &okr.id)?;
            report("Self-assessed", &okr);
            Ok(())
        }
        OkrCommands::Review { id, file, reason } => {
            let edits: Vec<ManagerEdit> = read_json(&file)?;
            let okr = ctx.find_okr(&id)?;
            let okr = ctx.engine.apply_manager_edits(
                &ctx.session()?,
                &okr.id,
                &edits,
                reason.as_deref(),
            )?;
            println!(
                "Scored {}: total {}, grade {}",
                short_id(&okr.id),
                format_score(okr.total_score),
                format_grade(okr.final_grade)
            );
            Ok(())
        }
        OkrCommands::Feedback { id, comment, grade } => {
            let grade: Option<Grade> = grade
                .map(|g| g.parse::<Grade>().map_err(|e| anyhow!(e)))
                .transpose()?;
            let okr = ctx.find_okr(&id)?;
            ctx.engine
                .submit_feedback(&ctx.session()?, &okr.id, &comment, grade)?;
            println!("Feedback recorded on {}", short_id(&okr.id));
            Ok(())
        }
        OkrCommands::Veto { id, reason } => {
            let okr = ctx.find_okr(&id)?;
            report("Vetoed", &ctx.engine.veto(&ctx.session()?, &okr.id, &reason)?);
            Ok(())
        }
        OkrCommands::Archive { id } => {
            let okr = ctx.find_okr(&id)?;
            report("Archived", &ctx.engine.archive(&ctx.session()?, &okr.id)?);
            Ok(())
        }
        OkrCommands::Revoke { id, reason } => {
            let okr = ctx.find_okr(&id)?;
            let okr = ctx
                .engine
                .admin_revoke(&ctx.session()?, &okr.id, reason.as_deref())?;
            report("Revoked", &okr);
            Ok(())
        }
        OkrCommands::Delete { id } => {
            let okr = ctx.find_okr(&id)?;
            ctx.engine.delete_okr(&ctx.session()?, &okr.id)?;
            println!("Deleted {} \"{}\"", short_id(&okr.id), okr.title);
            Ok(())
        }
    }
}

fn run_list(
    ctx: &AppContext,
    mine: bool,
    status: Option<&str>,
    department: Option<&str>,
    json: bool,
) -> Result<()> {
    let status: Option<OkrStatus> = status
        .map(|s| s.parse::<OkrStatus>().map_err(|e| anyhow!("{}", e)))
        .transpose()?;

    let mut okrs = if mine {
        ctx.engine.list_for_owner(&ctx.session()?.actor)?
    } else {
        ctx.engine.list()?
    };
    okrs.retain(|okr| {
        status.map_or(true, |s| okr.status() == s)
            && department.map_or(true, |d| okr.department == d)
    });
    okrs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    if json {
        return print_json(&okrs);
    }
    if okrs.is_empty() {
        println!("No OKRs found.");
        return Ok(());
    }
    print_table(&OKR_HEADERS, okrs.iter().map(okr_row).collect());
    Ok(())
}

fn run_show(ctx: &AppContext, id: &str, json: bool) -> Result<()> {
    let okr = ctx.find_okr(id)?;
    if json {
        return print_json(&okr);
    }

    print_table(&OKR_HEADERS, vec![okr_row(&okr)]);

    match ctx.engine.resolve_approvers(&okr.id) {
        Ok(chain) => {
            let l2 = chain.l2.map(|r| r.to_string()).unwrap_or_else(|| "-".into());
            let l3 = chain.l3.map(|r| r.to_string()).unwrap_or_else(|| "-".into());
            println!("Approvers: L1 {} / L2 {} / L3 {}", chain.l1, l2, l3);
        }
        Err(e) => println!("Approvers: unresolved ({})", e),
    }
    if let Some(reason) = &okr.adjustment_reason {
        println!("Adjustment: {}", reason);
    }

    let mut rows = Vec::new();
    for objective in &okr.objectives {
        rows.push(vec![
            format!("O: {}", objective.content),
            format!("{:.0}", objective.weight),
            format_score(objective.self_score),
            format_score(objective.manager_score),
        ]);
        for kr in &objective.key_results {
            rows.push(vec![
                format!("  KR: {}", kr.content),
                format!("{:.0}", kr.weight),
                format_score(kr.self_score),
                format_score(kr.manager_score),
            ]);
        }
    }
    if !rows.is_empty() {
        print_table(&["Item", "Weight", "Self", "Grader"], rows);
    }

    if !okr.cc_feedback.is_empty() {
        let rows = okr
            .cc_feedback
            .iter()
            .map(|f| {
                vec![
                    format!("{} ({})", f.user_name, f.role),
                    format_grade(f.recommended_grade),
                    f.comment.clone(),
                ]
            })
            .collect();
        print_table(&["From", "Grade", "Feedback"], rows);
    }

    let history = okr.lifecycle.history();
    if !history.is_empty() {
        let rows = history
            .iter()
            .map(|t| {
                vec![
                    format_timestamp(t.timestamp),
                    format!("{} -> {}", t.from, t.to),
                    t.actor.clone().unwrap_or_default(),
                    t.reason.clone().unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&["When", "Change", "By", "Reason"], rows);
    }
    Ok(())
}
