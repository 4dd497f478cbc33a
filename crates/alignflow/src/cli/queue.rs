//! Work queue and team board commands

use crate::cli::context::AppContext;
use crate::cli::output::{format_status, okr_row, print_json, print_table, short_id, OKR_HEADERS};
use alignflow_engine::{queue::badge_counts, BatchGate, BoardScope, Okr};
use anyhow::{anyhow, Result};
use serde_json::json;

pub fn run_queue(ctx: &AppContext, json: bool) -> Result<()> {
    let session = ctx.session()?;
    let items = ctx.engine.actionable_items_for(&session.actor)?;
    let badges = badge_counts(&items);

    if json {
        return print_json(&json!({
            "user": session.actor.id,
            "badges": badges,
            "items": items,
        }));
    }

    if items.is_empty() {
        println!("Nothing waiting for {}.", session.actor.name);
        return Ok(());
    }
    let rows = items
        .iter()
        .map(|item| {
            vec![
                item.kind.to_string(),
                short_id(&item.okr.id),
                item.okr.user_name.clone(),
                item.okr.title.clone(),
                format_status(&item.okr),
            ]
        })
        .collect();
    print_table(&["Kind", "ID", "Owner", "Title", "Status"], rows);
    println!(
        "Approvals: {}  Assessments: {}",
        badges.approvals, badges.assessments
    );
    Ok(())
}

fn print_section(title: &str, okrs: &[Okr]) {
    println!("{} ({})", title, okrs.len());
    if !okrs.is_empty() {
        print_table(&OKR_HEADERS, okrs.iter().map(okr_row).collect());
    }
}

pub fn run_board(ctx: &AppContext, scope: &str, json: bool) -> Result<()> {
    let scope: BoardScope = scope.parse().map_err(|e: String| anyhow!(e))?;
    let session = ctx.session()?;
    let board = ctx.engine.team_board(&session.actor, scope)?;
    let gate = board.gate();

    if json {
        return print_json(&json!({
            "scope": scope,
            "gate": gate,
            "board": board,
        }));
    }

    print_section("Awaiting self-assessment", &board.awaiting_self_assessment);
    print_section("Awaiting your score", &board.awaiting_scoring);
    print_section("Scored, ready to submit", &board.scored_awaiting_submission);
    print_section("With higher approvers", &board.awaiting_higher_approval);

    match gate {
        BatchGate::Ready { count } => {
            println!("Batch approval ready for {} records: alignflow batch approve", count)
        }
        BatchGate::Blocked { awaiting_scoring } => {
            println!("Batch approval blocked: {} records still need a score", awaiting_scoring)
        }
        BatchGate::Empty => println!("Nothing to batch approve."),
    }
    Ok(())
}
