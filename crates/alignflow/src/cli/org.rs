//! Workflow registry and approver resolution commands

use crate::cli::context::AppContext;
use crate::cli::output::{print_json, print_table};
use alignflow_engine::{ApprovalWorkflow, Role, TeamResponsible, User};
use anyhow::{Context, Result};
use serde_json::json;

fn role_cell(role: Option<&Role>) -> String {
    role.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string())
}

fn user_json(user: &User) -> serde_json::Value {
    json!({
        "id": user.id,
        "name": user.name,
        "role": user.role,
        "department": user.department,
    })
}

pub fn run_workflows(ctx: &AppContext, json: bool) -> Result<()> {
    let registry = ctx.engine.registry();
    let mut entries: Vec<&ApprovalWorkflow> = registry.entries().collect();
    entries.sort_by(|a, b| a.target_role.cmp(&b.target_role));

    if json {
        return print_json(&json!({
            "fallback_approver": registry.fallback_approver(),
            "workflows": entries,
        }));
    }

    let rows = entries
        .iter()
        .map(|wf| {
            let cc = wf
                .cc_roles
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            vec![
                wf.target_role.to_string(),
                wf.approver_role_l1.to_string(),
                role_cell(wf.approver_role_l2.as_ref()),
                role_cell(wf.approver_role_l3.as_ref()),
                if cc.is_empty() { "-".to_string() } else { cc },
            ]
        })
        .collect();
    print_table(&["Target", "L1", "L2", "L3", "CC"], rows);
    println!(
        "Roles without an entry go to {} for approval.",
        registry.fallback_approver()
    );
    Ok(())
}

pub fn run_resolve(ctx: &AppContext, role: &str, department: &str, json: bool) -> Result<()> {
    let role: Role = role
        .parse()
        .with_context(|| format!("Invalid role: {}", role))?;
    let resolved = ctx.engine.resolve_users(&role, department)?;

    if json {
        return print_json(&json!({
            "role": role,
            "department": department,
            "user": user_json(&resolved.user),
            "scope": resolved.scope,
            "designated": resolved.designated,
            "candidates": resolved.candidates,
        }));
    }

    let label = ctx.directory.catalog().label(&role);
    print_table(
        &["Field", "Value"],
        vec![
            vec!["Role".into(), format!("{} ({})", role, label)],
            vec![
                "User".into(),
                format!("{} ({})", resolved.user.name, resolved.user.id),
            ],
            vec!["Department".into(), resolved.user.department.clone()],
            vec!["Found in".into(), resolved.scope.to_string()],
            vec![
                "Designated primary".into(),
                if resolved.designated { "yes" } else { "no" }.to_string(),
            ],
            vec!["Candidates".into(), resolved.candidates.len().to_string()],
        ],
    );
    Ok(())
}

pub fn run_responsible(ctx: &AppContext, department: &str, json: bool) -> Result<()> {
    let responsible = ctx.engine.team_responsible(department)?;

    if json {
        let value = match &responsible {
            TeamResponsible::Resolved(user) => json!({
                "state": "resolved",
                "user": user_json(user),
            }),
            TeamResponsible::Ambiguous(users) => json!({
                "state": "ambiguous",
                "candidates": users.iter().map(user_json).collect::<Vec<_>>(),
            }),
            TeamResponsible::Unconfigured => json!({ "state": "unconfigured" }),
        };
        return print_json(&value);
    }

    match responsible {
        TeamResponsible::Resolved(user) => {
            println!("{} is headed by {} ({}, {})", department, user.name, user.id, user.role);
        }
        TeamResponsible::Ambiguous(users) => {
            println!("{} has several heads and none is designated primary:", department);
            let rows = users
                .iter()
                .map(|u| vec![u.id.to_string(), u.name.clone(), u.role.to_string()])
                .collect();
            print_table(&["ID", "Name", "Role"], rows);
        }
        TeamResponsible::Unconfigured => {
            println!("Nobody heads {}", department);
        }
    }
    Ok(())
}
