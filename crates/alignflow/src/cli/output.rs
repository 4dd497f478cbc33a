//! Output formatting utilities for CLI commands
//!
//! Provides consistent formatting for:
//! - Tables with column alignment
//! - Scores, grades and statuses
//! - Timestamps

use alignflow_engine::{Grade, Okr, OkrId};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

/// Pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// First eight characters of an id
pub fn short_id(id: &OkrId) -> String {
    id.as_str().chars().take(8).collect()
}

/// One decimal, or "-" when unset
pub fn format_score(score: Option<f64>) -> String {
    score.map(|s| format!("{:.1}", s)).unwrap_or_else(|| "-".to_string())
}

pub fn format_grade(grade: Option<Grade>) -> String {
    grade.map(|g| g.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Status with the archive axis folded in
pub fn format_status(okr: &Okr) -> String {
    if okr.is_archived() {
        format!("{} (archived)", okr.status())
    } else {
        okr.status().to_string()
    }
}

/// Local "YYYY-MM-DD HH:MM"
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Standard row for a record list
pub fn okr_row(okr: &Okr) -> Vec<String> {
    vec![
        short_id(&okr.id),
        okr.user_name.clone(),
        okr.department.clone(),
        okr.title.clone(),
        okr.period.clone(),
        format_status(okr),
        okr.phase().to_string(),
        format_score(okr.total_score),
        format_grade(okr.final_grade),
    ]
}

pub const OKR_HEADERS: [&str; 9] = [
    "ID", "Owner", "Department", "Title", "Period", "Status", "Phase", "Score", "Grade",
];

#[cfg(test)]
mod tests {
    use super::*;
    use alignflow_engine::{Lifecycle, OkrLevel, OkrStatus, Role, User, UserId};

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(None), "-");
        assert_eq!(format_score(Some(86.0)), "86.0");
        assert_eq!(format_score(Some(92.24)), "92.2");
    }

    #[test]
    fn test_format_grade() {
        assert_eq!(format_grade(None), "-");
        assert_eq!(format_grade(Some(Grade::S)), "S");
    }

    #[test]
    fn test_okr_row_shows_phase() {
        let owner = User::new(UserId::parse("e1").unwrap(), "Erin", Role::RdEmployee, "Crypto");
        let mut okr = Okr::draft(&owner, OkrLevel::Personal);
        let row = okr_row(&okr);
        assert_eq!(row.len(), OKR_HEADERS.len());
        assert_eq!(row[5], "DRAFT");
        assert_eq!(row[6], "drafting");

        okr.lifecycle = Lifecycle::from_state(OkrStatus::Published, true);
        let row = okr_row(&okr);
        assert_eq!(row[5], "PUBLISHED (archived)");
        assert_eq!(row[6], "closed");
    }

    #[test]
    fn test_short_id() {
        let id = OkrId::new();
        let short = short_id(&id);
        assert_eq!(short.len(), 8);
        assert!(id.as_str().starts_with(&short));
    }
}
