//! `alignflow config` - resolved settings
//!
//! All paths default to ~/.alignflow/ unless ALIGNFLOW_HOME is set.

use crate::cli::context::Paths;
use crate::cli::output::{print_json, print_table};
use alignflow_engine::EngineConfig;
use alignflow_logging::{alignflow_home, logs_dir};
use anyhow::{Context, Result};

pub fn run(paths: &Paths, json: bool) -> Result<()> {
    let config = EngineConfig::load_or_default(&paths.config)
        .with_context(|| format!("Failed to load config: {}", paths.config.display()))?;

    if json {
        return print_json(&serde_json::json!({
            "home": alignflow_home(),
            "config_path": paths.config,
            "config_exists": paths.config.exists(),
            "org_path": paths.org,
            "logs_dir": logs_dir(),
            "config": config,
        }));
    }

    print_table(
        &["Setting", "Value"],
        vec![
            vec!["Home".into(), alignflow_home().display().to_string()],
            vec![
                "Config".into(),
                format!(
                    "{} [{}]",
                    paths.config.display(),
                    if paths.config.exists() { "found" } else { "not found, using defaults" }
                ),
            ],
            vec!["Organization".into(), paths.org.display().to_string()],
            vec!["OKR store".into(), config.storage.okr_dir().display().to_string()],
            vec!["Audit log".into(), config.storage.audit_log.display().to_string()],
            vec!["Logs".into(), logs_dir().display().to_string()],
            vec![
                "Fallback approver".into(),
                config.roles.fallback_approver.to_string(),
            ],
            vec![
                "Fallback grade".into(),
                config.grading.fallback_grade.to_string(),
            ],
        ],
    );

    let bands = config
        .grading
        .bands
        .iter()
        .map(|band| {
            vec![
                band.grade.to_string(),
                format!("{:.0} - {:.0}", band.min_score, band.max_score),
                if band.quota > 0.0 {
                    format!("{:.0}%", band.quota)
                } else {
                    "-".to_string()
                },
            ]
        })
        .collect();
    print_table(&["Grade", "Score range", "Quota"], bands);

    if !paths.config.exists() {
        let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
        println!("\nNo config file yet. Defaults in effect:\n\n{}", rendered);
    }
    Ok(())
}
