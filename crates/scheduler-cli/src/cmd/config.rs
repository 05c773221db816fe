use crate::output::print_json;
use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use scheduler_core::config::WarnLevel;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate the config for common mistakes
    Validate,

    /// Print the next fire times of the configured schedule (UTC)
    Next {
        /// Number of fire times to print
        #[arg(long, default_value = "5")]
        count: usize,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    config: Option<&Path>,
    subcmd: ConfigSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate => validate(root, config, json),
        ConfigSubcommand::Next { count } => next(root, config, count, json),
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root, config)?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// next
// ---------------------------------------------------------------------------

fn next(root: &Path, config: Option<&Path>, count: usize, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root, config)?;
    let schedule = config
        .parsed_schedule()
        .context("failed to parse schedule")?;
    let times = schedule.upcoming(Utc::now(), count);

    if json {
        let value = serde_json::json!({
            "schedule": schedule.expr(),
            "next": times,
        });
        return print_json(&value);
    }

    println!("Schedule: {}", schedule.expr());
    if times.is_empty() {
        println!("No upcoming fire times.");
    }
    for t in &times {
        println!("  {}", t.format("%Y-%m-%d %H:%M:%S UTC (%a)"));
    }
    Ok(())
}
