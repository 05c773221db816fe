use crate::output::{print_json, print_table};
use clap::Subcommand;
use scheduler_core::record::{RunRecord, RunTrigger};
use scheduler_core::workflow::{RunReport, RunStatus};
use std::path::Path;

#[derive(Subcommand)]
pub enum RunsSubcommand {
    /// List the most recent runs, newest first
    List {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show one run by id or unique id prefix
    Show { id: String },
}

pub fn run(
    root: &Path,
    config: Option<&Path>,
    subcmd: RunsSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(root, config)?;
    let store = super::open_store(root, &config)?;

    match subcmd {
        RunsSubcommand::List { limit } => {
            let records = store.list_recent(limit)?;
            if json {
                return print_json(&records);
            }
            if records.is_empty() {
                println!("No runs recorded.");
                return Ok(());
            }
            let rows = records.iter().map(row).collect();
            print_table(
                &["ID", "STARTED", "TRIGGER", "DIRECTION", "STATUS", "REASON"],
                rows,
            );
            Ok(())
        }
        RunsSubcommand::Show { id } => {
            let record = store.get(&id)?;
            if json {
                return print_json(&record);
            }
            show(&record);
            Ok(())
        }
    }
}

fn trigger_label(trigger: &RunTrigger) -> &'static str {
    match trigger {
        RunTrigger::Scheduled { .. } => "scheduled",
        RunTrigger::Manual => "manual",
    }
}

fn row(record: &RunRecord) -> Vec<String> {
    let mut id = record.id.to_string();
    id.truncate(8);
    vec![
        id,
        record.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        trigger_label(&record.trigger).to_string(),
        record
            .direction
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into()),
        record.status.label().to_string(),
        match &record.status {
            RunStatus::Failed { reason } => reason.to_string(),
            RunStatus::Running | RunStatus::Succeeded => String::new(),
        },
    ]
}

fn show(record: &RunRecord) {
    match record.finished_at {
        Some(finished_at) => {
            println!("Trigger:   {}", trigger_label(&record.trigger));
            super::run::print_report(&RunReport {
                run_id: record.id,
                started_at: record.started_at,
                finished_at,
                direction: record.direction,
                states: record.states.clone(),
                steps: record.steps.clone(),
                status: record.status.clone(),
            });
        }
        None => {
            println!("Run:       {}", record.id);
            println!("Trigger:   {}", trigger_label(&record.trigger));
            println!("Status:    {}", record.status.label());
            println!("Started:   {}", record.started_at.to_rfc3339());
        }
    }
}
