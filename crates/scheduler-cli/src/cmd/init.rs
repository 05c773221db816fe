use anyhow::Context;
use scheduler_core::{
    config::{Collaborators, SchedulerConfig},
    io, paths,
};
use std::path::Path;

/// Weekday mornings, 08:00 UTC.
const DEFAULT_SCHEDULE: &str = "cron(0 8 ? * MON-FRI *)";

const GITIGNORE: &str = "runs.db\n";

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing scheduler in: {}", root.display());

    let dir = paths::scheduler_dir(root);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    if !config_path.exists() {
        let cfg = SchedulerConfig::new(
            Collaborators {
                policy: "http://localhost:8080/policy".into(),
                filter_out: "http://localhost:8080/filter-out".into(),
                start_stop: "http://localhost:8080/start-stop".into(),
            },
            DEFAULT_SCHEDULE,
        );
        cfg.save(&config_path)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    let ignore_path = dir.join(".gitignore");
    let created = io::write_if_missing(&ignore_path, GITIGNORE.as_bytes())
        .context("failed to write .gitignore")?;
    if created {
        println!("  created: {}/.gitignore", paths::SCHEDULER_DIR);
    }

    println!("\nEdit {} to point at your collaborators, then run 'scheduler config validate'.", paths::CONFIG_FILE);
    Ok(())
}
