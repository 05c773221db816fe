pub mod config;
pub mod daemon;
pub mod init;
pub mod run;
pub mod runs;

use anyhow::Context;
use scheduler_core::{config::SchedulerConfig, paths, record::RunStore};
use std::path::{Path, PathBuf};

/// Path of the config file: `--config` if given, else the default under `root`.
pub fn config_file(root: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) => paths::resolve(root, p),
        None => paths::config_path(root),
    }
}

pub fn load_config(root: &Path, explicit: Option<&Path>) -> anyhow::Result<SchedulerConfig> {
    let path = config_file(root, explicit);
    SchedulerConfig::load_file(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

pub fn open_store(root: &Path, config: &SchedulerConfig) -> anyhow::Result<RunStore> {
    let path = config.store_path(root);
    RunStore::open(&path).with_context(|| format!("failed to open run store {}", path.display()))
}
