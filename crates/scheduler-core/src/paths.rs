use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SCHEDULER_DIR: &str = ".scheduler";
pub const CONFIG_FILE: &str = ".scheduler/config.yaml";
pub const RUNS_DB_FILE: &str = ".scheduler/runs.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn scheduler_dir(root: &Path) -> PathBuf {
    root.join(SCHEDULER_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn runs_db_path(root: &Path) -> PathBuf {
    root.join(RUNS_DB_FILE)
}

/// Resolve a configured path relative to the project root. Absolute paths
/// are returned unchanged.
pub fn resolve(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}
