use crate::error::{Result, SchedulerError};
use crate::paths;
use crate::schedule::Schedule;
use crate::workflow::{InstanceType, WorkflowInput};
use chrono::Utc;
use remote_task::Address;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Addresses of the three external collaborators.
///
/// The `lambda_functions` / `*_arn` aliases accept configs written for the
/// earlier cloud deployment unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborators {
    #[serde(alias = "policy_arn")]
    pub policy: String,
    #[serde(alias = "filter_out_arn")]
    pub filter_out: String,
    #[serde(alias = "start_stop_arn")]
    pub start_stop: String,
}

impl Collaborators {
    fn named(&self) -> [(&'static str, &str); 3] {
        [
            ("policy", &self.policy),
            ("filter_out", &self.filter_out),
            ("start_stop", &self.start_stop),
        ]
    }
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_oracle_seconds")]
    pub policy_seconds: u64,
    #[serde(default = "default_oracle_seconds")]
    pub filter_seconds: u64,
    #[serde(default = "default_rds_seconds")]
    pub rds_seconds: u64,
    #[serde(default = "default_ec2_seconds")]
    pub ec2_seconds: u64,
    #[serde(default = "default_run_seconds")]
    pub run_seconds: u64,
}

fn default_oracle_seconds() -> u64 {
    3 * 60
}

fn default_rds_seconds() -> u64 {
    15 * 60
}

fn default_ec2_seconds() -> u64 {
    5 * 60
}

fn default_run_seconds() -> u64 {
    20 * 60
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            policy_seconds: default_oracle_seconds(),
            filter_seconds: default_oracle_seconds(),
            rds_seconds: default_rds_seconds(),
            ec2_seconds: default_ec2_seconds(),
            run_seconds: default_run_seconds(),
        }
    }
}

impl Timeouts {
    pub fn policy(&self) -> Duration {
        Duration::from_secs(self.policy_seconds)
    }

    pub fn filter(&self) -> Duration {
        Duration::from_secs(self.filter_seconds)
    }

    pub fn for_kind(&self, kind: InstanceType) -> Duration {
        match kind {
            InstanceType::Rds => Duration::from_secs(self.rds_seconds),
            InstanceType::Ec2 => Duration::from_secs(self.ec2_seconds),
        }
    }

    pub fn run(&self) -> Duration {
        Duration::from_secs(self.run_seconds)
    }

    fn named(&self) -> [(&'static str, u64); 5] {
        [
            ("policy_seconds", self.policy_seconds),
            ("filter_seconds", self.filter_seconds),
            ("rds_seconds", self.rds_seconds),
            ("ec2_seconds", self.ec2_seconds),
            ("run_seconds", self.run_seconds),
        ]
    }
}

// ---------------------------------------------------------------------------
// OverlapPolicy
// ---------------------------------------------------------------------------

/// What the trigger does when a tick fires while an earlier run is still in
/// flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Start the new run regardless.
    #[default]
    Allow,
    /// Skip the tick.
    Skip,
}

// ---------------------------------------------------------------------------
// SchedulerConfig (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(alias = "lambda_functions")]
    pub collaborators: Collaborators,
    #[serde(alias = "cron")]
    pub schedule: String,
    #[serde(default)]
    pub input: WorkflowInput,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub overlap: OverlapPolicy,
    /// Run-record database; relative paths resolve against the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,
}

impl SchedulerConfig {
    pub fn new(collaborators: Collaborators, schedule: impl Into<String>) -> Self {
        Self {
            collaborators,
            schedule: schedule.into(),
            input: WorkflowInput::new(),
            timeouts: Timeouts::default(),
            overlap: OverlapPolicy::default(),
            store: None,
        }
    }

    /// Load from `path`.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SchedulerError::NotInitialized(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: SchedulerConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load from the default location under `root`.
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_file(&paths::config_path(root))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn parsed_schedule(&self) -> Result<Schedule> {
        Schedule::parse(&self.schedule)
    }

    pub fn store_path(&self, root: &Path) -> PathBuf {
        match &self.store {
            Some(p) => paths::resolve(root, p),
            None => paths::runs_db_path(root),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let error = |message: String| ConfigWarning {
            level: WarnLevel::Error,
            message,
        };
        let warning = |message: String| ConfigWarning {
            level: WarnLevel::Warning,
            message,
        };

        // 1. Every collaborator address must parse; executables should resolve
        for (name, raw) in self.collaborators.named() {
            match Address::parse(raw) {
                Err(_) => warnings.push(error(format!(
                    "collaborator '{name}' has an empty or invalid address"
                ))),
                Ok(addr) => {
                    if let Some(program) = addr.program() {
                        if which::which(program).is_err() {
                            warnings.push(warning(format!(
                                "collaborator '{name}': executable '{}' not found",
                                program.display()
                            )));
                        }
                    }
                }
            }
        }

        // 2. Timeouts must be non-zero
        for (name, secs) in self.timeouts.named() {
            if secs == 0 {
                warnings.push(error(format!("timeouts.{name} must be greater than zero")));
            }
        }

        // 3. A run budget no longer than a single step can never let that step
        //    reach its own timeout
        let longest_step = self
            .timeouts
            .rds_seconds
            .max(self.timeouts.ec2_seconds)
            .max(self.timeouts.policy_seconds)
            .max(self.timeouts.filter_seconds);
        if self.timeouts.run_seconds > 0 && self.timeouts.run_seconds <= longest_step {
            warnings.push(warning(format!(
                "timeouts.run_seconds={} is not longer than the longest step timeout ({}s)",
                self.timeouts.run_seconds, longest_step
            )));
        }

        // 4. Schedule must parse; surface the overlap risk
        match self.parsed_schedule() {
            Err(e) => warnings.push(error(e.to_string())),
            Ok(schedule) => match schedule.shortest_gap(Utc::now()) {
                None => warnings.push(warning(format!(
                    "schedule '{}' has no upcoming fire times",
                    self.schedule
                ))),
                Some(gap) if gap < self.timeouts.run() && self.overlap == OverlapPolicy::Allow => {
                    warnings.push(warning(format!(
                        "schedule fires every {}s but a run may take up to {}s; \
                         overlapping runs can race on the same instances \
                         (set 'overlap: skip' to prevent this)",
                        gap.as_secs(),
                        self.timeouts.run_seconds
                    )));
                }
                Some(_) => {}
            },
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
