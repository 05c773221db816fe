//! Persistent storage for run records using redb.
//!
//! # Table design
//!
//! A single `RUNS` table uses a 24-byte composite key:
//! ```text
//! [ started_at_ms: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//! ```
//!
//! Byte ordering equals start-time ordering, so a reverse scan yields the
//! newest runs first. The key never changes over a record's lifetime; an
//! update rewrites the value under the same key.
//!
//! # Locking
//!
//! redb holds an exclusive lock on the file for as long as a `Database` is
//! open. `RunStore` keeps only the path and opens the database for the
//! duration of each operation, so a long-running daemon and short-lived
//! `runs` / `run` commands can share one file. An open that finds the lock
//! taken is retried for up to [`LOCK_WAIT`].

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use redb::{Database, DatabaseError, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::workflow::{FailureReason, RunStatus, WorkflowState};

use super::run::RunRecord;

// ---------------------------------------------------------------------------
// Table definition
// ---------------------------------------------------------------------------

/// Key: 24-byte composite (started_at_ms big-endian ++ uuid bytes)
/// Value: JSON-encoded RunRecord
const RUNS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("runs");

/// How long an operation waits for another holder of the file lock.
pub const LOCK_WAIT: Duration = Duration::from_secs(5);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(20);

fn run_key(ts: DateTime<Utc>, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = ts.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

fn store_err(e: impl std::fmt::Display) -> SchedulerError {
    SchedulerError::RunStore(e.to_string())
}

// ---------------------------------------------------------------------------
// RunStore
// ---------------------------------------------------------------------------

/// Persistent store for `RunRecord`s. Audit output only: nothing read from it
/// ever feeds a workflow run.
#[derive(Debug, Clone)]
pub struct RunStore {
    path: PathBuf,
}

impl RunStore {
    /// Create the redb database at `path` if needed (with parent directories
    /// and the `RUNS` table). The file is not held open afterwards.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self {
            path: path.to_path_buf(),
        };
        let db = store.db()?;
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(RUNS).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the database for one operation, waiting out a concurrent holder.
    fn db(&self) -> Result<Database> {
        let deadline = Instant::now() + LOCK_WAIT;
        loop {
            match Database::create(&self.path) {
                Ok(db) => return Ok(db),
                Err(DatabaseError::DatabaseAlreadyOpen) if Instant::now() < deadline => {
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(store_err(e)),
            }
        }
    }

    /// Insert `record`, overwriting any entry with the same start time and id.
    pub fn insert(&self, record: &RunRecord) -> Result<()> {
        let key = run_key(record.started_at, record.id);
        let value = serde_json::to_vec(record)?;
        let db = self.db()?;
        let wt = db.begin_write().map_err(store_err)?;
        {
            let mut table = wt.open_table(RUNS).map_err(store_err)?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    /// Persist the terminal state of a run previously written by
    /// [`insert`](Self::insert).
    pub fn finish(&self, record: &RunRecord) -> Result<()> {
        let key = run_key(record.started_at, record.id);
        let value = serde_json::to_vec(record)?;
        let db = self.db()?;
        let wt = db.begin_write().map_err(store_err)?;
        {
            let mut table = wt.open_table(RUNS).map_err(store_err)?;
            let exists = table.get(key.as_slice()).map_err(store_err)?.is_some();
            if !exists {
                return Err(SchedulerError::RunNotFound(record.id.to_string()));
            }
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    /// Look a run up by full id or by a unique prefix of its textual form.
    pub fn get(&self, id_or_prefix: &str) -> Result<RunRecord> {
        let needle = id_or_prefix.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Err(SchedulerError::RunNotFound(id_or_prefix.to_string()));
        }
        let mut matches = self
            .list_all()?
            .into_iter()
            .filter(|r| r.id.to_string().starts_with(&needle));
        match (matches.next(), matches.next()) {
            (Some(record), None) => Ok(record),
            (Some(_), Some(_)) => Err(SchedulerError::AmbiguousRunId(id_or_prefix.to_string())),
            (None, _) => Err(SchedulerError::RunNotFound(id_or_prefix.to_string())),
        }
    }

    /// The `limit` most recently started runs, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let db = self.db()?;
        let rt = db.begin_read().map_err(store_err)?;
        let table = rt.open_table(RUNS).map_err(store_err)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(store_err)?.rev() {
            if result.len() >= limit {
                break;
            }
            let (_, v) = entry.map_err(store_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    /// All runs, oldest first.
    pub fn list_all(&self) -> Result<Vec<RunRecord>> {
        let db = self.db()?;
        let rt = db.begin_read().map_err(store_err)?;
        let table = rt.open_table(RUNS).map_err(store_err)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    /// On trigger startup, mark any `Running` record not updated within
    /// `max_age` as `Failed`: the process that owned it is gone.
    ///
    /// Returns the number of records recovered.
    pub fn startup_recovery(&self, max_age: Duration) -> Result<u32> {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).map_err(store_err)?;

        let mut count = 0u32;
        for mut record in self.list_all()? {
            if record.is_running() && record.updated_at < cutoff {
                let in_flight = record
                    .states
                    .last()
                    .copied()
                    .unwrap_or(WorkflowState::Init);
                record.states.push(WorkflowState::Failed);
                record.status = RunStatus::Failed {
                    reason: FailureReason::Interrupted { in_flight },
                };
                record.updated_at = Utc::now();
                record.finished_at = Some(record.updated_at);
                self.finish(&record)?;
                count += 1;
            }
        }
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::run::RunTrigger;
    use chrono::Duration as CDur;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RunStore) {
        let dir = TempDir::new().unwrap();
        let store = RunStore::open(&dir.path().join("nested/runs.db")).unwrap();
        (dir, store)
    }

    fn record_at(ts: DateTime<Utc>) -> RunRecord {
        let mut r = RunRecord::started(RunTrigger::Scheduled { fire_at: ts });
        r.started_at = ts;
        r.updated_at = ts;
        r
    }

    #[test]
    fn insert_then_get_by_id_and_prefix() {
        let (_dir, store) = open_tmp();
        let record = record_at(Utc::now());
        store.insert(&record).unwrap();

        let full = store.get(&record.id.to_string()).unwrap();
        assert_eq!(full.id, record.id);
        let prefix = &record.id.to_string()[..8];
        assert_eq!(store.get(prefix).unwrap().id, record.id);
    }

    #[test]
    fn find_unknown_is_not_found() {
        let (_dir, store) = open_tmp();
        let err = store.get("deadbeef").unwrap_err();
        assert!(matches!(err, SchedulerError::RunNotFound(_)));
        assert!(store.get("").is_err());
    }

    #[test]
    fn finish_overwrites_in_place() {
        let (_dir, store) = open_tmp();
        let mut record = record_at(Utc::now());
        store.insert(&record).unwrap();

        record.status = RunStatus::Succeeded;
        record.states.push(WorkflowState::Succeeded);
        store.finish(&record).unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, RunStatus::Succeeded);
    }

    #[test]
    fn finish_without_insert_is_not_found() {
        let (_dir, store) = open_tmp();
        let record = record_at(Utc::now());
        let err = store.finish(&record).unwrap_err();
        assert!(matches!(err, SchedulerError::RunNotFound(_)));
    }

    #[test]
    fn list_recent_is_newest_first_and_limited() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        for offset in [30, 0, 10] {
            store.insert(&record_at(now - CDur::minutes(offset))).unwrap();
        }

        let recent = store.list_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].started_at > recent[1].started_at);
        assert_eq!(recent[0].started_at.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn startup_recovery_fails_stale_running_records() {
        let (_dir, store) = open_tmp();
        let stale = record_at(Utc::now() - CDur::minutes(30));
        store.insert(&stale).unwrap();

        let recovered = store.startup_recovery(Duration::from_secs(20 * 60)).unwrap();
        assert_eq!(recovered, 1);

        let record = store.get(&stale.id.to_string()).unwrap();
        match &record.status {
            RunStatus::Failed {
                reason: FailureReason::Interrupted { in_flight },
            } => assert_eq!(*in_flight, WorkflowState::Init),
            other => panic!("expected Interrupted, got {other:?}"),
        }
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn startup_recovery_leaves_recent_and_finished_runs_alone() {
        let (_dir, store) = open_tmp();
        let fresh = record_at(Utc::now() - CDur::seconds(5));
        store.insert(&fresh).unwrap();

        let mut done = record_at(Utc::now() - CDur::hours(2));
        done.status = RunStatus::Succeeded;
        store.insert(&done).unwrap();

        assert_eq!(store.startup_recovery(Duration::from_secs(1200)).unwrap(), 0);
        assert!(store.get(&fresh.id.to_string()).unwrap().is_running());
    }

    #[test]
    fn empty_store_lists_nothing() {
        let (_dir, store) = open_tmp();
        assert!(store.list_recent(10).unwrap().is_empty());
        assert_eq!(store.startup_recovery(Duration::from_secs(60)).unwrap(), 0);
    }

    #[test]
    fn two_handles_share_one_file() {
        let (dir, first) = open_tmp();
        let second = RunStore::open(&dir.path().join("nested/runs.db")).unwrap();

        let mut record = record_at(Utc::now());
        first.insert(&record).unwrap();
        assert!(second.get(&record.id.to_string()).unwrap().is_running());

        record.status = RunStatus::Succeeded;
        second.finish(&record).unwrap();
        assert_eq!(first.list_recent(5).unwrap()[0].status, RunStatus::Succeeded);
    }

    #[test]
    fn operations_wait_for_a_concurrent_holder() {
        let (_dir, store) = open_tmp();
        store.insert(&record_at(Utc::now())).unwrap();

        // Hold the file lock the way another process's open Database would.
        let held = Database::create(store.path()).unwrap();
        let holder = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            drop(held);
        });

        let records = store.list_recent(10).unwrap();
        assert_eq!(records.len(), 1);
        holder.join().unwrap();
    }
}
