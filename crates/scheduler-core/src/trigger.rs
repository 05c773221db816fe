//! Periodic trigger: sleeps until each fire time of the configured schedule
//! and dispatches one workflow run per tick.
//!
//! Runs are spawned, so a slow run never delays the next tick. Whether a tick
//! may start while an earlier run is still in flight is governed by
//! [`OverlapPolicy`].

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::OverlapPolicy;
use crate::error::Result;
use crate::record::{RunRecord, RunStore, RunTrigger};
use crate::schedule::Schedule;
use crate::workflow::{RunReport, WorkflowEngine, WorkflowInput};

/// Tick counts reported when the trigger shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerSummary {
    pub fired: u64,
    pub skipped: u64,
}

/// Decrements the in-flight counter when a dispatched run ends, including
/// when its task panics or is aborted.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wall clock derived from tokio's monotonic clock, so fire times and sleeps
/// agree (also under a paused test runtime).
struct Clock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        match chrono::Duration::from_std(self.mono.elapsed()) {
            Ok(elapsed) => self.wall + elapsed,
            Err(_) => self.wall,
        }
    }

    fn instant_at(&self, at: DateTime<Utc>) -> Instant {
        match (at - self.wall).to_std() {
            Ok(offset) => self.mono + offset,
            Err(_) => self.mono,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Write {
    Start,
    Finish,
}

/// Write `record` on the blocking pool; the store may wait for its file lock.
/// Failures are logged and never affect the run.
async fn persist(store: &RunStore, record: &RunRecord, write: Write) {
    let store = store.clone();
    let owned = record.clone();
    let result = tokio::task::spawn_blocking(move || match write {
        Write::Start => store.insert(&owned),
        Write::Finish => store.finish(&owned),
    })
    .await;

    let message = match result {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    };
    tracing::warn!(run_id = %record.id, ?write, error = %message, "failed to record run");
}

pub struct Trigger {
    engine: Arc<WorkflowEngine>,
    schedule: Schedule,
    input: Arc<WorkflowInput>,
    overlap: OverlapPolicy,
    store: Option<RunStore>,
    in_flight: Arc<AtomicUsize>,
}

impl Trigger {
    /// Schedule, input and overlap policy are read once from the engine's
    /// configuration.
    pub fn new(engine: Arc<WorkflowEngine>) -> Result<Self> {
        let config = engine.config();
        let schedule = config.parsed_schedule()?;
        let input = Arc::new(config.input.clone());
        let overlap = config.overlap;
        Ok(Self {
            engine,
            schedule,
            input,
            overlap,
            store: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Record every dispatched run in `store`. The store file is only
    /// locked while a record is written, so other processes can read it.
    pub fn with_store(mut self, store: RunStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Number of dispatched runs that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Dispatch one run for the tick due at `fire_at`.
    ///
    /// Returns `None` when the tick is skipped under [`OverlapPolicy::Skip`].
    pub fn fire(&self, fire_at: DateTime<Utc>) -> Option<JoinHandle<RunReport>> {
        let previous = self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(self.in_flight.clone());
        if previous > 0 && self.overlap == OverlapPolicy::Skip {
            tracing::warn!(%fire_at, in_flight = previous, "previous run still in flight, skipping tick");
            return None;
        }

        let engine = self.engine.clone();
        let input = self.input.clone();
        let store = self.store.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            let mut record = RunRecord::started(RunTrigger::Scheduled { fire_at });
            if let Some(store) = &store {
                persist(store, &record, Write::Start).await;
            }

            let report = engine.run_with_id(record.id, &input).await;

            if let Some(store) = &store {
                record.complete(&report);
                persist(store, &record, Write::Finish).await;
            }
            report
        }))
    }

    /// Fire on every schedule tick until `shutdown` resolves. Runs still in
    /// flight at shutdown are left to finish on the runtime.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<TriggerSummary>
    where
        F: Future<Output = ()>,
    {
        if let Some(store) = &self.store {
            let recovered = store.startup_recovery(self.engine.config().timeouts.run())?;
            if recovered > 0 {
                tracing::warn!(recovered, "marked interrupted runs as failed");
            }
        }

        let clock = Clock::start();
        let mut anchor = clock.now();
        let mut summary = TriggerSummary::default();
        tracing::info!(schedule = %self.schedule.expr(), "trigger started");

        tokio::pin!(shutdown);
        loop {
            let Some(mut next) = self.schedule.next_after(anchor) else {
                tracing::warn!(schedule = %self.schedule.expr(), "schedule has no further fire times");
                break;
            };
            let now = clock.now();
            if next < now {
                tracing::warn!(missed = %next, "fell behind schedule, skipping missed ticks");
                match self.schedule.next_after(now) {
                    Some(t) => next = t,
                    None => break,
                }
            }
            tracing::debug!(next = %next, "waiting for next tick");

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                _ = tokio::time::sleep_until(clock.instant_at(next)) => {
                    match self.fire(next) {
                        Some(_) => summary.fired += 1,
                        None => summary.skipped += 1,
                    }
                    anchor = next;
                }
            }
        }

        tracing::info!(
            fired = summary.fired,
            skipped = summary.skipped,
            in_flight = self.in_flight(),
            "trigger stopped"
        );
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
