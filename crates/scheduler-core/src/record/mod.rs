//! Run records: one persisted entry per workflow run, for audit and the
//! `runs` commands.

pub mod run;
pub mod store;

pub use run::{RunRecord, RunTrigger};
pub use store::RunStore;
