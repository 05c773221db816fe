pub mod config;
pub mod error;
pub mod io;
pub mod paths;
pub mod record;
pub mod schedule;
pub mod trigger;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use error::{Result, SchedulerError};
