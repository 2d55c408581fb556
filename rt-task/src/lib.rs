#![doc = include_str!("../README.md")]

pub mod error;
pub mod task;

pub use error::TaskError;
pub use task::{TaskOptions, TaskOutcome, TaskRunner, COMPACTION_THRESHOLD, MAX_TURNS};
