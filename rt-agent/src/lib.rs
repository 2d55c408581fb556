#![doc = include_str!("../README.md")]

pub mod agent;
pub mod error;
pub mod quota;

pub use agent::{Agent, AgentHandle, DEFAULT_QUEUE_CAPACITY};
pub use error::AgentError;
pub use quota::{QuotaWatcher, DEFAULT_POLL_INTERVAL};
