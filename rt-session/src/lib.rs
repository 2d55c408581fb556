#![doc = include_str!("../README.md")]

pub mod error;
pub mod event_sink;
pub mod session;
pub mod summarizer;

pub use error::SessionError;
pub use event_sink::BoundedEventSink;
pub use session::{Session, DEFAULT_COMPACTION_TAIL};
pub use summarizer::Summarizer;
