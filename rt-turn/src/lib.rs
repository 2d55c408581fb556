#![doc = include_str!("../README.md")]

pub mod error;
pub mod turn;

pub use error::TurnError;
pub use turn::{run_turn, ProcessedResponseItem, TurnRunResult};
