#![doc = include_str!("../README.md")]

pub mod config;
pub mod cursor;
pub mod error;
pub mod event;
pub mod ids;
pub mod items;
pub mod submission;
pub mod token_usage;
pub mod traits;

pub use config::*;
pub use cursor::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use items::*;
pub use submission::*;
pub use token_usage::*;
pub use traits::*;
