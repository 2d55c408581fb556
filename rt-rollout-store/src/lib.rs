#![doc = include_str!("../README.md")]

pub mod error;
pub mod policy;
pub mod store;
pub mod types;

pub use error::*;
pub use policy::*;
pub use store::*;
pub use types::*;
