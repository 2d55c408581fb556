#![doc = include_str!("../README.md")]

pub mod error;
pub mod registry;
pub mod validate;

pub use error::*;
pub use registry::*;
pub use validate::*;
