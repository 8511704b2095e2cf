//! Schema module - Configuration, genome and result types for evolution runs.

mod config;
mod evolution;
mod shape;

pub use config::*;
pub use evolution::*;
pub use shape::*;
