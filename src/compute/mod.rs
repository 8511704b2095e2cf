//! Compute module - Rasterization and evolutionary search.

mod canvas;
mod raster;

pub mod evolution;

pub use canvas::*;
pub use raster::*;
