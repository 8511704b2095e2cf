//! Shape Evolve - Approximating images with evolved shapes.
//!
//! A population of genomes, each an ordered list of translucent shapes, is
//! evolved toward a target raster image using fitness-proportionate
//! selection, crossover, and mutation.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, shape/genome types, and run reports
//! - `compute`: Canvas, rasterizer, and the evolution engine
//!
//! # Example
//!
//! ```rust,no_run
//! use shape_evolve::{
//!     compute::{Canvas, evolution::{EvolutionEngine, Snapshot}},
//!     schema::EvolutionConfig,
//! };
//!
//! let target = Canvas::load("target.png")?;
//! let mut config = EvolutionConfig::default();
//! config.population.max_generations = 100;
//! config.random_seed = Some(42);
//!
//! let mut snapshots: Vec<Snapshot> = Vec::new();
//! let mut engine = EvolutionEngine::new(config, target)?;
//! let result = engine.run(&mut snapshots)?;
//!
//! println!("Best fitness after 100 generations: {}", result.stats.best_fitness);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::Canvas;
pub use compute::evolution::{EvolutionEngine, EvolutionError};
pub use schema::{EvolutionConfig, Genome, Shape};
