//! Evolutionary search that approximates a target image with shapes.
//!
//! # Overview
//!
//! - **Genome Operations** (`genome`): Random generation, crossover, and mutation
//! - **Fitness** (`fitness`): Scores a rendered canvas against the target
//! - **Population** (`population`): Roulette-wheel normalization and selection
//! - **Driver** (`search`): The generation loop
//! - **Snapshots** (`snapshot`): Persisting the best render of a generation
//!
//! # Example
//!
//! ```rust,no_run
//! use shape_evolve::compute::Canvas;
//! use shape_evolve::compute::evolution::{EvolutionEngine, PngSnapshotWriter};
//! use shape_evolve::schema::EvolutionConfig;
//!
//! let config = EvolutionConfig::default();
//! let target = Canvas::load("target.png")?;
//! let mut sink = PngSnapshotWriter::from_config(&config.snapshot)?;
//!
//! let mut engine = EvolutionEngine::new(config, target)?;
//! let result = engine.run_with_callback(
//!     |progress| println!("Generation {}: best = {:.4}", progress.generation, progress.best_fitness),
//!     &mut sink,
//! )?;
//! println!("Best fitness: {:.4}", result.best.fitness);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod fitness;
mod genome;
mod population;
mod search;
mod snapshot;

pub use fitness::{FitnessEvaluator, MAX_FITNESS};
pub use genome::GenomeRng;
pub use population::{Candidate, FITNESS_FLOOR, FitnessSummary, Population};
pub use search::EvolutionEngine;
pub use snapshot::{PngSnapshotWriter, Snapshot, SnapshotError, SnapshotSink};

use crate::compute::CanvasError;
use crate::schema::EvolutionConfigError;

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] EvolutionConfigError),
    #[error("Canvas error: {0}")]
    Canvas(#[from] CanvasError),
    #[error("Snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("Failed to build evaluation pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Generation {generation} has degenerate total fitness {total}")]
    DegenerateFitness { generation: usize, total: f64 },
}
