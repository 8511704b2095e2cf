//! Progress and result types reported by the evolution engine.

use serde::{Deserialize, Serialize};

use super::Genome;

/// Progress update emitted after every evaluated generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Generations evaluated so far (0 = initial population).
    pub generation: usize,
    /// Total generations planned.
    pub total_generations: usize,
    /// Best fitness seen so far.
    pub best_fitness: f64,
    /// Best fitness in the current generation.
    pub generation_best: f64,
    /// Average fitness of the current generation.
    pub avg_fitness: f64,
    /// Snapshots emitted so far.
    pub snapshots_written: usize,
    /// Current phase of the algorithm.
    pub phase: EvolutionPhase,
}

/// A scored genome, detached from the population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    /// Unique identifier.
    pub id: u64,
    /// Raw fitness score.
    pub fitness: f64,
    /// The genome.
    pub genome: Genome,
    /// Generation this candidate was created in.
    pub generation: usize,
    /// Parent IDs.
    pub parents: Vec<u64>,
}

/// Per-generation fitness history.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvolutionHistory {
    /// Best fitness per generation.
    pub best_fitness: Vec<f64>,
    /// Average fitness per generation.
    pub avg_fitness: Vec<f64>,
    /// Standard deviation per generation.
    pub fitness_std: Vec<f64>,
}

impl EvolutionHistory {
    /// Mean per-generation change of the best fitness.
    pub fn mean_best_improvement(&self) -> f64 {
        match (self.best_fitness.first(), self.best_fitness.last()) {
            (Some(first), Some(last)) if self.best_fitness.len() > 1 => {
                (last - first) / (self.best_fitness.len() - 1) as f64
            }
            _ => 0.0,
        }
    }
}

/// Phase of the generation loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    /// Creating the random initial population.
    #[default]
    Initializing,
    /// Rendering and scoring genomes.
    Evaluating,
    /// Building the roulette wheel.
    Normalizing,
    /// Rendering and persisting the best genome.
    Snapshotting,
    /// Selecting parents and producing offspring.
    Reproducing,
    /// Generation budget exhausted or stopped early.
    Done,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best candidate found.
    pub best: CandidateSnapshot,
    /// Statistics from the run.
    pub stats: EvolutionStats,
    /// Full history for analysis.
    pub history: EvolutionHistory,
}

/// Statistics from a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations evaluated.
    pub generations: usize,
    /// Total genome evaluations performed.
    pub total_evaluations: u64,
    /// Best fitness achieved.
    pub best_fitness: f64,
    /// Average fitness of the final population.
    pub final_avg_fitness: f64,
    /// Snapshots emitted.
    pub snapshots_written: usize,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason the run stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the generation budget.
    MaxGenerations,
    /// Reached the target fitness.
    TargetReached,
    /// Cancelled through the engine's cancel handle.
    Cancelled,
}
