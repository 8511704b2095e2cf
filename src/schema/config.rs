//! Configuration types for an evolutionary image approximation run.

use serde::{Deserialize, Serialize};

use super::ShapeKind;

/// Top-level configuration for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Population and generation settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Genome shape settings.
    #[serde(default)]
    pub genome: GenomeConfig,
    /// Crossover and mutation settings.
    #[serde(default)]
    pub reproduction: ReproductionConfig,
    /// Fitness formula selection.
    #[serde(default)]
    pub fitness: FitnessConfig,
    /// Rasterization settings.
    #[serde(default)]
    pub render: RenderConfig,
    /// Evaluation worker settings.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Snapshot emission settings.
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population: PopulationConfig::default(),
            genome: GenomeConfig::default(),
            reproduction: ReproductionConfig::default(),
            fitness: FitnessConfig::default(),
            render: RenderConfig::default(),
            evaluation: EvaluationConfig::default(),
            snapshot: SnapshotConfig::default(),
            random_seed: None,
        }
    }
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of genomes per generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Number of generations to run.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Best genomes copied unchanged into the next generation.
    #[serde(default)]
    pub elitism: usize,
    /// Stop early once a genome reaches this fitness.
    #[serde(default)]
    pub target_fitness: Option<f64>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_generations: default_max_generations(),
            elitism: 0,
            target_fitness: None,
        }
    }
}

fn default_population_size() -> usize {
    400
}
fn default_max_generations() -> usize {
    1000
}

/// Genome shape settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeConfig {
    /// Shapes per genome, fixed for the whole run.
    #[serde(default = "default_gene_count")]
    pub gene_count: usize,
    /// Primitive drawn by every gene.
    #[serde(default)]
    pub primitive: ShapeKind,
    /// Upper bound for freshly drawn size parameters (radius, width, height).
    #[serde(default = "default_max_size")]
    pub max_size: f64,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            gene_count: default_gene_count(),
            primitive: ShapeKind::default(),
            max_size: default_max_size(),
        }
    }
}

fn default_gene_count() -> usize {
    16
}
fn default_max_size() -> f64 {
    0.5
}

/// Crossover and mutation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproductionConfig {
    /// How two parents are combined.
    #[serde(default)]
    pub crossover: CrossoverStrategy,
    /// Mutation probability per gene or per parameter (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Granularity of mutation.
    #[serde(default)]
    pub mutation: MutationGranularity,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            crossover: CrossoverStrategy::default(),
            mutation_rate: default_mutation_rate(),
            mutation: MutationGranularity::default(),
        }
    }
}

fn default_mutation_rate() -> f64 {
    0.02
}

/// Crossover strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CrossoverStrategy {
    /// One mixing factor per offspring; each gene is copied whole from
    /// the first parent with that probability, otherwise from the second.
    #[default]
    GeneWise,
    /// Every parameter is the arithmetic mean of the parents' parameters.
    Averaging,
}

/// Mutation granularity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type")]
pub enum MutationGranularity {
    /// A single coin flip per gene; success replaces the gene with a fresh
    /// random shape.
    #[default]
    PerGene,
    /// A coin flip per parameter; success perturbs that parameter.
    PerParameter {
        #[serde(default)]
        perturbation: Perturbation,
    },
}

/// How a single parameter is perturbed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type")]
pub enum Perturbation {
    /// Add a uniform delta in [-0.5, 0.5], then clamp to [0, 1].
    #[default]
    UniformDelta,
    /// Add normal noise with the given standard deviation, then clamp.
    Gaussian { strength: f64 },
    /// Draw the parameter again from scratch.
    Redraw,
}

/// Fitness formula selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessConfig {
    /// Per-pixel color distance.
    #[serde(default)]
    pub distance: ColorDistance,
    /// How per-pixel errors are folded into one score.
    #[serde(default)]
    pub aggregate: FitnessAggregate,
    /// What to do when a generation has no usable fitness mass.
    #[serde(default)]
    pub degenerate: DegeneratePolicy,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            distance: ColorDistance::default(),
            aggregate: FitnessAggregate::default(),
            degenerate: DegeneratePolicy::default(),
        }
    }
}

/// Per-pixel color distance over the R, G and B channels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ColorDistance {
    /// Sum of squared channel differences.
    #[default]
    SquaredEuclidean,
    /// Sum of absolute channel differences.
    Manhattan,
}

/// Aggregation of normalized per-pixel errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FitnessAggregate {
    /// Mean of `(1 - error)` over all pixels, squared.
    #[default]
    SquaredMeanSimilarity,
    /// Reciprocal of the mean of `error²`.
    InverseMeanSquaredError,
}

/// Recovery policy for a generation whose total fitness is zero or
/// non-finite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DegeneratePolicy {
    /// Add a small floor to every fitness and normalize again. Non-finite
    /// totals still abort.
    #[default]
    Floor,
    /// Abort the run.
    Abort,
}

/// Rasterization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Opacity of every shape (0.0-1.0].
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Canvas every genome is drawn onto.
    #[serde(default)]
    pub background: BackgroundMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            background: BackgroundMode::default(),
        }
    }
}

fn default_alpha() -> f64 {
    0.6
}

/// Background canvas policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum BackgroundMode {
    /// A flat color for the whole run.
    Solid { color: [f64; 3] },
    /// Starts flat; each snapshot's render becomes the new background.
    Accumulate { color: [f64; 3] },
}

impl Default for BackgroundMode {
    fn default() -> Self {
        Self::Solid {
            color: [0.0, 0.0, 0.0],
        }
    }
}

impl BackgroundMode {
    /// Initial background color.
    pub fn color(&self) -> [f64; 3] {
        match self {
            Self::Solid { color } | Self::Accumulate { color } => *color,
        }
    }
}

/// Evaluation worker settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvaluationConfig {
    /// Number of evaluation threads (0 = rayon's global pool).
    #[serde(default)]
    pub parallel_workers: usize,
}

/// Snapshot emission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// When to emit snapshots.
    #[serde(default)]
    pub policy: SnapshotPolicy,
    /// Directory snapshot images are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// File name prefix; the generation number follows it.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            policy: SnapshotPolicy::default(),
            output_dir: default_output_dir(),
            prefix: default_prefix(),
        }
    }
}

fn default_output_dir() -> String {
    "out".to_string()
}
fn default_prefix() -> String {
    "gen".to_string()
}

/// Generation numbers (1-based) that trigger a snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum SnapshotPolicy {
    /// Never snapshot.
    Never,
    /// Every `interval`-th generation.
    Every { interval: usize },
    /// Generations 1, 2, 4, 8, ...
    PowersOfTwo,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self::Every { interval: 10 }
    }
}

impl SnapshotPolicy {
    /// Whether generation `generation` (1-based) is a snapshot generation.
    pub fn should_snapshot(&self, generation: usize) -> bool {
        match *self {
            Self::Never => false,
            Self::Every { interval } => interval > 0 && generation % interval == 0,
            Self::PowersOfTwo => generation.is_power_of_two(),
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionConfigError {
    #[error("Population size must be non-zero")]
    EmptyPopulation,
    #[error("Gene count must be non-zero")]
    EmptyGenome,
    #[error("Mutation rate {0} must lie in [0, 1]")]
    InvalidMutationRate(f64),
    #[error("Shape alpha {0} must lie in (0, 1]")]
    InvalidAlpha(f64),
    #[error("Maximum shape size {0} must lie in (0, 1]")]
    InvalidMaxSize(f64),
    #[error("Gaussian mutation strength {0} must be positive and finite")]
    InvalidStrength(f64),
    #[error("Background channel {0} must lie in [0, 1]")]
    InvalidBackground(f64),
    #[error("Snapshot interval must be non-zero")]
    InvalidSnapshotInterval,
    #[error("Elitism {elitism} exceeds population size {size}")]
    ElitismTooLarge { elitism: usize, size: usize },
    #[error("Target fitness must be finite")]
    InvalidTargetFitness,
}

impl EvolutionConfig {
    /// Validate configuration ranges.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        if self.population.size == 0 {
            return Err(EvolutionConfigError::EmptyPopulation);
        }
        if self.population.elitism > self.population.size {
            return Err(EvolutionConfigError::ElitismTooLarge {
                elitism: self.population.elitism,
                size: self.population.size,
            });
        }
        if let Some(target) = self.population.target_fitness
            && !target.is_finite()
        {
            return Err(EvolutionConfigError::InvalidTargetFitness);
        }

        if self.genome.gene_count == 0 {
            return Err(EvolutionConfigError::EmptyGenome);
        }
        let max_size = self.genome.max_size;
        if !(max_size > 0.0 && max_size <= 1.0) {
            return Err(EvolutionConfigError::InvalidMaxSize(max_size));
        }

        let rate = self.reproduction.mutation_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(EvolutionConfigError::InvalidMutationRate(rate));
        }
        if let MutationGranularity::PerParameter {
            perturbation: Perturbation::Gaussian { strength },
        } = self.reproduction.mutation
            && !(strength.is_finite() && strength > 0.0)
        {
            return Err(EvolutionConfigError::InvalidStrength(strength));
        }

        let alpha = self.render.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(EvolutionConfigError::InvalidAlpha(alpha));
        }
        for channel in self.render.background.color() {
            if !(0.0..=1.0).contains(&channel) {
                return Err(EvolutionConfigError::InvalidBackground(channel));
            }
        }

        if let SnapshotPolicy::Every { interval: 0 } = self.snapshot.policy {
            return Err(EvolutionConfigError::InvalidSnapshotInterval);
        }

        Ok(())
    }
}
