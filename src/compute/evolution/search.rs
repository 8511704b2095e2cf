//! The generation loop: evaluate, normalize, snapshot, reproduce.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::compute::{Canvas, CanvasError, render};
use crate::schema::{
    BackgroundMode, CandidateSnapshot, DegeneratePolicy, EvolutionConfig, EvolutionHistory,
    EvolutionPhase, EvolutionProgress, EvolutionResult, EvolutionStats, Genome, StopReason,
};

use super::EvolutionError;
use super::fitness::FitnessEvaluator;
use super::genome::GenomeRng;
use super::population::{Candidate, FitnessSummary, Population};
use super::snapshot::{Snapshot, SnapshotSink};

/// Evolution engine that drives a run against one target image.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    rng: GenomeRng,
    evaluator: FitnessEvaluator,
    target: Canvas,
    background: Canvas,
    population: Population,
    history: EvolutionHistory,
    /// Generations evaluated so far.
    generation: usize,
    summary: Option<FitnessSummary>,
    /// Best candidate scored against the current background.
    best: Option<Candidate>,
    /// Set when the background changes, so the next generation's best
    /// replaces `best` regardless of score.
    rebase_best: bool,
    total_evaluations: u64,
    snapshots_written: usize,
    phase: EvolutionPhase,
    pool: Option<rayon::ThreadPool>,
    next_id: u64,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create an engine for `target`. The configuration is validated here.
    pub fn new(config: EvolutionConfig, target: Canvas) -> Result<Self, EvolutionError> {
        config.validate()?;
        if target.is_empty() {
            return Err(CanvasError::EmptyImage.into());
        }

        let rng = match config.random_seed {
            Some(seed) => GenomeRng::new(seed),
            None => GenomeRng::random(),
        };
        let background = Canvas::new(
            target.width(),
            target.height(),
            config.render.background.color(),
        );
        let pool = match config.evaluation.parallel_workers {
            0 => None,
            workers => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()?,
            ),
        };

        Ok(Self {
            rng,
            evaluator: FitnessEvaluator::from_config(&config.fitness),
            target,
            background,
            population: Population::default(),
            history: EvolutionHistory::default(),
            generation: 0,
            summary: None,
            best: None,
            rebase_best: false,
            total_evaluations: 0,
            snapshots_written: 0,
            phase: EvolutionPhase::Initializing,
            pool,
            next_id: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Canvas every genome is currently rendered onto.
    pub fn background(&self) -> &Canvas {
        &self.background
    }

    /// Fill the population with random genomes and reset run state.
    pub fn initialize(&mut self) {
        self.phase = EvolutionPhase::Initializing;
        self.generation = 0;
        self.summary = None;
        self.best = None;
        self.rebase_best = false;
        self.total_evaluations = 0;
        self.snapshots_written = 0;
        self.history = EvolutionHistory::default();
        self.background = Canvas::new(
            self.target.width(),
            self.target.height(),
            self.config.render.background.color(),
        );

        let genome_config = &self.config.genome;
        let candidates = (0..self.config.population.size)
            .map(|_| {
                let genome = self.rng.random_genome(
                    genome_config.gene_count,
                    genome_config.primitive,
                    genome_config.max_size,
                );
                let id = self.next_id;
                self.next_id += 1;
                Candidate::new(id, genome, 0, Vec::new())
            })
            .collect();
        self.population = Population::new(candidates);
    }

    /// Render and score every candidate, then reduce the scores.
    fn evaluate_population(&mut self) -> Result<FitnessSummary, EvolutionError> {
        self.phase = EvolutionPhase::Evaluating;

        let evaluator = &self.evaluator;
        let background = &self.background;
        let target = &self.target;
        let alpha = self.config.render.alpha;
        let score =
            |candidate: &Candidate| evaluator.evaluate(&candidate.genome, background, target, alpha);

        let candidates = self.population.candidates();
        let scores: Vec<f64> = match &self.pool {
            Some(pool) => pool.install(|| {
                candidates
                    .par_iter()
                    .map(score)
                    .collect::<Result<Vec<f64>, CanvasError>>()
            }),
            None => candidates
                .par_iter()
                .map(score)
                .collect::<Result<Vec<f64>, CanvasError>>(),
        }?;

        self.population.assign_fitness(&scores);
        self.total_evaluations += scores.len() as u64;
        Ok(self.population.summarize())
    }

    /// Record a generation's statistics and track the best candidate.
    ///
    /// Fitness is only comparable across generations rendered onto the same
    /// background, so after the background changes the next generation's
    /// best is taken unconditionally.
    fn record(&mut self, summary: FitnessSummary) {
        self.history.best_fitness.push(summary.best);
        self.history.avg_fitness.push(summary.mean);
        self.history.fitness_std.push(summary.std);

        let improved = self.rebase_best
            || self
                .best
                .as_ref()
                .is_none_or(|best| summary.best > best.fitness);
        if improved && let Some(candidate) = self.population.get(summary.best_index) {
            self.best = Some(candidate.clone());
        }
        self.rebase_best = false;
        self.summary = Some(summary);

        log::debug!(
            "Generation {}: best={:.6} avg={:.6} std={:.6}",
            self.generation,
            summary.best,
            summary.mean,
            summary.std
        );
    }

    /// Build the roulette wheel, applying the degenerate-fitness policy.
    fn normalize(&mut self) -> Result<(), EvolutionError> {
        self.phase = EvolutionPhase::Normalizing;

        match self.population.normalize(self.generation) {
            Ok(()) => Ok(()),
            Err(err) => match self.config.fitness.degenerate {
                DegeneratePolicy::Abort => Err(err),
                DegeneratePolicy::Floor => {
                    log::warn!(
                        "Generation {}: no usable fitness mass, applying floor",
                        self.generation
                    );
                    self.population.normalize_with_floor(self.generation)
                }
            },
        }
    }

    /// Render the generation's best genome and hand it to `sink`.
    fn snapshot(
        &mut self,
        summary: &FitnessSummary,
        sink: &mut dyn SnapshotSink,
    ) -> Result<(), EvolutionError> {
        self.phase = EvolutionPhase::Snapshotting;

        let Some(best) = self.population.get(summary.best_index) else {
            return Ok(());
        };
        let snapshot = Snapshot {
            generation: self.generation,
            fitness: summary.best,
            canvas: render(&best.genome, &self.background, self.config.render.alpha),
        };
        sink.write_snapshot(&snapshot)?;
        self.snapshots_written += 1;

        if let BackgroundMode::Accumulate { .. } = self.config.render.background {
            self.background = snapshot.canvas;
            self.rebase_best = true;
        }
        Ok(())
    }

    /// Replace the population with elites plus offspring of roulette-selected
    /// parent pairs.
    fn reproduce(&mut self) {
        self.phase = EvolutionPhase::Reproducing;

        let size = self.config.population.size;
        let next_generation = self.generation + 1;
        let reproduction = &self.config.reproduction;
        let max_size = self.config.genome.max_size;
        let mut next = Vec::with_capacity(size);

        for index in self
            .population
            .ranked_indices()
            .into_iter()
            .take(self.config.population.elitism)
        {
            if let Some(elite) = self.population.get(index) {
                let mut elite = elite.clone();
                elite.generation = next_generation;
                next.push(elite);
            }
        }

        while next.len() < size {
            let parent1 = self.population.select(&mut self.rng);
            let parent2 = self.population.select(&mut self.rng);

            let mut genome =
                self.rng
                    .crossover(&parent1.genome, &parent2.genome, reproduction.crossover);
            self.rng.mutate(
                &mut genome,
                reproduction.mutation_rate,
                &reproduction.mutation,
                max_size,
            );

            let id = self.next_id;
            self.next_id += 1;
            next.push(Candidate::new(
                id,
                genome,
                next_generation,
                vec![parent1.id, parent2.id],
            ));
        }

        self.population = Population::new(next);
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        let (generation_best, avg_fitness) = self
            .summary
            .map(|s| (s.best, s.mean))
            .unwrap_or((0.0, 0.0));

        EvolutionProgress {
            generation: self.generation,
            total_generations: self.config.population.max_generations,
            best_fitness: self.best_fitness(),
            generation_best,
            avg_fitness,
            snapshots_written: self.snapshots_written,
            phase: self.phase,
        }
    }

    fn best_fitness(&self) -> f64 {
        self.best.as_ref().map_or(0.0, |c| c.fitness)
    }

    /// Best candidate seen so far, or the first candidate before any
    /// evaluation.
    fn best_snapshot(&self) -> CandidateSnapshot {
        match self.best.as_ref().or_else(|| self.population.get(0)) {
            Some(candidate) => candidate.to_snapshot(),
            None => Candidate::new(0, Genome::default(), 0, Vec::new()).to_snapshot(),
        }
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if let Some(target) = self.config.population.target_fitness
            && self.best.is_some()
            && self.best_fitness() >= target
        {
            return Some(StopReason::TargetReached);
        }

        if self.generation >= self.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        None
    }

    /// Run evolution, reporting progress after every evaluated generation
    /// and sending snapshots to `sink`.
    pub fn run_with_callback<F>(
        &mut self,
        callback: F,
        sink: &mut dyn SnapshotSink,
    ) -> Result<EvolutionResult, EvolutionError>
    where
        F: Fn(&EvolutionProgress),
    {
        let start_time = Instant::now();

        log::info!(
            "Starting evolution: {} genomes x {} {:?} genes, {} generations, target {}x{}",
            self.config.population.size,
            self.config.genome.gene_count,
            self.config.genome.primitive,
            self.config.population.max_generations,
            self.target.width(),
            self.target.height()
        );

        self.initialize();
        callback(&self.progress());

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }

            if self.generation > 0 {
                self.reproduce();
            }
            self.generation += 1;

            let summary = self.evaluate_population()?;
            self.record(summary);
            self.normalize()?;

            if self.config.snapshot.policy.should_snapshot(self.generation) {
                self.snapshot(&summary, sink)?;
            }

            callback(&self.progress());
        };

        self.phase = EvolutionPhase::Done;
        callback(&self.progress());

        let elapsed = start_time.elapsed().as_secs_f64();
        let evaluations_per_second = if elapsed > 0.0 {
            self.total_evaluations as f64 / elapsed
        } else {
            0.0
        };

        log::info!(
            "Evolution finished after {} generations ({:?}): best fitness {:.6}",
            self.generation,
            stop_reason,
            self.best_fitness()
        );

        Ok(EvolutionResult {
            best: self.best_snapshot(),
            stats: EvolutionStats {
                generations: self.generation,
                total_evaluations: self.total_evaluations,
                best_fitness: self.best_fitness(),
                final_avg_fitness: self.summary.map_or(0.0, |s| s.mean),
                snapshots_written: self.snapshots_written,
                elapsed_seconds: elapsed,
                evaluations_per_second,
                stop_reason,
            },
            history: self.history.clone(),
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self, sink: &mut dyn SnapshotSink) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {}, sink)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::schema::{
        EvaluationConfig, GenomeConfig, PopulationConfig, RenderConfig, Shape, ShapeKind,
        SnapshotConfig, SnapshotPolicy,
    };

    /// 2x2 target: left column red, right column blue.
    fn red_blue() -> Canvas {
        Canvas::from_pixels(
            2,
            2,
            vec![
                [1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
        )
        .unwrap()
    }

    fn small_config(seed: u64) -> EvolutionConfig {
        EvolutionConfig {
            population: PopulationConfig {
                size: 10,
                max_generations: 5,
                ..Default::default()
            },
            genome: GenomeConfig {
                gene_count: 1,
                ..Default::default()
            },
            snapshot: SnapshotConfig {
                policy: SnapshotPolicy::Never,
                ..Default::default()
            },
            random_seed: Some(seed),
            ..Default::default()
        }
    }

    fn run(config: EvolutionConfig, target: Canvas) -> (EvolutionResult, Vec<Snapshot>) {
        let mut sink: Vec<Snapshot> = Vec::new();
        let mut engine = EvolutionEngine::new(config, target).unwrap();
        let result = engine.run(&mut sink).unwrap();
        (result, sink)
    }

    #[test]
    fn test_evolution_engine_creation() {
        let mut config = small_config(1);
        config.genome.gene_count = 3;
        config.genome.primitive = ShapeKind::Ellipse;

        let mut engine = EvolutionEngine::new(config, red_blue()).unwrap();
        engine.initialize();

        assert_eq!(engine.population().len(), 10);
        for candidate in engine.population().candidates() {
            assert_eq!(candidate.genome.len(), 3);
            assert!(
                candidate
                    .genome
                    .genes
                    .iter()
                    .all(|g| g.kind() == ShapeKind::Ellipse)
            );
        }
    }

    #[test]
    fn test_rejects_invalid_setup() {
        let mut config = small_config(1);
        config.population.size = 0;
        assert!(matches!(
            EvolutionEngine::new(config, red_blue()),
            Err(EvolutionError::Config(_))
        ));

        let empty = Canvas::new(0, 0, [0.0; 3]);
        assert!(matches!(
            EvolutionEngine::new(small_config(1), empty),
            Err(EvolutionError::Canvas(CanvasError::EmptyImage))
        ));
    }

    #[test]
    fn test_evolution_run() {
        let (result, snapshots) = run(small_config(7), red_blue());

        assert_eq!(result.stats.generations, 5);
        assert_eq!(result.stats.total_evaluations, 50);
        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(result.history.best_fitness.len(), 5);
        assert!(snapshots.is_empty());

        let best_in_history = result
            .history
            .best_fitness
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.stats.best_fitness, best_in_history);
        assert_eq!(result.best.fitness, best_in_history);
        assert_eq!(result.best.genome.len(), 1);
    }

    #[test]
    fn test_best_fitness_does_not_regress_on_average() {
        let seeds = 0..8u64;
        let count = seeds.clone().count() as f64;
        let mean: f64 = seeds
            .map(|seed| {
                run(small_config(seed), red_blue())
                    .0
                    .history
                    .mean_best_improvement()
            })
            .sum::<f64>()
            / count;
        assert!(mean >= -0.02, "mean best improvement {mean}");
    }

    #[test]
    fn test_elitism_keeps_best_monotone() {
        let mut config = small_config(3);
        config.population.elitism = 1;
        config.population.max_generations = 10;
        let (result, _) = run(config, red_blue());

        let history = &result.history.best_fitness;
        assert!(history.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let (a, _) = run(small_config(42), red_blue());
        let (b, _) = run(small_config(42), red_blue());
        assert_eq!(a.history.best_fitness, b.history.best_fitness);
        assert_eq!(a.history.avg_fitness, b.history.avg_fitness);
        assert_eq!(a.best.genome, b.best.genome);
    }

    #[test]
    fn test_dedicated_pool_matches_global_pool() {
        let mut config = small_config(9);
        config.evaluation = EvaluationConfig {
            parallel_workers: 2,
        };
        let (pooled, _) = run(config, red_blue());
        let (global, _) = run(small_config(9), red_blue());
        assert_eq!(pooled.history.best_fitness, global.history.best_fitness);
    }

    #[test]
    fn test_snapshot_policies() {
        let mut config = small_config(5);
        config.snapshot.policy = SnapshotPolicy::Every { interval: 2 };
        let (result, snapshots) = run(config, red_blue());
        let generations: Vec<usize> = snapshots.iter().map(|s| s.generation).collect();
        assert_eq!(generations, vec![2, 4]);
        assert_eq!(result.stats.snapshots_written, 2);
        for snapshot in &snapshots {
            assert_eq!(
                snapshot.fitness,
                result.history.best_fitness[snapshot.generation - 1]
            );
            assert_eq!(snapshot.canvas.dimensions(), (2, 2));
        }

        let mut config = small_config(5);
        config.snapshot.policy = SnapshotPolicy::PowersOfTwo;
        let (_, snapshots) = run(config, red_blue());
        let generations: Vec<usize> = snapshots.iter().map(|s| s.generation).collect();
        assert_eq!(generations, vec![1, 2, 4]);
    }

    #[test]
    fn test_accumulate_bakes_snapshot_into_background() {
        let mut config = small_config(11);
        config.snapshot.policy = SnapshotPolicy::Every { interval: 1 };
        config.render = RenderConfig {
            background: BackgroundMode::Accumulate {
                color: [0.0, 0.0, 0.0],
            },
            ..Default::default()
        };

        let mut sink: Vec<Snapshot> = Vec::new();
        let mut engine = EvolutionEngine::new(config, red_blue()).unwrap();
        engine.run(&mut sink).unwrap();

        assert_eq!(sink.len(), 5);
        assert_eq!(engine.background(), &sink[4].canvas);
    }

    #[test]
    fn test_accumulate_reports_best_on_latest_background() {
        let mut config = small_config(13);
        config.snapshot.policy = SnapshotPolicy::Every { interval: 2 };
        config.render.background = BackgroundMode::Accumulate {
            color: [0.0, 0.0, 0.0],
        };
        let (result, snapshots) = run(config, red_blue());

        // Background last changed after generation 4.
        assert_eq!(snapshots.len(), 2);
        assert_eq!(result.best.fitness, result.history.best_fitness[4]);
        assert_eq!(result.stats.best_fitness, result.history.best_fitness[4]);
        assert_eq!(result.best.generation, 5);
    }

    #[test]
    fn test_gene_count_constant_across_generations() {
        let mut config = small_config(17);
        config.genome.gene_count = 4;
        config.genome.primitive = ShapeKind::Rectangle;
        config.reproduction.mutation_rate = 0.5;
        let mut engine = EvolutionEngine::new(config, red_blue()).unwrap();
        engine.initialize();

        for generation in 1..=6 {
            if generation > 1 {
                engine.reproduce();
            }
            engine.generation = generation;
            let summary = engine.evaluate_population().unwrap();
            engine.record(summary);
            engine.normalize().unwrap();

            assert_eq!(engine.population().len(), 10);
            for candidate in engine.population().candidates() {
                assert_eq!(candidate.genome.len(), 4);
                assert!(candidate.genome.genes.iter().all(Shape::is_normalized));
                if generation > 1 {
                    assert_eq!(candidate.generation, generation);
                    assert_eq!(candidate.parents.len(), 2);
                }
            }
        }
    }

    #[test]
    fn test_cancellation() {
        let mut config = small_config(1);
        config.population.max_generations = 100;
        let mut engine = EvolutionEngine::new(config, red_blue()).unwrap();
        engine.cancel_handle().store(true, Ordering::Relaxed);

        let result = engine.run(&mut Vec::<Snapshot>::new()).unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 0);
    }

    #[test]
    fn test_target_fitness_stops_early() {
        let mut config = small_config(1);
        config.population.max_generations = 100;
        config.population.target_fitness = Some(0.0);
        let (result, _) = run(config, red_blue());
        assert_eq!(result.stats.stop_reason, StopReason::TargetReached);
        assert_eq!(result.stats.generations, 1);
    }

    #[test]
    fn test_progress_reported_every_generation() {
        let calls = Cell::new(0usize);
        let last_phase = Cell::new(EvolutionPhase::Initializing);
        let mut engine = EvolutionEngine::new(small_config(2), red_blue()).unwrap();
        engine
            .run_with_callback(
                |progress| {
                    calls.set(calls.get() + 1);
                    last_phase.set(progress.phase);
                    assert_eq!(progress.total_generations, 5);
                },
                &mut Vec::<Snapshot>::new(),
            )
            .unwrap();

        // Initial, five generations, done.
        assert_eq!(calls.get(), 7);
        assert_eq!(last_phase.get(), EvolutionPhase::Done);
    }

    /// Shapes too small to cover any pixel center leave a black canvas, which
    /// scores zero against a white target.
    fn degenerate_config(policy: DegeneratePolicy) -> (EvolutionConfig, Canvas) {
        let mut config = small_config(4);
        config.genome.max_size = 1e-9;
        config.fitness.degenerate = policy;
        (config, Canvas::new(2, 2, [1.0; 3]))
    }

    #[test]
    fn test_degenerate_fitness_abort() {
        let (config, target) = degenerate_config(DegeneratePolicy::Abort);
        let mut engine = EvolutionEngine::new(config, target).unwrap();
        assert!(matches!(
            engine.run(&mut Vec::<Snapshot>::new()),
            Err(EvolutionError::DegenerateFitness { generation: 1, .. })
        ));
    }

    #[test]
    fn test_degenerate_fitness_floor() {
        let (config, target) = degenerate_config(DegeneratePolicy::Floor);
        let (result, _) = run(config, target);
        assert_eq!(result.stats.generations, 5);
        assert!(result.history.best_fitness.iter().all(|&f| f == 0.0));
    }
}
