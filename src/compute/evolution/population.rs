//! Population bookkeeping and fitness-proportionate selection.
//!
//! After every candidate carries a raw fitness, [`Population::normalize`]
//! builds the roulette wheel: each candidate's `cumulative` field holds the
//! running sum of normalized fitness in population order, ending at 1.0.

use crate::schema::{CandidateSnapshot, Genome};

use super::EvolutionError;
use super::genome::GenomeRng;

/// Added to every fitness when a generation's total is zero.
pub const FITNESS_FLOOR: f64 = 1e-9;

/// A candidate individual in the population.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Unique identifier.
    pub id: u64,
    /// The genome.
    pub genome: Genome,
    /// Raw fitness score from the last evaluation.
    pub fitness: f64,
    /// Upper edge of this candidate's slice of the roulette wheel.
    pub cumulative: f64,
    /// Generation created.
    pub generation: usize,
    /// Parent IDs.
    pub parents: Vec<u64>,
}

impl Candidate {
    pub fn new(id: u64, genome: Genome, generation: usize, parents: Vec<u64>) -> Self {
        Self {
            id,
            genome,
            fitness: 0.0,
            cumulative: 0.0,
            generation,
            parents,
        }
    }

    /// Detach a copy for reporting.
    pub fn to_snapshot(&self) -> CandidateSnapshot {
        CandidateSnapshot {
            id: self.id,
            fitness: self.fitness,
            genome: self.genome.clone(),
            generation: self.generation,
            parents: self.parents.clone(),
        }
    }
}

/// Summary of a generation's raw fitness, reduced after evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessSummary {
    pub total: f64,
    pub mean: f64,
    pub std: f64,
    pub best: f64,
    pub best_index: usize,
}

/// A fixed-order collection of candidates.
#[derive(Debug, Clone, Default)]
pub struct Population {
    candidates: Vec<Candidate>,
}

impl Population {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.candidates.get(index)
    }

    /// Store raw scores in population order.
    pub fn assign_fitness(&mut self, scores: &[f64]) {
        debug_assert_eq!(scores.len(), self.candidates.len());
        for (candidate, &score) in self.candidates.iter_mut().zip(scores) {
            candidate.fitness = score;
            candidate.cumulative = 0.0;
        }
    }

    /// Reduce raw fitness into totals and the best index. Ties keep the
    /// earliest candidate.
    pub fn summarize(&self) -> FitnessSummary {
        let n = self.candidates.len().max(1) as f64;
        let mut total = 0.0;
        let mut best = f64::NEG_INFINITY;
        let mut best_index = 0;

        for (i, c) in self.candidates.iter().enumerate() {
            total += c.fitness;
            if c.fitness > best {
                best = c.fitness;
                best_index = i;
            }
        }

        let mean = total / n;
        let variance = self
            .candidates
            .iter()
            .map(|c| (c.fitness - mean).powi(2))
            .sum::<f64>()
            / n;

        FitnessSummary {
            total,
            mean,
            std: variance.sqrt(),
            best,
            best_index,
        }
    }

    /// Build the roulette wheel from raw fitness.
    ///
    /// Fails with [`EvolutionError::DegenerateFitness`] when the total is zero
    /// or non-finite; raw fitness is left untouched in that case.
    pub fn normalize(&mut self, generation: usize) -> Result<(), EvolutionError> {
        let total: f64 = self.candidates.iter().map(|c| c.fitness).sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(EvolutionError::DegenerateFitness { generation, total });
        }

        let mut sum = 0.0;
        for candidate in &mut self.candidates {
            sum += candidate.fitness / total;
            candidate.cumulative = sum;
        }
        Ok(())
    }

    /// Add [`FITNESS_FLOOR`] to every raw fitness and normalize again.
    pub fn normalize_with_floor(&mut self, generation: usize) -> Result<(), EvolutionError> {
        for candidate in &mut self.candidates {
            candidate.fitness += FITNESS_FLOOR;
        }
        self.normalize(generation)
    }

    /// Index of the first candidate whose cumulative mass reaches `r`.
    ///
    /// When rounding leaves the last cumulative value below `r`, the last
    /// candidate is returned.
    pub fn select_index(&self, r: f64) -> usize {
        match self.candidates.iter().position(|c| c.cumulative >= r) {
            Some(index) => index,
            None => {
                log::trace!("roulette scan found no candidate for r={r}, using last");
                self.candidates.len().saturating_sub(1)
            }
        }
    }

    /// Draw one parent from the wheel. The population must be non-empty.
    pub fn select(&self, rng: &mut GenomeRng) -> &Candidate {
        let r = rng.unit();
        &self.candidates[self.select_index(r)]
    }

    /// Indices sorted by descending raw fitness.
    pub fn ranked_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.candidates.len()).collect();
        indices.sort_by(|&a, &b| {
            self.candidates[b]
                .fitness
                .total_cmp(&self.candidates[a].fitness)
        });
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn population(scores: &[f64]) -> Population {
        let mut pop = Population::new(
            (0..scores.len())
                .map(|i| Candidate::new(i as u64, Genome::default(), 0, Vec::new()))
                .collect(),
        );
        pop.assign_fitness(scores);
        pop
    }

    #[test]
    fn test_normalize_builds_wheel() {
        let mut pop = population(&[1.0, 3.0, 0.0, 4.0]);
        pop.normalize(1).unwrap();

        let wheel: Vec<f64> = pop.candidates().iter().map(|c| c.cumulative).collect();
        assert!((wheel[0] - 0.125).abs() < 1e-12);
        assert!((wheel[1] - 0.5).abs() < 1e-12);
        assert!((wheel[2] - 0.5).abs() < 1e-12);
        assert!((wheel[3] - 1.0).abs() < 1e-9);

        // Raw fitness survives normalization.
        assert_eq!(pop.candidates()[1].fitness, 3.0);
    }

    #[test]
    fn test_degenerate_fitness() {
        let mut zeros = population(&[0.0, 0.0, 0.0]);
        assert!(matches!(
            zeros.normalize(4),
            Err(EvolutionError::DegenerateFitness { generation: 4, .. })
        ));

        let mut nan = population(&[0.5, f64::NAN]);
        assert!(nan.normalize(1).is_err());

        let mut inf = population(&[f64::INFINITY, 1.0]);
        assert!(inf.normalize(1).is_err());
    }

    #[test]
    fn test_floor_recovers_zero_total() {
        let mut pop = population(&[0.0, 0.0, 0.0, 0.0]);
        assert!(pop.normalize(1).is_err());
        pop.normalize_with_floor(1).unwrap();

        let wheel: Vec<f64> = pop.candidates().iter().map(|c| c.cumulative).collect();
        assert!((wheel[0] - 0.25).abs() < 1e-9);
        assert!((wheel[3] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_select_boundaries() {
        let mut pop = population(&[2.0, 1.0, 1.0]);
        pop.normalize(1).unwrap();

        assert_eq!(pop.select_index(0.0), 0);
        assert_eq!(pop.select_index(0.5), 0);
        assert_eq!(pop.select_index(0.51), 1);
        assert_eq!(pop.select_index(1.0 - f64::EPSILON), 2);
    }

    #[test]
    fn test_select_falls_back_to_last() {
        // A wheel that rounding left short of 1.0.
        let pop = Population::new(
            [0.5, 0.999_999]
                .into_iter()
                .enumerate()
                .map(|(i, cumulative)| Candidate {
                    cumulative,
                    ..Candidate::new(i as u64, Genome::default(), 0, Vec::new())
                })
                .collect(),
        );
        assert_eq!(pop.select_index(0.9999999), 1);
        assert_eq!(pop.select_index(2.0), 1);
    }

    #[test]
    fn test_select_skips_zero_fitness() {
        let mut pop = population(&[0.0, 1.0, 0.0]);
        pop.normalize(1).unwrap();
        let mut rng = GenomeRng::new(42);
        for _ in 0..100 {
            assert_eq!(pop.select(&mut rng).id, 1);
        }
    }

    #[test]
    fn test_summarize() {
        let pop = population(&[1.0, 3.0, 3.0, 1.0]);
        let summary = pop.summarize();
        assert_eq!(summary.total, 8.0);
        assert_eq!(summary.mean, 2.0);
        assert_eq!(summary.std, 1.0);
        assert_eq!(summary.best, 3.0);
        assert_eq!(summary.best_index, 1);
        assert_eq!(pop.ranked_indices()[0], 1);
    }

    proptest! {
        #[test]
        fn prop_wheel_is_monotone_and_ends_at_one(
            scores in prop::collection::vec(0.0f64..10.0, 1..64)
        ) {
            prop_assume!(scores.iter().sum::<f64>() > 0.0);
            let mut pop = population(&scores);
            pop.normalize(1).unwrap();

            let wheel: Vec<f64> = pop.candidates().iter().map(|c| c.cumulative).collect();
            prop_assert!(wheel.windows(2).all(|w| w[0] <= w[1]));
            prop_assert!((wheel[wheel.len() - 1] - 1.0).abs() < 1e-9);
            prop_assert_eq!(pop.select_index(0.0), 0);
            prop_assert!(pop.select_index(1.0 - f64::EPSILON) < wheel.len());
        }
    }
}
