//! Fitness scoring of rendered canvases against the target image.
//!
//! Per-pixel color distance is normalized by the distance between pure white
//! and pure black, giving an error in `[0, 1]`, then folded into a single
//! score where higher means a closer match.

use crate::compute::{Canvas, CanvasError};
use crate::schema::{ColorDistance, FitnessAggregate, FitnessConfig, Genome};

/// Score substituted when the inverse-error aggregate sees zero error.
pub const MAX_FITNESS: f64 = 1e12;

/// Scores rendered canvases against a target.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    distance: ColorDistance,
    aggregate: FitnessAggregate,
}

impl FitnessEvaluator {
    /// Create a new fitness evaluator.
    pub fn new(distance: ColorDistance, aggregate: FitnessAggregate) -> Self {
        Self {
            distance,
            aggregate,
        }
    }

    /// Create from the fitness section of a run configuration.
    pub fn from_config(config: &FitnessConfig) -> Self {
        Self::new(config.distance, config.aggregate)
    }

    /// Score `rendered` against `target`. Fails unless both canvases share
    /// dimensions.
    pub fn score(&self, rendered: &Canvas, target: &Canvas) -> Result<f64, CanvasError> {
        target.ensure_same_dimensions(rendered)?;

        let max_distance = self.distance.max_distance();
        let count = target.len().max(1) as f64;

        let score = match self.aggregate {
            FitnessAggregate::SquaredMeanSimilarity => {
                let similarity: f64 = rendered
                    .pixels()
                    .iter()
                    .zip(target.pixels())
                    .map(|(a, b)| 1.0 - self.distance.between(*a, *b) / max_distance)
                    .sum();
                let mean = (similarity / count).clamp(0.0, 1.0);
                mean * mean
            }
            FitnessAggregate::InverseMeanSquaredError => {
                let squared: f64 = rendered
                    .pixels()
                    .iter()
                    .zip(target.pixels())
                    .map(|(a, b)| {
                        let err = self.distance.between(*a, *b) / max_distance;
                        err * err
                    })
                    .sum();
                let mse = squared / count;
                if mse > 0.0 {
                    (1.0 / mse).min(MAX_FITNESS)
                } else {
                    MAX_FITNESS
                }
            }
        };
        Ok(score)
    }

    /// Render `genome` over `background` and score it against `target`.
    pub fn evaluate(
        &self,
        genome: &Genome,
        background: &Canvas,
        target: &Canvas,
        alpha: f64,
    ) -> Result<f64, CanvasError> {
        let rendered = crate::compute::render(genome, background, alpha);
        self.score(&rendered, target)
    }
}

impl ColorDistance {
    /// Distance between two RGB colors.
    #[inline]
    pub fn between(&self, a: [f64; 3], b: [f64; 3]) -> f64 {
        let diffs = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
        match self {
            Self::SquaredEuclidean => diffs.iter().map(|d| d * d).sum(),
            Self::Manhattan => diffs.iter().map(|d| d.abs()).sum(),
        }
    }

    /// Distance between pure white and pure black.
    #[inline]
    pub fn max_distance(&self) -> f64 {
        self.between([1.0; 3], [0.0; 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluators() -> Vec<FitnessEvaluator> {
        let mut out = Vec::new();
        for distance in [ColorDistance::SquaredEuclidean, ColorDistance::Manhattan] {
            for aggregate in [
                FitnessAggregate::SquaredMeanSimilarity,
                FitnessAggregate::InverseMeanSquaredError,
            ] {
                out.push(FitnessEvaluator::new(distance, aggregate));
            }
        }
        out
    }

    #[test]
    fn test_max_distance() {
        assert_eq!(ColorDistance::SquaredEuclidean.max_distance(), 3.0);
        assert_eq!(ColorDistance::Manhattan.max_distance(), 3.0);
    }

    #[test]
    fn test_perfect_match() {
        let target = Canvas::new(4, 4, [0.3, 0.6, 0.9]);

        let squared = FitnessEvaluator::new(
            ColorDistance::SquaredEuclidean,
            FitnessAggregate::SquaredMeanSimilarity,
        );
        assert!((squared.score(&target, &target).unwrap() - 1.0).abs() < 1e-12);

        let inverse = FitnessEvaluator::new(
            ColorDistance::Manhattan,
            FitnessAggregate::InverseMeanSquaredError,
        );
        assert_eq!(inverse.score(&target, &target).unwrap(), MAX_FITNESS);
    }

    #[test]
    fn test_opposite_colors() {
        let white = Canvas::new(2, 2, [1.0; 3]);
        let black = Canvas::new(2, 2, [0.0; 3]);

        let squared = FitnessEvaluator::new(
            ColorDistance::SquaredEuclidean,
            FitnessAggregate::SquaredMeanSimilarity,
        );
        assert_eq!(squared.score(&white, &black).unwrap(), 0.0);

        let inverse = FitnessEvaluator::new(
            ColorDistance::SquaredEuclidean,
            FitnessAggregate::InverseMeanSquaredError,
        );
        assert!((inverse.score(&white, &black).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fitness_decreases_with_error() {
        let target = Canvas::new(3, 3, [0.5, 0.5, 0.5]);
        for evaluator in evaluators() {
            let mut previous = f64::INFINITY;
            for step in 1..=5 {
                let offset = step as f64 * 0.1;
                let rendered = Canvas::new(3, 3, [0.5 + offset, 0.5, 0.5 - offset]);
                let score = evaluator.score(&rendered, &target).unwrap();
                assert!(score.is_finite() && score >= 0.0);
                assert!(score < previous, "{evaluator:?} not decreasing");
                previous = score;
            }
        }
    }

    #[test]
    fn test_score_is_deterministic() {
        let target = Canvas::from_pixels(2, 1, vec![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]).unwrap();
        let rendered = Canvas::new(2, 1, [0.4, 0.1, 0.7]);
        for evaluator in evaluators() {
            assert_eq!(
                evaluator.score(&rendered, &target).unwrap(),
                evaluator.score(&rendered, &target).unwrap()
            );
        }
    }

    #[test]
    fn test_evaluate_renders_first() {
        use crate::schema::Shape;

        let target = Canvas::new(4, 4, [1.0, 0.0, 0.0]);
        let background = Canvas::new(4, 4, [0.0; 3]);
        let evaluator = FitnessEvaluator::from_config(&FitnessConfig::default());

        let empty = evaluator
            .evaluate(&Genome::default(), &background, &target, 1.0)
            .unwrap();
        let red = Genome::new(vec![Shape::Circle {
            x: 0.5,
            y: 0.5,
            radius: 1.0,
            color: [1.0, 0.0, 0.0],
        }]);
        let covered = evaluator.evaluate(&red, &background, &target, 1.0).unwrap();
        assert!(covered > empty);
        assert!((covered - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let target = Canvas::new(4, 4, [1.0; 3]);
        let small = Canvas::new(2, 2, [1.0; 3]);
        for evaluator in evaluators() {
            assert!(matches!(
                evaluator.score(&small, &target),
                Err(CanvasError::DimensionMismatch {
                    expected: (4, 4),
                    actual: (2, 2)
                })
            ));
        }

        let evaluator = FitnessEvaluator::from_config(&FitnessConfig::default());
        assert!(
            evaluator
                .evaluate(&Genome::default(), &small, &target, 0.6)
                .is_err()
        );
    }
}
