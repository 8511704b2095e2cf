//! Genome manipulation utilities for evolutionary search.
//!
//! Provides random generation, crossover, and mutation operations. Every
//! stochastic operation draws from an explicit, seedable generator.

use crate::schema::{
    CrossoverStrategy, Genome, MutationGranularity, ParameterRole, Perturbation, Shape, ShapeKind,
};
use rand::prelude::*;

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Generate a random shape. Position and color parameters are uniform in
    /// `[0, 1)`; size parameters are uniform in `[0, max_size)`.
    pub fn random_shape(&mut self, kind: ShapeKind, max_size: f64) -> Shape {
        let x = self.unit();
        let y = self.unit();
        match kind {
            ShapeKind::Circle => Shape::Circle {
                x,
                y,
                radius: self.unit() * max_size,
                color: self.random_color(),
            },
            ShapeKind::Rectangle => Shape::Rectangle {
                x,
                y,
                width: self.unit() * max_size,
                height: self.unit() * max_size,
                color: self.random_color(),
            },
            ShapeKind::Ellipse => Shape::Ellipse {
                x,
                y,
                radius_x: self.unit() * max_size,
                radius_y: self.unit() * max_size,
                color: self.random_color(),
            },
        }
    }

    fn random_color(&mut self) -> [f64; 3] {
        [self.unit(), self.unit(), self.unit()]
    }

    /// Generate a genome of `length` independent random shapes.
    pub fn random_genome(&mut self, length: usize, kind: ShapeKind, max_size: f64) -> Genome {
        Genome::new(
            (0..length)
                .map(|_| self.random_shape(kind, max_size))
                .collect(),
        )
    }

    /// With probability `rate`, perturb `value` and clamp it to `[0, 1]`.
    /// Returns whether the perturbation was applied.
    ///
    /// An applied perturbation always moves an interior value. A value
    /// already on a bound stays there whenever the delta points outward.
    pub fn mutate_parameter(
        &mut self,
        value: &mut f64,
        rate: f64,
        perturbation: &Perturbation,
        redraw_max: f64,
    ) -> bool {
        if self.unit() >= rate {
            return false;
        }

        let mutated = match perturbation {
            Perturbation::UniformDelta => *value + self.unit() - 0.5,
            Perturbation::Gaussian { strength } => {
                let noise: f64 = self.rng.sample(rand_distr::StandardNormal);
                *value + noise * strength
            }
            Perturbation::Redraw => self.unit() * redraw_max,
        };
        *value = mutated.clamp(0.0, 1.0);
        true
    }

    /// Mutate a genome in place. Returns how many genes (per-gene policy) or
    /// parameters (per-parameter policy) were touched.
    pub fn mutate(
        &mut self,
        genome: &mut Genome,
        rate: f64,
        granularity: &MutationGranularity,
        max_size: f64,
    ) -> usize {
        let mut touched = 0;

        for gene in &mut genome.genes {
            match granularity {
                MutationGranularity::PerGene => {
                    if self.unit() < rate {
                        *gene = self.random_shape(gene.kind(), max_size);
                        touched += 1;
                    }
                }
                MutationGranularity::PerParameter { perturbation } => {
                    for (role, value) in gene.parameters_mut() {
                        let redraw_max = match role {
                            ParameterRole::Size => max_size,
                            ParameterRole::Position | ParameterRole::Color => 1.0,
                        };
                        if self.mutate_parameter(value, rate, perturbation, redraw_max) {
                            touched += 1;
                        }
                    }
                }
            }
        }

        touched
    }

    /// Produce one offspring from two parents of equal length.
    pub fn crossover(
        &mut self,
        parent1: &Genome,
        parent2: &Genome,
        strategy: CrossoverStrategy,
    ) -> Genome {
        debug_assert_eq!(parent1.len(), parent2.len());

        match strategy {
            CrossoverStrategy::GeneWise => {
                let factor = self.unit();
                let genes = parent1
                    .genes
                    .iter()
                    .zip(&parent2.genes)
                    .map(|(a, b)| if self.unit() < factor { *a } else { *b })
                    .collect();
                Genome::new(genes)
            }
            CrossoverStrategy::Averaging => Genome::new(
                parent1
                    .genes
                    .iter()
                    .zip(&parent2.genes)
                    .map(|(a, b)| average_shape(a, b))
                    .collect(),
            ),
        }
    }
}

/// Parameter-wise mean of two shapes. Shapes of different primitives cannot
/// be averaged; the first parent's gene is kept.
fn average_shape(a: &Shape, b: &Shape) -> Shape {
    if a.kind() != b.kind() {
        return *a;
    }

    let mut child = *a;
    for ((_, value), other) in child.parameters_mut().into_iter().zip(b.parameters()) {
        *value = blend(*value, other, 0.5);
    }
    child
}

/// Linear blend between two values.
fn blend(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}
