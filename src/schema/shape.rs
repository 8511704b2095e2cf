//! Shape primitives and the genome that orders them.
//!
//! Every shape parameter lives in normalized `[0, 1]` space: positions and
//! sizes are scaled by the canvas dimensions at render time and colors are
//! linear RGB intensities.

use serde::{Deserialize, Serialize};

/// Primitive drawn by a gene.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ShapeKind {
    /// Disc centered on (x, y); radius scales with canvas width.
    #[default]
    Circle,
    /// Axis-aligned rectangle centered on (x, y).
    Rectangle,
    /// Axis-aligned ellipse centered on (x, y).
    Ellipse,
}

/// What a shape parameter controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterRole {
    Position,
    Size,
    Color,
}

/// A single drawable primitive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Shape {
    Circle {
        x: f64,
        y: f64,
        radius: f64,
        color: [f64; 3],
    },
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: [f64; 3],
    },
    Ellipse {
        x: f64,
        y: f64,
        radius_x: f64,
        radius_y: f64,
        color: [f64; 3],
    },
}

impl Shape {
    /// Primitive of this shape.
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Circle { .. } => ShapeKind::Circle,
            Self::Rectangle { .. } => ShapeKind::Rectangle,
            Self::Ellipse { .. } => ShapeKind::Ellipse,
        }
    }

    /// Fill color.
    pub fn color(&self) -> [f64; 3] {
        match self {
            Self::Circle { color, .. }
            | Self::Rectangle { color, .. }
            | Self::Ellipse { color, .. } => *color,
        }
    }

    /// Center position.
    pub fn center(&self) -> (f64, f64) {
        match *self {
            Self::Circle { x, y, .. } | Self::Rectangle { x, y, .. } | Self::Ellipse { x, y, .. } => {
                (x, y)
            }
        }
    }

    /// All parameters in a fixed order: position, size, then color.
    pub fn parameters(&self) -> Vec<f64> {
        let mut params = match *self {
            Self::Circle { x, y, radius, .. } => vec![x, y, radius],
            Self::Rectangle {
                x, y, width, height, ..
            } => vec![x, y, width, height],
            Self::Ellipse {
                x,
                y,
                radius_x,
                radius_y,
                ..
            } => vec![x, y, radius_x, radius_y],
        };
        params.extend_from_slice(&self.color());
        params
    }

    /// Mutable access to every parameter, in the order of [`Shape::parameters`].
    pub fn parameters_mut(&mut self) -> Vec<(ParameterRole, &mut f64)> {
        use ParameterRole::*;

        match self {
            Self::Circle {
                x,
                y,
                radius,
                color: [r, g, b],
            } => vec![
                (Position, x),
                (Position, y),
                (Size, radius),
                (Color, r),
                (Color, g),
                (Color, b),
            ],
            Self::Rectangle {
                x,
                y,
                width,
                height,
                color: [r, g, b],
            } => vec![
                (Position, x),
                (Position, y),
                (Size, width),
                (Size, height),
                (Color, r),
                (Color, g),
                (Color, b),
            ],
            Self::Ellipse {
                x,
                y,
                radius_x,
                radius_y,
                color: [r, g, b],
            } => vec![
                (Position, x),
                (Position, y),
                (Size, radius_x),
                (Size, radius_y),
                (Color, r),
                (Color, g),
                (Color, b),
            ],
        }
    }

    /// Number of mutable parameters.
    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Circle { .. } => 6,
            Self::Rectangle { .. } | Self::Ellipse { .. } => 7,
        }
    }

    /// Whether every parameter lies in `[0, 1]`.
    pub fn is_normalized(&self) -> bool {
        self.parameters()
            .iter()
            .all(|p| (0.0..=1.0).contains(p))
    }
}

/// An ordered, fixed-length sequence of shapes. Later genes paint over
/// earlier ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Genome {
    pub genes: Vec<Shape>,
}

impl Genome {
    pub fn new(genes: Vec<Shape>) -> Self {
        Self { genes }
    }

    /// Number of genes.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Total number of evolvable parameters.
    pub fn parameter_count(&self) -> usize {
        self.genes.iter().map(Shape::parameter_count).sum()
    }
}
