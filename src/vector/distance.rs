//! Distance metrics.
//!
//! Every metric is expressed as a distance where smaller means closer, so
//! the graph code only ever minimizes. [`DistanceMetric::score`] converts
//! back to a similarity where larger means closer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Similarity metric of an index. Fixed when the index is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Cosine distance `1 - cos(a, b)`, in `[0, 2]`.
    #[default]
    Cosine,
    /// Euclidean distance.
    L2,
    /// Negated inner product.
    Dot,
}

impl DistanceMetric {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
            Self::Dot => "dot",
        }
    }

    /// Distance between two vectors of equal length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        self.distance_with_norms(a, norm(a), b, norm(b))
    }

    /// Distance with precomputed L2 norms (only cosine reads them).
    ///
    /// A zero vector has no direction; its cosine distance to anything is 1.
    #[inline]
    pub fn distance_with_norms(&self, a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
        match self {
            Self::Cosine => {
                let denom = a_norm * b_norm;
                if denom <= f32::EPSILON {
                    1.0
                } else {
                    1.0 - (dot(a, b) / denom).clamp(-1.0, 1.0)
                }
            }
            Self::L2 => l2_squared(a, b).sqrt(),
            Self::Dot => -dot(a, b),
        }
    }

    /// Converts a distance into a similarity score (higher is closer).
    ///
    /// | Metric | Score |
    /// |--------|-------|
    /// | Cosine | `1 - d` (cosine similarity) |
    /// | L2 | `1 / (1 + d)` |
    /// | Dot | `-d` (the inner product) |
    #[inline]
    pub fn score(&self, distance: f32) -> f32 {
        match self {
            Self::Cosine => 1.0 - distance,
            Self::L2 => 1.0 / (1.0 + distance),
            Self::Dot => -distance,
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            "dot" | "ip" | "inner_product" => Ok(Self::Dot),
            other => Err(ValidationError::invalid_field(
                "metric",
                format!("unknown metric '{}', expected cosine, l2 or dot", other),
            )),
        }
    }
}

/// Inner product.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// L2 norm.
#[inline]
pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

#[inline]
fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
