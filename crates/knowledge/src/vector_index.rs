//! Vector index abstraction for embedded items.

use crate::types::{EmbeddedItem, SearchHit};
use estate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How distance between two vectors is measured. Smaller is always closer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// L2 distance
    #[default]
    Euclidean,

    /// Negated dot product
    InnerProduct,
}

impl DistanceMetric {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "inner_product" | "ip" | "dot" => Ok(Self::InnerProduct),
            other => Err(AppError::Config(format!(
                "Unknown distance metric '{}'. Supported: euclidean, inner_product",
                other
            ))),
        }
    }

    /// Distance between two equal-length vectors.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            Self::InnerProduct => -a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Euclidean => write!(f, "euclidean"),
            Self::InnerProduct => write!(f, "inner_product"),
        }
    }
}

/// Trait for vector index backends.
///
/// Implementations must:
/// - fix the vector dimension on first insert and reject mismatches
/// - return at most `k` hits in non-decreasing distance order
/// - fail with `AppError::EmptyStore` when searched with nothing stored
pub trait VectorIndex: Send + Sync {
    /// Append an item.
    fn insert(&mut self, item: EmbeddedItem) -> AppResult<()>;

    /// The `k` items nearest to `query`.
    fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<SearchHit>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension, once known.
    fn dimensions(&self) -> Option<usize>;

    fn metric(&self) -> DistanceMetric;
}
