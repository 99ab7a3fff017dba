//! Discriminants: reduce per-sample results to one score per hypothesis.
//!
//! A discriminant is a named plain function over the sample points of a
//! single hypothesis. Function pointers cannot capture state, so every
//! discriminant is pure by construction.

use nalgebra::DVector;

use crate::error::DistinguisherError;
use crate::types::{Precision, Results, Scores};

/// Named reduction from a hypothesis' results to its score.
#[derive(Debug, Clone, Copy)]
pub struct Discriminant<T: Precision> {
    name: &'static str,
    reduce: fn(&[T]) -> T,
}

impl<T: Precision> Discriminant<T> {
    /// Wrap a reduction function.
    pub const fn new(name: &'static str, reduce: fn(&[T]) -> T) -> Self {
        Self { name, reduce }
    }

    /// Name of this discriminant.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Score every hypothesis of `results`.
    pub fn apply(&self, results: &Results<T>) -> Result<Scores<T>, DistinguisherError> {
        let scores = DVector::from_iterator(
            results.n_hypotheses(),
            results.hypotheses().map(|samples| (self.reduce)(samples)),
        );
        Scores::new(scores, results.dims().to_vec())
    }

    /// Maximum absolute value, ignoring NaN.
    pub fn maxabs() -> Self {
        Self::new("maxabs", maxabs)
    }

    /// Maximum value, ignoring NaN.
    pub fn max() -> Self {
        Self::new("max", max)
    }

    /// Negated minimum, ignoring NaN.
    pub fn opposite_min() -> Self {
        Self::new("opposite_min", opposite_min)
    }

    /// Sum of absolute values, ignoring NaN.
    pub fn abssum() -> Self {
        Self::new("abssum", abssum)
    }
}

fn reduce_finite<T: Precision>(values: impl Iterator<Item = T>, f: impl Fn(T, T) -> T) -> T {
    values
        .filter(|v| !v.is_nan())
        .reduce(f)
        .unwrap_or_else(|| T::from_f64_lossy(f64::NAN))
}

/// Maximum absolute value, ignoring NaN. All-NaN input yields NaN.
pub fn maxabs<T: Precision>(values: &[T]) -> T {
    reduce_finite(values.iter().map(|v| v.abs()), |a, b| a.max(b))
}

/// Maximum value, ignoring NaN.
pub fn max<T: Precision>(values: &[T]) -> T {
    reduce_finite(values.iter().copied(), |a, b| a.max(b))
}

/// Negated minimum value, ignoring NaN.
pub fn opposite_min<T: Precision>(values: &[T]) -> T {
    -reduce_finite(values.iter().copied(), |a, b| a.min(b))
}

/// Sum of absolute values, ignoring NaN.
pub fn abssum<T: Precision>(values: &[T]) -> T {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(T::zero(), |acc, v| acc + v.abs())
}
