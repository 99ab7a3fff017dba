//! Partition-based distinguishers: ANOVA, NICV and SNR.
//!
//! All three share the same accumulator: for every class, hypothesis and
//! sample point, the number of traces and the sum and sum of squares of the
//! samples. They only differ in how the variance decomposition is turned
//! into a result.

use std::collections::HashMap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::{check_batch, Distinguisher, DistinguisherKind, DistinguisherParameters, Geometry};
use crate::error::DistinguisherError;
use crate::types::{Hypotheses, Precision, Results};

/// Ordered set of integer class labels.
///
/// A leakage value belongs to class `c` when it equals `values()[c]`.
/// Values that match no label are ignored by the partition-based kernels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct Partitions {
    values: Vec<i64>,
    index: HashMap<i64, usize>,
}

impl Partitions {
    /// Create partitions from explicit labels.
    ///
    /// # Errors
    ///
    /// Fails if `values` is empty or contains duplicates.
    pub fn new(values: impl Into<Vec<i64>>) -> Result<Self, DistinguisherError> {
        let values = values.into();
        if values.is_empty() {
            return Err(DistinguisherError::InvalidPartitions(
                "at least one class label is required".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(values.len());
        for (class, &value) in values.iter().enumerate() {
            if index.insert(value, class).is_some() {
                return Err(DistinguisherError::InvalidPartitions(format!(
                    "duplicate class label {}",
                    value
                )));
            }
        }
        Ok(Self { values, index })
    }

    /// Labels `0..end`.
    pub fn range(end: i64) -> Result<Self, DistinguisherError> {
        Self::new((0..end).collect::<Vec<_>>())
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for validated partitions.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Class labels in order.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Class index of a leakage value, if it is an integral label.
    pub fn classify(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value.fract() != 0.0 {
            return None;
        }
        self.index.get(&(value as i64)).copied()
    }
}

impl TryFrom<Vec<i64>> for Partitions {
    type Error = DistinguisherError;

    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Partitions> for Vec<i64> {
    fn from(partitions: Partitions) -> Self {
        partitions.values
    }
}

/// Variance decomposition of one hypothesis at one sample point.
#[derive(Debug, Clone, Copy)]
struct Decomposition<T> {
    /// Traces that fell into some class.
    n: T,
    /// Classes with at least one trace.
    classes: T,
    /// Between-class sum of squares.
    between: T,
    /// Within-class sum of squares.
    within: T,
    /// Total sum of squares.
    total: T,
}

/// Per-class running moments.
#[derive(Debug, Clone)]
struct Moments<T: Precision> {
    partitions: Partitions,
    geometry: Option<Geometry>,
    processed: usize,
    // Indexed by [class][hypothesis] and [class][hypothesis][sample].
    counts: Vec<T>,
    sums: Vec<T>,
    squares: Vec<T>,
}

impl<T: Precision> Moments<T> {
    fn new(partitions: Partitions) -> Self {
        Self {
            partitions,
            geometry: None,
            processed: 0,
            counts: Vec::new(),
            sums: Vec::new(),
            squares: Vec::new(),
        }
    }

    fn fold(&mut self, data: &Hypotheses<T>, traces: &DMatrix<T>) -> Result<(), DistinguisherError> {
        let first = check_batch(&mut self.geometry, data, traces)?;
        let (c, h, s) = (self.partitions.len(), data.n_hypotheses(), traces.ncols());
        if first {
            self.counts = vec![T::zero(); c * h];
            self.sums = vec![T::zero(); c * h * s];
            self.squares = vec![T::zero(); c * h * s];
        }

        for i in 0..traces.nrows() {
            for j in 0..h {
                let Some(class) = self.partitions.classify(data.get(i, j).to_f64()) else {
                    continue;
                };
                let cell = class * h + j;
                self.counts[cell] += T::one();
                let base = cell * s;
                for k in 0..s {
                    let v = traces[(i, k)];
                    self.sums[base + k] += v;
                    self.squares[base + k] += v * v;
                }
            }
        }

        self.processed += traces.nrows();
        Ok(())
    }

    fn reduce_with(
        &self,
        statistic: impl Fn(&Decomposition<T>) -> T,
    ) -> Result<Results<T>, DistinguisherError> {
        let geometry = self.geometry.as_ref().ok_or(DistinguisherError::NoData)?;
        if self.processed == 0 {
            return Err(DistinguisherError::NoData);
        }

        let (c, h, s) = (self.partitions.len(), geometry.n_hypotheses, geometry.n_samples);
        let values = DMatrix::from_fn(s, h, |k, j| {
            let mut n = T::zero();
            let mut classes = T::zero();
            let mut sum = T::zero();
            let mut squares = T::zero();
            let mut weighted = T::zero();

            for class in 0..c {
                let cell = class * h + j;
                let count = self.counts[cell];
                if count == T::zero() {
                    continue;
                }
                let class_sum = self.sums[cell * s + k];
                n += count;
                classes += T::one();
                sum += class_sum;
                squares += self.squares[cell * s + k];
                weighted += class_sum * class_sum / count;
            }

            let correction = sum * sum / n;
            statistic(&Decomposition {
                n,
                classes,
                between: weighted - correction,
                within: squares - weighted,
                total: squares - correction,
            })
        });
        Results::new(values, geometry.dims.clone())
    }

    fn reset(&mut self) {
        *self = Self::new(self.partitions.clone());
    }
}

macro_rules! partitioned_distinguisher {
    ($(#[$meta:meta])* $name:ident, $kind:expr, $statistic:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name<T: Precision>(Moments<T>);

        impl<T: Precision> $name<T> {
            /// Create an empty kernel over the given partitions.
            pub fn new(partitions: Partitions) -> Self {
                Self(Moments::new(partitions))
            }

            /// Class labels in use.
            pub fn partitions(&self) -> &Partitions {
                &self.0.partitions
            }
        }

        impl<T: Precision> Distinguisher<T> for $name<T> {
            fn kind(&self) -> DistinguisherKind {
                $kind
            }

            fn parameters(&self) -> DistinguisherParameters {
                DistinguisherParameters::default().with_partitions(self.0.partitions.clone())
            }

            fn fold(
                &mut self,
                data: &Hypotheses<T>,
                traces: &DMatrix<T>,
            ) -> Result<(), DistinguisherError> {
                self.0.fold(data, traces)
            }

            fn reduce(&self) -> Result<Results<T>, DistinguisherError> {
                self.0.reduce_with($statistic)
            }

            fn processed_traces(&self) -> usize {
                self.0.processed
            }

            fn reset(&mut self) {
                self.0.reset();
            }
        }
    };
}

partitioned_distinguisher!(
    /// One-way analysis of variance: F = (SSB / (k - 1)) / (SSW / (n - k)).
    Anova,
    DistinguisherKind::Anova,
    |d: &Decomposition<T>| {
        let one = T::one();
        (d.between / (d.classes - one)) / (d.within / (d.n - d.classes))
    }
);

partitioned_distinguisher!(
    /// Normalized inter-class variance: Var(E[X | Y]) / Var(X).
    Nicv,
    DistinguisherKind::Nicv,
    |d: &Decomposition<T>| d.between / d.total
);

partitioned_distinguisher!(
    /// Signal-to-noise ratio: Var(E[X | Y]) / E[Var(X | Y)].
    Snr,
    DistinguisherKind::Snr,
    |d: &Decomposition<T>| d.between / d.within
);
