//! Numeric types shared by the kernels and the analysis engine.

use core::cmp::Ordering;

use nalgebra::{DMatrix, DVector, RealField, Scalar};

use crate::error::DistinguisherError;

/// Floating-point width used for every accumulator of an analysis.
///
/// Implemented for `f32` and `f64`. The precision is a type parameter, so it
/// is fixed when a kernel or an analysis is constructed.
pub trait Precision: RealField + Copy + Send + Sync + 'static {
    /// Human readable name (`"float32"` or `"float64"`).
    const NAME: &'static str;

    /// Convert from `f64`, rounding if needed.
    fn from_f64_lossy(value: f64) -> Self;

    /// Widen to `f64`.
    fn to_f64(self) -> f64;

    /// Convert a raw trace sample.
    fn from_sample(value: f32) -> Self;

    /// Whether the value is NaN.
    fn is_nan(self) -> bool;
}

impl Precision for f32 {
    const NAME: &'static str = "float32";

    #[inline]
    fn from_f64_lossy(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_sample(value: f32) -> Self {
        value
    }

    #[inline]
    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
}

impl Precision for f64 {
    const NAME: &'static str = "float64";

    #[inline]
    fn from_f64_lossy(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_sample(value: f32) -> Self {
        value as f64
    }

    #[inline]
    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
}

/// Per-trace values for every hypothesis.
///
/// Rows are traces. Columns are the hypothesis dimensions flattened in
/// row-major order, so for `dims = [256, 16]` the column of guess `g` and
/// byte `b` is `g * 16 + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypotheses<V: Scalar> {
    values: DMatrix<V>,
    dims: Vec<usize>,
}

impl<V: Scalar> Hypotheses<V> {
    /// Wrap a `(traces × hypotheses)` matrix with its hypothesis dimensions.
    pub fn new(values: DMatrix<V>, dims: Vec<usize>) -> Result<Self, DistinguisherError> {
        let expected: usize = dims.iter().product();
        if expected != values.ncols() {
            return Err(DistinguisherError::InvalidDims {
                dims,
                columns: values.ncols(),
            });
        }
        Ok(Self { values, dims })
    }

    /// Build from a function of `(trace, flat hypothesis index)`.
    pub fn from_fn(
        n_traces: usize,
        dims: Vec<usize>,
        mut f: impl FnMut(usize, usize) -> V,
    ) -> Self {
        let columns: usize = dims.iter().product();
        let values = DMatrix::from_fn(n_traces, columns, |i, j| f(i, j));
        Self { values, dims }
    }

    /// Number of traces (rows).
    pub fn n_traces(&self) -> usize {
        self.values.nrows()
    }

    /// Number of flattened hypotheses (columns).
    pub fn n_hypotheses(&self) -> usize {
        self.values.ncols()
    }

    /// Hypothesis dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Underlying `(traces × hypotheses)` matrix.
    pub fn values(&self) -> &DMatrix<V> {
        &self.values
    }

    /// Value for one trace and one flattened hypothesis.
    pub fn get(&self, trace: usize, hypothesis: usize) -> V {
        self.values[(trace, hypothesis)].clone()
    }

    /// Apply `f` elementwise, keeping the dimensions.
    pub fn map<W: Scalar>(&self, mut f: impl FnMut(V) -> W) -> Hypotheses<W> {
        Hypotheses {
            values: self.values.map(|v| f(v)),
            dims: self.dims.clone(),
        }
    }
}

/// Output of a distinguisher reduction.
///
/// Stored as a `(samples × hypotheses)` matrix: each column holds the
/// per-sample result of one hypothesis and is contiguous in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Results<T: Precision> {
    values: DMatrix<T>,
    dims: Vec<usize>,
}

impl<T: Precision> Results<T> {
    /// Wrap a `(samples × hypotheses)` matrix.
    pub fn new(values: DMatrix<T>, dims: Vec<usize>) -> Result<Self, DistinguisherError> {
        let expected: usize = dims.iter().product();
        if expected != values.ncols() {
            return Err(DistinguisherError::InvalidDims {
                dims,
                columns: values.ncols(),
            });
        }
        Ok(Self { values, dims })
    }

    /// Number of sample points per hypothesis.
    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    /// Number of flattened hypotheses.
    pub fn n_hypotheses(&self) -> usize {
        self.values.ncols()
    }

    /// Hypothesis dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Underlying `(samples × hypotheses)` matrix.
    pub fn values(&self) -> &DMatrix<T> {
        &self.values
    }

    /// Result for one hypothesis at one sample point.
    pub fn get(&self, hypothesis: usize, sample: usize) -> T {
        self.values[(sample, hypothesis)]
    }

    /// All sample points of one hypothesis.
    pub fn hypothesis(&self, hypothesis: usize) -> &[T] {
        let n = self.n_samples();
        &self.values.as_slice()[hypothesis * n..(hypothesis + 1) * n]
    }

    /// Iterate over hypotheses, yielding each one's sample points.
    pub fn hypotheses(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.n_hypotheses()).map(move |j| self.hypothesis(j))
    }
}

/// One score per hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Scores<T: Precision> {
    values: DVector<T>,
    dims: Vec<usize>,
}

impl<T: Precision> Scores<T> {
    /// Wrap a vector of flattened hypothesis scores.
    pub fn new(values: DVector<T>, dims: Vec<usize>) -> Result<Self, DistinguisherError> {
        let expected: usize = dims.iter().product();
        if expected != values.len() {
            return Err(DistinguisherError::InvalidDims {
                dims,
                columns: values.len(),
            });
        }
        Ok(Self { values, dims })
    }

    /// Number of flattened hypotheses.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no hypotheses.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Hypothesis dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Underlying score vector.
    pub fn values(&self) -> &DVector<T> {
        &self.values
    }

    /// Score of one flattened hypothesis.
    pub fn get(&self, hypothesis: usize) -> T {
        self.values[hypothesis]
    }

    /// Scores as a slice.
    pub fn as_slice(&self) -> &[T] {
        self.values.as_slice()
    }

    /// Index of the highest score, ignoring NaN. Ties go to the lowest index.
    pub fn best(&self) -> Option<usize> {
        self.as_slice()
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, v)| !v.is_nan())
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .map(|(i, _)| i)
    }

    /// Hypothesis indices sorted by decreasing score. NaN scores come last.
    pub fn ranking(&self) -> Vec<usize> {
        let scores = self.as_slice();
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| match (scores[a].is_nan(), scores[b].is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal),
        });
        order
    }
}

/// Scores stacked along a trailing checkpoint axis.
///
/// Checkpoints are kept as one score vector each, so appending never moves
/// earlier ones. [`to_matrix`](Self::to_matrix) gives the
/// `(hypotheses × checkpoints)` view.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceTrace<T: Precision> {
    checkpoints: Vec<DVector<T>>,
    dims: Vec<usize>,
}

impl<T: Precision> ConvergenceTrace<T> {
    /// Empty trace (zero checkpoints) for the given hypothesis dimensions.
    pub fn new(dims: Vec<usize>) -> Self {
        Self {
            checkpoints: Vec::new(),
            dims,
        }
    }

    /// Append one checkpoint.
    pub fn push(&mut self, scores: &Scores<T>) -> Result<(), DistinguisherError> {
        if scores.dims() != self.dims.as_slice() {
            return Err(DistinguisherError::ShapeMismatch {
                expected: self.dims.clone(),
                got: scores.dims().to_vec(),
            });
        }
        self.checkpoints.push(scores.values().clone());
        Ok(())
    }

    /// Number of checkpoints recorded.
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Whether no checkpoint has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Hypothesis dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Every checkpoint as a `(hypotheses × checkpoints)` matrix.
    pub fn to_matrix(&self) -> DMatrix<T> {
        let rows: usize = self.dims.iter().product();
        if self.checkpoints.is_empty() {
            return DMatrix::zeros(rows, 0);
        }
        DMatrix::from_columns(&self.checkpoints)
    }

    /// Scores of every hypothesis at one checkpoint.
    pub fn checkpoint(&self, index: usize) -> Option<&DVector<T>> {
        self.checkpoints.get(index)
    }

    /// Trajectory of one hypothesis across checkpoints.
    pub fn series(&self, hypothesis: usize) -> Vec<T> {
        self.checkpoints.iter().map(|c| c[hypothesis]).collect()
    }
}
