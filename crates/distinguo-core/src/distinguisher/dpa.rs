//! Difference-of-means power analysis.

use nalgebra::{DMatrix, DVector};

use super::{check_batch, Distinguisher, DistinguisherKind, Geometry};
use crate::error::DistinguisherError;
use crate::types::{Hypotheses, Precision, Results};

/// Difference between the mean trace of the "1" and "0" prediction sets.
///
/// Predictions are expected to be binary. The kernel accumulates the sum of
/// traces weighted by the prediction, the number of ones per hypothesis and
/// the plain sum of traces.
#[derive(Debug, Clone)]
pub struct Dpa<T: Precision> {
    geometry: Option<Geometry>,
    processed: usize,
    ones: DVector<T>,
    sum_ones: DMatrix<T>,
    sum: DVector<T>,
}

impl<T: Precision> Dpa<T> {
    /// Create an empty kernel.
    pub fn new() -> Self {
        Self {
            geometry: None,
            processed: 0,
            ones: DVector::zeros(0),
            sum_ones: DMatrix::zeros(0, 0),
            sum: DVector::zeros(0),
        }
    }
}

impl<T: Precision> Default for Dpa<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Precision> Distinguisher<T> for Dpa<T> {
    fn kind(&self) -> DistinguisherKind {
        DistinguisherKind::Dpa
    }

    fn fold(&mut self, data: &Hypotheses<T>, traces: &DMatrix<T>) -> Result<(), DistinguisherError> {
        if check_batch(&mut self.geometry, data, traces)? {
            let (h, s) = (data.n_hypotheses(), traces.ncols());
            self.ones = DVector::zeros(h);
            self.sum_ones = DMatrix::zeros(s, h);
            self.sum = DVector::zeros(s);
        }

        let x = data.values();
        for j in 0..x.ncols() {
            for i in 0..x.nrows() {
                self.ones[j] += x[(i, j)];
            }
        }
        for k in 0..traces.ncols() {
            for i in 0..traces.nrows() {
                self.sum[k] += traces[(i, k)];
            }
        }
        self.sum_ones += traces.tr_mul(x);

        self.processed += traces.nrows();
        Ok(())
    }

    fn reduce(&self) -> Result<Results<T>, DistinguisherError> {
        let geometry = self.geometry.as_ref().ok_or(DistinguisherError::NoData)?;
        if self.processed == 0 {
            return Err(DistinguisherError::NoData);
        }

        let n = T::from_f64_lossy(self.processed as f64);
        let values = DMatrix::from_fn(geometry.n_samples, geometry.n_hypotheses, |k, j| {
            let ones = self.ones[j];
            let mean_ones = self.sum_ones[(k, j)] / ones;
            let mean_zeros = (self.sum[k] - self.sum_ones[(k, j)]) / (n - ones);
            mean_ones - mean_zeros
        });
        Results::new(values, geometry.dims.clone())
    }

    fn processed_traces(&self) -> usize {
        self.processed
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}
