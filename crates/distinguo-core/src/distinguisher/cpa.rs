//! Correlation power analysis.

use nalgebra::{DMatrix, DVector};

use super::{check_batch, Distinguisher, DistinguisherKind, Geometry};
use crate::error::DistinguisherError;
use crate::types::{Hypotheses, Precision, Results};

/// Pearson correlation between predicted leakage and every sample point.
///
/// Keeps running sums of the predictions (`x`), the traces (`y`), their
/// squares and the cross-products `xᵀy`. All of them are plain sums, so
/// folding is order independent.
#[derive(Debug, Clone)]
pub struct Cpa<T: Precision> {
    geometry: Option<Geometry>,
    processed: usize,
    ex: DVector<T>,
    ex2: DVector<T>,
    ey: DVector<T>,
    ey2: DVector<T>,
    exy: DMatrix<T>,
}

impl<T: Precision> Cpa<T> {
    /// Create an empty kernel.
    pub fn new() -> Self {
        Self {
            geometry: None,
            processed: 0,
            ex: DVector::zeros(0),
            ex2: DVector::zeros(0),
            ey: DVector::zeros(0),
            ey2: DVector::zeros(0),
            exy: DMatrix::zeros(0, 0),
        }
    }
}

impl<T: Precision> Default for Cpa<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Precision> Distinguisher<T> for Cpa<T> {
    fn kind(&self) -> DistinguisherKind {
        DistinguisherKind::Cpa
    }

    fn fold(&mut self, data: &Hypotheses<T>, traces: &DMatrix<T>) -> Result<(), DistinguisherError> {
        if check_batch(&mut self.geometry, data, traces)? {
            let (h, s) = (data.n_hypotheses(), traces.ncols());
            self.ex = DVector::zeros(h);
            self.ex2 = DVector::zeros(h);
            self.ey = DVector::zeros(s);
            self.ey2 = DVector::zeros(s);
            self.exy = DMatrix::zeros(s, h);
        }

        let x = data.values();
        for j in 0..x.ncols() {
            for i in 0..x.nrows() {
                let v = x[(i, j)];
                self.ex[j] += v;
                self.ex2[j] += v * v;
            }
        }
        for k in 0..traces.ncols() {
            for i in 0..traces.nrows() {
                let v = traces[(i, k)];
                self.ey[k] += v;
                self.ey2[k] += v * v;
            }
        }
        self.exy += traces.tr_mul(x);

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
            let cov = n * self.exy[(k, j)] - self.ex[j] * self.ey[k];
            let var_x = n * self.ex2[j] - self.ex[j] * self.ex[j];
            let var_y = n * self.ey2[k] - self.ey[k] * self.ey[k];
            cov / (var_x * var_y).sqrt()
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
