//! Mutual information analysis.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::{check_batch, Distinguisher, DistinguisherKind, DistinguisherParameters, Geometry, Partitions};
use crate::error::DistinguisherError;
use crate::types::{Hypotheses, Precision, Results};

/// Default number of histogram bins.
pub const DEFAULT_BINS: usize = 128;

/// Histogram definition for [`Mia`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    /// Number of equal-width bins.
    ///
    /// Default: 128. Ignored when `bin_edges` is set.
    pub bins_number: usize,

    /// Explicit, strictly increasing bin edges.
    ///
    /// Default: None. When absent, edges span the minimum and maximum sample
    /// of the first folded batch.
    #[serde(default)]
    pub bin_edges: Option<Vec<f64>>,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bins_number: DEFAULT_BINS,
            bin_edges: None,
        }
    }
}

impl HistogramConfig {
    /// Histogram with `bins_number` bins and data-derived edges.
    pub fn new(bins_number: usize) -> Self {
        Self {
            bins_number,
            bin_edges: None,
        }
    }

    /// Histogram with explicit edges.
    pub fn with_edges(edges: Vec<f64>) -> Self {
        Self {
            bins_number: edges.len().saturating_sub(1),
            bin_edges: Some(edges),
        }
    }

    /// Number of bins actually used.
    pub fn bins(&self) -> usize {
        match &self.bin_edges {
            Some(edges) => edges.len().saturating_sub(1),
            None => self.bins_number,
        }
    }

    /// Check the definition is usable.
    pub fn validate(&self) -> Result<(), DistinguisherError> {
        match &self.bin_edges {
            Some(edges) => {
                if edges.len() < 2 {
                    return Err(DistinguisherError::InvalidHistogram(
                        "at least two bin edges are required".to_string(),
                    ));
                }
                if edges.iter().any(|e| !e.is_finite()) {
                    return Err(DistinguisherError::InvalidHistogram(
                        "bin edges must be finite".to_string(),
                    ));
                }
                if edges.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(DistinguisherError::InvalidHistogram(
                        "bin edges must be strictly increasing".to_string(),
                    ));
                }
            }
            None => {
                if self.bins_number == 0 {
                    return Err(DistinguisherError::InvalidHistogram(
                        "bins_number must be > 0".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Equal-width edges over `[min, max]`.
fn linear_edges(min: f64, max: f64, bins: usize) -> Vec<f64> {
    let (min, max) = if max > min { (min, max) } else { (min - 0.5, min + 0.5) };
    let width = (max - min) / bins as f64;
    (0..=bins).map(|b| min + width * b as f64).collect()
}

/// Bin index of `value`; values outside the edges land in the outer bins.
fn bin_of(edges: &[f64], value: f64) -> usize {
    let bins = edges.len() - 1;
    if value.is_nan() || value <= edges[0] {
        return 0;
    }
    if value >= edges[bins] {
        return bins - 1;
    }
    edges.partition_point(|&e| e <= value) - 1
}

/// Mutual information between class membership and the sample distribution.
///
/// For every class, hypothesis and sample point the kernel keeps a histogram
/// of the observed samples. Counts only add up, so folding is order
/// independent once the bin edges are fixed. Results are in nats.
#[derive(Debug, Clone)]
pub struct Mia<T: Precision> {
    partitions: Partitions,
    histogram: HistogramConfig,
    edges: Option<Vec<f64>>,
    geometry: Option<Geometry>,
    processed: usize,
    // Indexed by [class][hypothesis][bin][sample].
    counts: Vec<u64>,
    _precision: std::marker::PhantomData<T>,
}

impl<T: Precision> Mia<T> {
    /// Create an empty kernel.
    ///
    /// # Errors
    ///
    /// Fails if the histogram definition is invalid.
    pub fn new(partitions: Partitions, histogram: HistogramConfig) -> Result<Self, DistinguisherError> {
        histogram.validate()?;
        Ok(Self {
            edges: histogram.bin_edges.clone(),
            partitions,
            histogram,
            geometry: None,
            processed: 0,
            counts: Vec::new(),
            _precision: std::marker::PhantomData,
        })
    }

    /// Bin edges in use, once known.
    pub fn edges(&self) -> Option<&[f64]> {
        self.edges.as_deref()
    }

    fn derive_edges(&self, traces: &DMatrix<T>) -> Vec<f64> {
        let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
        for v in traces.iter() {
            let v = v.to_f64();
            if v.is_finite() {
                min = min.min(v);
                max = max.max(v);
            }
        }
        if !min.is_finite() {
            (min, max) = (0.0, 0.0);
        }
        linear_edges(min, max, self.histogram.bins())
    }
}

impl<T: Precision> Distinguisher<T> for Mia<T> {
    fn kind(&self) -> DistinguisherKind {
        DistinguisherKind::Mia
    }

    fn parameters(&self) -> DistinguisherParameters {
        DistinguisherParameters::default()
            .with_partitions(self.partitions.clone())
            .with_histogram(self.histogram.clone())
    }

    fn fold(&mut self, data: &Hypotheses<T>, traces: &DMatrix<T>) -> Result<(), DistinguisherError> {
        let first = check_batch(&mut self.geometry, data, traces)?;
        let edges = match self.edges.take() {
            Some(edges) => edges,
            None => self.derive_edges(traces),
        };
        let (c, h, s, b) = (self.partitions.len(), data.n_hypotheses(), traces.ncols(), edges.len() - 1);
        if first {
            self.counts = vec![0; c * h * b * s];
        }

        let n = traces.nrows();
        let mut bins = vec![0usize; n * s];
        for i in 0..n {
            for k in 0..s {
                bins[i * s + k] = bin_of(&edges, traces[(i, k)].to_f64());
            }
        }

        for i in 0..n {
            for j in 0..h {
                let Some(class) = self.partitions.classify(data.get(i, j).to_f64()) else {
                    continue;
                };
                let base = (class * h + j) * b;
                for k in 0..s {
                    self.counts[(base + bins[i * s + k]) * s + k] += 1;
                }
            }
        }

        self.edges = Some(edges);
        self.processed += n;
        Ok(())
    }

    fn reduce(&self) -> Result<Results<T>, DistinguisherError> {
        let geometry = self.geometry.as_ref().ok_or(DistinguisherError::NoData)?;
        let edges = self.edges.as_ref().ok_or(DistinguisherError::NoData)?;
        if self.processed == 0 {
            return Err(DistinguisherError::NoData);
        }

        let (c, h, s, b) = (self.partitions.len(), geometry.n_hypotheses, geometry.n_samples, edges.len() - 1);
        let mut marginal = vec![0u64; b];
        let values = DMatrix::from_fn(s, h, |k, j| {
            marginal.iter_mut().for_each(|m| *m = 0);
            let mut total = 0u64;
            let mut conditional = 0.0;

            for class in 0..c {
                let base = (class * h + j) * b;
                let class_total: u64 = (0..b).map(|bin| self.counts[(base + bin) * s + k]).sum();
                if class_total == 0 {
                    continue;
                }
                let mut entropy = 0.0;
                for (bin, m) in marginal.iter_mut().enumerate() {
                    let count = self.counts[(base + bin) * s + k];
                    *m += count;
                    if count > 0 {
                        let p = count as f64 / class_total as f64;
                        entropy -= p * p.ln();
                    }
                }
                conditional += class_total as f64 * entropy;
                total += class_total;
            }

            if total == 0 {
                return T::from_f64_lossy(f64::NAN);
            }
            let entropy: f64 = marginal
                .iter()
                .filter(|&&m| m > 0)
                .map(|&m| {
                    let p = m as f64 / total as f64;
                    -p * p.ln()
                })
                .sum();
            T::from_f64_lossy(entropy - conditional / total as f64)
        });
        Results::new(values, geometry.dims.clone())
    }

    fn processed_traces(&self) -> usize {
        self.processed
    }

    fn reset(&mut self) {
        self.edges = self.histogram.bin_edges.clone();
        self.geometry = None;
        self.processed = 0;
        self.counts.clear();
    }
}
