//! Incremental distinguisher kernels.
//!
//! A distinguisher folds batches of hypothesized leakage values together
//! with the matching measured traces into running sufficient statistics,
//! and reduces them on demand to one result per hypothesis and sample.
//!
//! Folding must be associative and order independent: folding `B1` then
//! `B2`, `B2` then `B1`, or the concatenation in one call yields the same
//! accumulator up to floating-point rounding. Checkpointed partial results
//! of an analysis are only meaningful because of this property.

mod cpa;
mod dpa;
mod mia;
mod partitioned;

pub use cpa::Cpa;
pub use dpa::Dpa;
pub use mia::{HistogramConfig, Mia};
pub use partitioned::{Anova, Nicv, Partitions, Snr};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::DistinguisherError;
use crate::types::{Hypotheses, Precision, Results};

/// Incremental statistics backend of an analysis.
///
/// Implementors own their accumulator exclusively. It is only mutated
/// through [`fold`](Distinguisher::fold) and [`reset`](Distinguisher::reset)
/// and is never read directly by the engine.
pub trait Distinguisher<T: Precision>: Send {
    /// Statistical family of this kernel.
    fn kind(&self) -> DistinguisherKind;

    /// Construction parameters, used to rebuild an equivalent empty kernel.
    fn parameters(&self) -> DistinguisherParameters {
        DistinguisherParameters::default()
    }

    /// Fold one batch of leakage values and the corresponding traces.
    ///
    /// `data` has one row per trace; `traces` is `(traces × samples)`.
    ///
    /// # Errors
    ///
    /// Fails with [`DistinguisherError::ShapeMismatch`] if the hypothesis
    /// dimensions or the sample count differ from previously folded data.
    fn fold(&mut self, data: &Hypotheses<T>, traces: &DMatrix<T>) -> Result<(), DistinguisherError>;

    /// Compute results from the current accumulator without mutating it.
    ///
    /// # Errors
    ///
    /// Fails with [`DistinguisherError::NoData`] before the first fold.
    fn reduce(&self) -> Result<Results<T>, DistinguisherError>;

    /// Number of traces folded so far.
    fn processed_traces(&self) -> usize;

    /// Drop all accumulated state.
    fn reset(&mut self);
}

/// Statistical family of a distinguisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistinguisherKind {
    /// Correlation power analysis.
    Cpa,
    /// Difference of means on a binary prediction.
    Dpa,
    /// Analysis of variance (F-ratio).
    Anova,
    /// Normalized inter-class variance.
    Nicv,
    /// Signal-to-noise ratio.
    Snr,
    /// Mutual information on per-class histograms.
    Mia,
}

impl DistinguisherKind {
    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            DistinguisherKind::Cpa => "cpa",
            DistinguisherKind::Dpa => "dpa",
            DistinguisherKind::Anova => "anova",
            DistinguisherKind::Nicv => "nicv",
            DistinguisherKind::Snr => "snr",
            DistinguisherKind::Mia => "mia",
        }
    }

    /// Whether the kernel needs [`Partitions`].
    pub fn is_partitioned(self) -> bool {
        matches!(
            self,
            DistinguisherKind::Anova
                | DistinguisherKind::Nicv
                | DistinguisherKind::Snr
                | DistinguisherKind::Mia
        )
    }

    /// Whether the kernel needs a binary leakage model.
    pub fn requires_binary_model(self) -> bool {
        matches!(self, DistinguisherKind::Dpa)
    }

    /// Build an empty kernel of this kind.
    ///
    /// # Errors
    ///
    /// Partition-based kinds fail without `parameters.partitions`; `Mia`
    /// additionally fails without a valid `parameters.histogram`.
    pub fn build<T: Precision>(
        self,
        parameters: &DistinguisherParameters,
    ) -> Result<Box<dyn Distinguisher<T>>, DistinguisherError> {
        let partitions = || {
            parameters
                .partitions
                .clone()
                .ok_or(DistinguisherError::MissingPartitions(self.name()))
        };

        Ok(match self {
            DistinguisherKind::Cpa => Box::new(Cpa::new()),
            DistinguisherKind::Dpa => Box::new(Dpa::new()),
            DistinguisherKind::Anova => Box::new(Anova::new(partitions()?)),
            DistinguisherKind::Nicv => Box::new(Nicv::new(partitions()?)),
            DistinguisherKind::Snr => Box::new(Snr::new(partitions()?)),
            DistinguisherKind::Mia => {
                let partitions = partitions()?;
                let histogram = parameters
                    .histogram
                    .clone()
                    .ok_or(DistinguisherError::MissingHistogram(self.name()))?;
                Box::new(Mia::new(partitions, histogram)?)
            }
        })
    }
}

impl std::fmt::Display for DistinguisherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistinguisherKind::Cpa => write!(f, "CPA"),
            DistinguisherKind::Dpa => write!(f, "DPA"),
            DistinguisherKind::Anova => write!(f, "ANOVA"),
            DistinguisherKind::Nicv => write!(f, "NICV"),
            DistinguisherKind::Snr => write!(f, "SNR"),
            DistinguisherKind::Mia => write!(f, "MIA"),
        }
    }
}

/// Declared construction parameters of a kernel.
///
/// This is the complete list of fields carried over when an analysis is
/// rebuilt from an existing distinguisher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistinguisherParameters {
    /// Class labels for partition-based kernels.
    #[serde(default)]
    pub partitions: Option<Partitions>,
    /// Histogram definition for `Mia`.
    #[serde(default)]
    pub histogram: Option<HistogramConfig>,
}

impl DistinguisherParameters {
    /// Parameters with partitions set.
    pub fn with_partitions(mut self, partitions: Partitions) -> Self {
        self.partitions = Some(partitions);
        self
    }

    /// Parameters with a histogram definition set.
    pub fn with_histogram(mut self, histogram: HistogramConfig) -> Self {
        self.histogram = Some(histogram);
        self
    }
}

/// Shape of the data a kernel has accepted so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub dims: Vec<usize>,
    pub n_hypotheses: usize,
    pub n_samples: usize,
}

impl Geometry {
    fn shape(&self) -> Vec<usize> {
        let mut shape = self.dims.clone();
        shape.push(self.n_samples);
        shape
    }
}

/// Validate a batch against the geometry recorded by earlier folds.
///
/// Returns `true` when this is the first accepted batch, so the caller knows
/// to allocate its accumulator.
pub(crate) fn check_batch<T: Precision>(
    geometry: &mut Option<Geometry>,
    data: &Hypotheses<T>,
    traces: &DMatrix<T>,
) -> Result<bool, DistinguisherError> {
    if data.n_traces() != traces.nrows() {
        return Err(DistinguisherError::BatchMismatch {
            data_rows: data.n_traces(),
            trace_rows: traces.nrows(),
        });
    }
    if traces.ncols() == 0 {
        return Err(DistinguisherError::EmptyTraces);
    }

    let incoming = Geometry {
        dims: data.dims().to_vec(),
        n_hypotheses: data.n_hypotheses(),
        n_samples: traces.ncols(),
    };

    match geometry {
        Some(existing) if *existing == incoming => Ok(false),
        Some(existing) => Err(DistinguisherError::ShapeMismatch {
            expected: existing.shape(),
            got: incoming.shape(),
        }),
        None => {
            *geometry = Some(incoming);
            Ok(true)
        }
    }
}
