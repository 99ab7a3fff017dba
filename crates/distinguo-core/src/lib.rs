//! Core statistics for side-channel distinguishers.
//!
//! This crate provides the incremental statistical kernels used by the
//! `distinguo` analysis engine. Each kernel folds batches of hypothesized
//! leakage values and measured samples into running sufficient statistics,
//! and reduces them on demand to a result per hypothesis and sample point.
//!
//! # Kernels
//!
//! - [`Cpa`](distinguisher::Cpa): Pearson correlation
//! - [`Dpa`](distinguisher::Dpa): difference of means for binary predictions
//! - [`Anova`](distinguisher::Anova): F-ratio across partitions
//! - [`Nicv`](distinguisher::Nicv): normalized inter-class variance
//! - [`Snr`](distinguisher::Snr): signal-to-noise ratio
//! - [`Mia`](distinguisher::Mia): histogram-based mutual information
//!
//! # Usage
//!
//! This crate is typically used through the main `distinguo` crate, which
//! provides batching, selection functions, leakage models and convergence
//! tracking. The kernels can also be driven directly:
//!
//! ```ignore
//! use distinguo_core::{distinguisher::{Cpa, Distinguisher}, Hypotheses};
//!
//! let mut cpa = Cpa::<f64>::new();
//! cpa.fold(&leakage, &traces)?;
//! let results = cpa.reduce()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod discriminant;
pub mod distinguisher;
pub mod error;
pub mod types;

pub use discriminant::Discriminant;
pub use distinguisher::{
    Distinguisher, DistinguisherKind, DistinguisherParameters, HistogramConfig, Partitions,
};
pub use error::DistinguisherError;
pub use types::{ConvergenceTrace, Hypotheses, Precision, Results, Scores};
