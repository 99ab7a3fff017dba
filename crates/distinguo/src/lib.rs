//! # distinguo
//!
//! Batched side-channel analyses over large trace sets.
//!
//! An [`Analysis`] combines:
//! - a [`SelectionFunction`] computing intermediate values from metadata,
//! - a [`LeakageModel`] turning them into predicted leakage,
//! - a distinguisher (CPA, DPA, ANOVA, NICV, SNR or MIA) accumulating
//!   statistics batch after batch,
//! - a [`Discriminant`] reducing per-sample results to one score per
//!   hypothesis.
//!
//! Results are identical whatever the batch boundaries or order, so traces
//! can be streamed from a [`TraceSource`] of any size. Optional convergence
//! tracking records the scores every `convergence_step` traces.
//!
//! ## Quick Start
//!
//! ```ignore
//! use distinguo::{Analysis, AnalysisConfig, Container, Discriminant, HammingWeight, KeyAddition};
//!
//! let container = Container::new(samples, metadata)?;
//! let mut cpa: Analysis<f32> = Analysis::cpa(
//!     KeyAddition::new("plaintext"),
//!     HammingWeight,
//!     Discriminant::maxabs(),
//!     AnalysisConfig::new().with_convergence_step(1000),
//! )?;
//! cpa.run(&container)?;
//!
//! let scores = cpa.scores().expect("run computes scores");
//! println!("best guess: {:?}", scores.best());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;

pub mod analysis;
pub mod container;
pub mod model;
pub mod selection;

pub use analysis::{Analysis, AnalysisBuilder};
pub use config::AnalysisConfig;
pub use container::{Batch, Container, Metadata, TraceSource, DEFAULT_BATCH_SIZE};
pub use error::{AnalysisError, ConfigError};
pub use model::{HammingWeight, LeakageModel, Monobit, Value};
pub use selection::{FnSelection, KeyAddition, MetadataField, SelectionFunction};

pub use distinguo_core::{
    discriminant, ConvergenceTrace, Discriminant, Distinguisher, DistinguisherError,
    DistinguisherKind, DistinguisherParameters, HistogramConfig, Hypotheses, Partitions,
    Precision, Results, Scores,
};
