//! Error types for analysis construction and execution.

use distinguo_core::{DistinguisherError, DistinguisherKind};

/// Construction-time configuration errors.
///
/// These are raised before any trace is processed and are not recoverable
/// by retrying.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// `convergence_step` was zero.
    #[error("convergence_step must be a strictly positive integer, got {0}")]
    InvalidConvergenceStep(usize),

    /// No selection function was supplied.
    #[error("a selection function is required")]
    MissingSelectionFunction,

    /// No leakage model was supplied.
    #[error("a leakage model is required")]
    MissingModel,

    /// No discriminant was supplied.
    #[error("a discriminant is required")]
    MissingDiscriminant,

    /// No distinguisher was selected.
    #[error("an analysis must be composed with a distinguisher")]
    MissingDistinguisher,

    /// More than one distinguisher was selected.
    #[error("an analysis takes exactly one distinguisher, got {first} and {second}")]
    ConflictingDistinguishers {
        /// First distinguisher selected.
        first: DistinguisherKind,
        /// Second distinguisher selected.
        second: DistinguisherKind,
    },

    /// The analysis needs a binary leakage model.
    #[error("{kind} analysis can only be processed with a binary model, not {model}")]
    NonBinaryModel {
        /// Analysis family.
        kind: DistinguisherKind,
        /// Name of the rejected model.
        model: String,
    },

    /// A monobit model was asked for a bit outside a `u32`.
    #[error("monobit model bit must be < 32, got {0}")]
    InvalidBit(u32),

    /// The trace source reported a zero batch size.
    #[error("trace source batch size must be > 0")]
    InvalidBatchSize,

    /// The distinguisher could not be constructed (e.g. missing partitions).
    #[error(transparent)]
    Distinguisher(#[from] DistinguisherError),
}

/// Errors raised while running an analysis.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A metadata field required by the selection function is absent.
    #[error("metadata field '{field}' is missing, available fields: {available:?}")]
    MissingMetadata {
        /// Requested field.
        field: String,
        /// Fields present in the batch.
        available: Vec<String>,
    },

    /// A metadata field does not have one row per trace.
    #[error("metadata field '{field}' has {got} rows, expected {expected} or 1")]
    MetadataRows {
        /// Offending field.
        field: String,
        /// Expected row count.
        expected: usize,
        /// Actual row count.
        got: usize,
    },

    /// A selection function asked for a byte a metadata field does not have.
    #[error("metadata field '{field}' has {width} columns, column {column} requested")]
    MetadataColumn {
        /// Offending field.
        field: String,
        /// Width of the field.
        width: usize,
        /// Requested column.
        column: usize,
    },

    /// Folding or reducing failed.
    #[error("distinguisher error: {0}")]
    Distinguisher(#[from] DistinguisherError),
}
