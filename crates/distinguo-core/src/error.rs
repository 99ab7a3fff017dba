//! Errors raised by distinguisher kernels.

/// Errors that can occur while folding or reducing a distinguisher.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DistinguisherError {
    /// Hypothesis dimensions or sample count differ from previously folded data.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Hypothesis dims followed by sample count seen on the first fold.
        expected: Vec<usize>,
        /// Hypothesis dims followed by sample count of the offending batch.
        got: Vec<usize>,
    },

    /// Leakage values and traces do not describe the same number of traces.
    #[error("batch mismatch: {data_rows} leakage rows for {trace_rows} traces")]
    BatchMismatch {
        /// Rows of the leakage array.
        data_rows: usize,
        /// Rows of the trace matrix.
        trace_rows: usize,
    },

    /// The hypothesis array does not agree with its declared dimensions.
    #[error("hypothesis dims {dims:?} do not describe {columns} columns")]
    InvalidDims {
        /// Declared hypothesis dimensions.
        dims: Vec<usize>,
        /// Actual number of columns.
        columns: usize,
    },

    /// Traces carry no sample points.
    #[error("traces have no samples")]
    EmptyTraces,

    /// `reduce` was called before any data was folded.
    #[error("no traces have been processed yet")]
    NoData,

    /// A partition-based kernel was requested without partitions.
    #[error("partitions are required for {0} distinguishers")]
    MissingPartitions(&'static str),

    /// Partition definition is unusable.
    #[error("invalid partitions: {0}")]
    InvalidPartitions(String),

    /// A histogram-based kernel was requested without histogram parameters.
    #[error("histogram parameters are required for {0} distinguishers")]
    MissingHistogram(&'static str),

    /// Histogram definition is unusable.
    #[error("invalid histogram: {0}")]
    InvalidHistogram(String),
}
