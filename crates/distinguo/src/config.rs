//! Configuration for batched analyses.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Options shared by every analysis variant.
///
/// Precision is not part of the configuration: it is the `T` type
/// parameter of [`Analysis`](crate::Analysis).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Number of traces between two convergence checkpoints.
    ///
    /// Default: None (no convergence tracking)
    ///
    /// When set, scores are computed and stored each time this many traces
    /// have been processed, and the batch size used by `run` is adjusted
    /// so checkpoints fall on batch boundaries.
    #[serde(default)]
    pub convergence_step: Option<usize>,
}

impl AnalysisConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable convergence tracking every `step` traces.
    pub fn with_convergence_step(mut self, step: usize) -> Self {
        self.convergence_step = Some(step);
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Fails if `convergence_step` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.convergence_step {
            Some(0) => Err(ConfigError::InvalidConvergenceStep(0)),
            _ => Ok(()),
        }
    }
}
