//! Batched analysis engine.
//!
//! An [`Analysis`] composes a selection function, a leakage model, a
//! discriminant and exactly one distinguisher. Traces are consumed in
//! batches:
//!
//! 1. the selection function and model turn batch metadata into predicted
//!    leakage per hypothesis,
//! 2. the distinguisher folds the predictions and the samples into its
//!    accumulator,
//! 3. results and scores are computed from the accumulator on demand, and
//!    optionally at regular convergence checkpoints.

mod builder;
mod convergence;

pub use builder::AnalysisBuilder;

use std::num::NonZeroUsize;

use distinguo_core::{
    ConvergenceTrace, Discriminant, Distinguisher, DistinguisherKind, Hypotheses, Precision,
    Results, Scores,
};

use crate::container::{Batch, Metadata, TraceSource};
use crate::error::{AnalysisError, ConfigError};
use crate::model::LeakageModel;
use crate::selection::SelectionFunction;

use convergence::{derive_batch_size, ConvergenceTracker};

/// A side-channel analysis over batches of traces.
///
/// `T` is the precision of every accumulator and result (`f32` by default).
/// The analysis owns its distinguisher state and is mutated only through
/// `&mut self`, so it can be moved to another thread but never shared
/// during processing.
pub struct Analysis<T: Precision = f32> {
    selection_function: Box<dyn SelectionFunction>,
    model: Box<dyn LeakageModel>,
    discriminant: Discriminant<T>,
    distinguisher: Box<dyn Distinguisher<T>>,
    convergence: ConvergenceTracker,
    convergence_traces: Option<ConvergenceTrace<T>>,
    results: Option<Results<T>>,
    scores: Option<Scores<T>>,
}

impl<T: Precision> Analysis<T> {
    /// Assemble an analysis from validated parts.
    pub(crate) fn from_parts(
        selection_function: Box<dyn SelectionFunction>,
        model: Box<dyn LeakageModel>,
        discriminant: Discriminant<T>,
        distinguisher: Box<dyn Distinguisher<T>>,
        convergence_step: Option<NonZeroUsize>,
    ) -> Self {
        tracing::debug!(
            "Created {} analysis with {} model, {} discriminant, {} precision",
            distinguisher.kind(),
            model.name(),
            discriminant.name(),
            T::NAME
        );
        Self {
            selection_function,
            model,
            discriminant,
            distinguisher,
            convergence: ConvergenceTracker::new(convergence_step),
            convergence_traces: None,
            results: None,
            scores: None,
        }
    }

    /// Start a builder.
    pub fn builder() -> AnalysisBuilder<T> {
        AnalysisBuilder::new()
    }

    /// Predicted leakage for the traces described by `metadata`.
    ///
    /// # Errors
    ///
    /// Propagates selection function failures (missing metadata).
    pub fn compute_intermediate_values(
        &self,
        metadata: &Metadata,
    ) -> Result<Hypotheses<f64>, AnalysisError> {
        let values = self.selection_function.select(metadata)?;
        Ok(self.model.leak(&values))
    }

    /// Fold one batch into the distinguisher.
    ///
    /// # Errors
    ///
    /// Fails if metadata is missing or if the batch shape differs from
    /// previously processed batches.
    pub fn process(&mut self, batch: &Batch) -> Result<(), AnalysisError> {
        let leakage = self.compute_intermediate_values(&batch.metadata)?;

        if self.convergence.step().is_some() && self.convergence_traces.is_none() {
            tracing::debug!("Initialize convergence traces with dims {:?}", leakage.dims());
            self.convergence_traces = Some(ConvergenceTrace::new(leakage.dims().to_vec()));
        }

        let data = leakage.map(T::from_f64_lossy);
        let traces = batch.samples.map(T::from_sample);
        tracing::debug!(
            "Folding {} traces into {} distinguisher",
            batch.len(),
            self.distinguisher.kind()
        );
        self.distinguisher.fold(&data, &traces)?;
        Ok(())
    }

    /// Record progress and compute a checkpoint if the step was reached.
    ///
    /// Does nothing when convergence tracking is disabled.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`compute_results`](Self::compute_results).
    pub fn compute_convergence(&mut self) -> Result<(), AnalysisError> {
        if self.convergence.record(self.distinguisher.processed_traces()) {
            tracing::debug!(
                "Convergence checkpoint at {} traces",
                self.distinguisher.processed_traces()
            );
            self.compute_results()?;
            self.push_checkpoint()?;
        }
        Ok(())
    }

    /// Reduce the accumulator to results and apply the discriminant.
    ///
    /// Calling this twice without processing in between yields identical
    /// results.
    ///
    /// # Errors
    ///
    /// Fails with a distinguisher error if nothing was processed.
    pub fn compute_results(&mut self) -> Result<(), AnalysisError> {
        tracing::debug!(
            "Computing results from {} traces",
            self.distinguisher.processed_traces()
        );
        let results = self.distinguisher.reduce()?;
        let scores = self.discriminant.apply(&results)?;
        self.results = Some(results);
        self.scores = Some(scores);
        Ok(())
    }

    /// Process every batch of `source`, then compute final results.
    ///
    /// With a convergence step, batches are sized so checkpoints fall on
    /// batch boundaries, and a last checkpoint is added for traces
    /// processed after the final regular one.
    ///
    /// # Errors
    ///
    /// Fails if the source batch size is zero, if the source is empty, or
    /// on any processing error.
    pub fn run<S: TraceSource + ?Sized>(&mut self, source: &S) -> Result<(), AnalysisError> {
        let base = source.batch_size();
        if base == 0 {
            return Err(ConfigError::InvalidBatchSize.into());
        }
        let batch_size = derive_batch_size(base, self.convergence.step());
        tracing::info!(
            "Starting {} analysis with batch size {}",
            self.distinguisher.kind(),
            batch_size
        );

        for (i, batch) in source.batches(batch_size).enumerate() {
            tracing::debug!("Process batch {} ({} traces)", i, batch.len());
            self.process(&batch)?;
            self.compute_convergence()?;
        }

        tracing::debug!("Final compute");
        self.compute_results()?;
        if self.convergence.has_pending() {
            self.push_checkpoint()?;
        }

        tracing::info!(
            "Analysis complete: {} traces processed",
            self.distinguisher.processed_traces()
        );
        Ok(())
    }

    /// Drop every accumulated value. Configuration is kept.
    pub fn reset(&mut self) {
        self.distinguisher.reset();
        self.convergence.reset();
        self.convergence_traces = None;
        self.results = None;
        self.scores = None;
    }

    fn push_checkpoint(&mut self) -> Result<(), AnalysisError> {
        if let (Some(traces), Some(scores)) = (self.convergence_traces.as_mut(), self.scores.as_ref()) {
            traces.push(scores)?;
            tracing::debug!("Convergence traces updated ({} checkpoints)", traces.len());
        }
        Ok(())
    }

    /// Latest results, `(samples × hypotheses)`.
    pub fn results(&self) -> Option<&Results<T>> {
        self.results.as_ref()
    }

    /// Latest scores, one per hypothesis.
    pub fn scores(&self) -> Option<&Scores<T>> {
        self.scores.as_ref()
    }

    /// Scores recorded at each convergence checkpoint.
    ///
    /// `None` until the first batch is processed or when convergence
    /// tracking is disabled.
    pub fn convergence_traces(&self) -> Option<&ConvergenceTrace<T>> {
        self.convergence_traces.as_ref()
    }

    /// Traces folded so far.
    pub fn processed_traces(&self) -> usize {
        self.distinguisher.processed_traces()
    }

    /// Convergence step, if tracking is enabled.
    pub fn convergence_step(&self) -> Option<usize> {
        self.convergence.step().map(NonZeroUsize::get)
    }

    /// Processed counts recorded since the last checkpoint.
    pub fn checkpoint_marks(&self) -> &[usize] {
        self.convergence.marks()
    }

    /// Statistical family of the distinguisher.
    pub fn kind(&self) -> DistinguisherKind {
        self.distinguisher.kind()
    }

    /// The distinguisher, e.g. to rebuild an equivalent analysis with
    /// [`AnalysisBuilder::from_distinguisher`].
    pub fn distinguisher(&self) -> &dyn Distinguisher<T> {
        self.distinguisher.as_ref()
    }

    /// Discriminant applied to results.
    pub fn discriminant(&self) -> &Discriminant<T> {
        &self.discriminant
    }

    /// Name of the leakage model.
    pub fn model_name(&self) -> String {
        self.model.name()
    }

    /// Precision name (`"float32"` or `"float64"`).
    pub fn precision(&self) -> &'static str {
        T::NAME
    }
}

impl<T: Precision> std::fmt::Debug for Analysis<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analysis")
            .field("kind", &self.distinguisher.kind())
            .field("model", &self.model.name())
            .field("discriminant", &self.discriminant.name())
            .field("precision", &T::NAME)
            .field("convergence_step", &self.convergence_step())
            .field("processed_traces", &self.processed_traces())
            .finish()
    }
}
