//! Convergence checkpoint bookkeeping.

use std::num::NonZeroUsize;

/// Tracks processed-trace counts between convergence checkpoints.
///
/// Marks start at `[0]`. Each recorded count is appended; once the span
/// covered by the marks reaches the step, a checkpoint is due and the marks
/// collapse to the latest count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConvergenceTracker {
    step: Option<NonZeroUsize>,
    marks: Vec<usize>,
}

impl ConvergenceTracker {
    pub(crate) fn new(step: Option<NonZeroUsize>) -> Self {
        Self {
            step,
            marks: vec![0],
        }
    }

    pub(crate) fn step(&self) -> Option<NonZeroUsize> {
        self.step
    }

    pub(crate) fn marks(&self) -> &[usize] {
        &self.marks
    }

    /// Record the current processed count. Returns true if a checkpoint is due.
    pub(crate) fn record(&mut self, processed: usize) -> bool {
        let Some(step) = self.step else {
            return false;
        };
        self.marks.push(processed);
        let first = self.marks[0];
        if processed.saturating_sub(first) >= step.get() {
            self.marks = vec![processed];
            true
        } else {
            false
        }
    }

    /// Whether traces were recorded since the last checkpoint.
    pub(crate) fn has_pending(&self) -> bool {
        self.step.is_some() && self.marks.len() > 1
    }

    pub(crate) fn reset(&mut self) {
        self.marks = vec![0];
    }
}

/// Batch size used by `run` for a source batch size `base`.
///
/// Without a step the source's size is used. A base of at least the step is
/// capped to the step. A smaller base becomes `step / (step / base)`, with
/// floor division at both steps.
pub(crate) fn derive_batch_size(base: usize, step: Option<NonZeroUsize>) -> usize {
    match step {
        None => base,
        Some(step) => {
            let step = step.get();
            if base >= step {
                step
            } else {
                step / (step / base)
            }
        }
    }
}
