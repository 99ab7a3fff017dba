//! Tests for batch sizing and convergence checkpoints.

use distinguo::{Analysis, AnalysisConfig, Discriminant, HammingWeight, KeyAddition, TraceSource};
use proptest::prelude::*;

use crate::synthetic::{leaky_container, RecordingSource};

fn cpa(step: Option<usize>) -> Analysis<f64> {
    let config = match step {
        Some(step) => AnalysisConfig::new().with_convergence_step(step),
        None => AnalysisConfig::new(),
    };
    Analysis::cpa(
        KeyAddition::new("plaintext"),
        HammingWeight,
        Discriminant::maxabs(),
        config,
    )
    .unwrap()
}

// =============================================================================
// CHECKPOINT COUNTS
// =============================================================================

#[test]
fn trailing_traces_add_a_final_checkpoint() {
    let container = leaky_container(10, 1000).with_batch_size(100);
    let mut analysis = cpa(Some(300));
    analysis.run(&container).unwrap();

    let traces = analysis.convergence_traces().unwrap();
    assert_eq!(traces.len(), 4);
    assert_eq!(traces.dims(), &[256, 1]);
    assert_eq!(analysis.processed_traces(), 1000);

    // The final checkpoint holds the final scores.
    let scores = analysis.scores().unwrap();
    assert_eq!(traces.checkpoint(3), Some(scores.values()));
}

#[test]
fn exact_multiple_has_no_extra_checkpoint() {
    let container = leaky_container(11, 900).with_batch_size(100);
    let mut analysis = cpa(Some(300));
    analysis.run(&container).unwrap();

    let traces = analysis.convergence_traces().unwrap();
    assert_eq!(traces.len(), 3);
    assert_eq!(traces.checkpoint(2), Some(analysis.scores().unwrap().values()));
}

#[test]
fn checkpoints_use_partial_results() {
    let container = leaky_container(12, 600).with_batch_size(100);
    let mut analysis = cpa(Some(300));
    analysis.run(&container).unwrap();

    // Same batches as the run, stopped at the first checkpoint.
    let mut reference = cpa(None);
    for batch in container.batches(100).take(3) {
        reference.process(&batch).unwrap();
    }
    reference.compute_results().unwrap();

    let traces = analysis.convergence_traces().unwrap();
    assert_eq!(traces.checkpoint(0), Some(reference.scores().unwrap().values()));
}

#[test]
fn no_convergence_without_step() {
    let container = leaky_container(13, 500).with_batch_size(100);
    let mut analysis = cpa(None);
    analysis.run(&container).unwrap();
    assert!(analysis.convergence_traces().is_none());
    assert!(analysis.scores().is_some());
}

#[test]
fn convergence_traces_allocated_on_first_batch() {
    let container = leaky_container(14, 100);
    let mut analysis = cpa(Some(1000));
    assert!(analysis.convergence_traces().is_none());

    let batch = container.batches(100).next().unwrap();
    analysis.process(&batch).unwrap();
    let traces = analysis.convergence_traces().unwrap();
    assert!(traces.is_empty());
    assert_eq!(traces.dims(), &[256, 1]);
}

#[test]
fn processed_traces_monotonic() {
    let container = leaky_container(15, 1000);
    let mut analysis = cpa(Some(250));
    let mut last = 0;
    for batch in container.batches(130) {
        analysis.process(&batch).unwrap();
        analysis.compute_convergence().unwrap();
        let processed = analysis.processed_traces();
        assert!(processed > last);
        assert!(analysis.checkpoint_marks().iter().all(|&m| m <= processed));
        last = processed;
    }
    assert_eq!(last, 1000);
}

#[test]
fn compute_results_idempotent() {
    let container = leaky_container(16, 400);
    let mut analysis = cpa(None);
    analysis.run(&container).unwrap();

    let first = analysis.results().unwrap().clone();
    let first_scores = analysis.scores().unwrap().clone();
    analysis.compute_results().unwrap();
    assert_eq!(analysis.results().unwrap(), &first);
    assert_eq!(analysis.scores().unwrap(), &first_scores);
}

#[test]
fn reset_clears_accumulated_state() {
    let container = leaky_container(17, 400).with_batch_size(100);
    let mut analysis = cpa(Some(200));
    analysis.run(&container).unwrap();
    analysis.reset();

    assert_eq!(analysis.processed_traces(), 0);
    assert!(analysis.results().is_none());
    assert!(analysis.convergence_traces().is_none());
    assert_eq!(analysis.checkpoint_marks(), &[0]);
    assert_eq!(analysis.convergence_step(), Some(200));
}

// =============================================================================
// BATCH SIZE DERIVATION
// =============================================================================

#[test]
fn batch_size_without_step_is_source_size() {
    let source = RecordingSource::new(leaky_container(18, 50).with_batch_size(7));
    cpa(None).run(&source).unwrap();
    assert_eq!(source.requested.get(), Some(7));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn batch_size_respects_step(base in 1usize..400, step in 1usize..400) {
        let source = RecordingSource::new(leaky_container(19, 20).with_batch_size(base));
        let mut analysis = cpa(Some(step));
        analysis.run(&source).unwrap();

        let used = source.requested.get().unwrap();
        if base >= step {
            prop_assert_eq!(used, step);
        } else {
            prop_assert_eq!(used, step / (step / base));
            prop_assert!(used >= base);
            prop_assert!(used <= step);
            if step % base == 0 {
                prop_assert_eq!(step % used, 0);
            }
        }
    }
}
