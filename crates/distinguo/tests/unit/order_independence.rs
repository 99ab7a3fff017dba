//! Results must not depend on batch boundaries or batch order.

use distinguo::{
    Analysis, AnalysisConfig, Batch, Container, Discriminant, HammingWeight, KeyAddition,
    Partitions, TraceSource,
};
use proptest::prelude::*;

use crate::synthetic::{assert_close, leaky_container};

fn cpa() -> Analysis<f64> {
    Analysis::cpa(
        KeyAddition::new("plaintext"),
        HammingWeight,
        Discriminant::maxabs(),
        AnalysisConfig::default(),
    )
    .unwrap()
}

fn snr() -> Analysis<f64> {
    Analysis::snr(
        Partitions::range(9).unwrap(),
        KeyAddition::new("plaintext"),
        HammingWeight,
        Discriminant::max(),
        AnalysisConfig::default(),
    )
    .unwrap()
}

/// Process `batches` in the given order and return the raw results.
fn fold_all(mut analysis: Analysis<f64>, batches: &[Batch]) -> nalgebra::DMatrix<f64> {
    for batch in batches {
        analysis.process(batch).unwrap();
    }
    analysis.compute_results().unwrap();
    analysis.results().unwrap().values().clone()
}

/// Split `container` at `at` into two batches.
fn split(container: &Container, at: usize) -> Vec<Batch> {
    let first: Vec<Batch> = container.batches(at).collect();
    let head = first[0].clone();
    let tail_rows = container.len() - at;
    let tail = Batch::new(
        container.samples().rows(at, tail_rows).into_owned(),
        container.metadata().rows(at, tail_rows),
    )
    .unwrap();
    vec![head, tail]
}

#[test]
fn reversed_batches_match_single_batch() {
    let container = leaky_container(20, 300);
    let whole: Vec<Batch> = container.batches(300).collect();
    let mut batches: Vec<Batch> = container.batches(70).collect();
    batches.reverse();

    assert_close(&fold_all(cpa(), &whole), &fold_all(cpa(), &batches), 1e-9);
    assert_close(&fold_all(snr(), &whole), &fold_all(snr(), &batches), 1e-9);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn any_split_matches_single_batch(at in 1usize..200, swap in any::<bool>()) {
        let container = leaky_container(21, 200);
        let whole: Vec<Batch> = container.batches(200).collect();
        let mut halves = split(&container, at);
        if swap {
            halves.reverse();
        }
        assert_close(&fold_all(cpa(), &whole), &fold_all(cpa(), &halves), 1e-9);
    }
}
