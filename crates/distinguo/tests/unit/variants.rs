//! End-to-end runs of every analysis variant on a leaky trace set.

use distinguo::{
    Analysis, AnalysisBuilder, AnalysisConfig, AnalysisError, Container, Discriminant, FnSelection,
    HammingWeight, HistogramConfig, Hypotheses, KeyAddition, Metadata, Monobit, Partitions,
};
use nalgebra::DMatrix;

use crate::synthetic::{leaky_container, KEY, LEAKY_SAMPLE, N_SAMPLES};

/// `HW(plaintext ^ KEY)` as a single hypothesis.
fn known_key() -> FnSelection<impl Fn(&Metadata) -> Result<Hypotheses<u32>, AnalysisError> + Send> {
    FnSelection::new(|metadata: &Metadata| {
        let n = metadata.n_traces();
        let mut values = Vec::with_capacity(n);
        for trace in 0..n {
            let p = metadata.byte("plaintext", trace, 0)?;
            let k = metadata.byte("key", trace, 0)?;
            values.push(u32::from(p ^ k));
        }
        Ok(Hypotheses::from_fn(n, vec![1], |i, _| values[i]))
    })
}

#[test]
fn cpa_recovers_key() {
    let container = leaky_container(30, 2000);
    let mut analysis: Analysis = Analysis::cpa(
        KeyAddition::new("plaintext"),
        HammingWeight,
        Discriminant::max(),
        AnalysisConfig::new().with_convergence_step(500),
    )
    .unwrap();
    analysis.run(&container).unwrap();

    assert_eq!(analysis.precision(), "float32");
    let scores = analysis.scores().unwrap();
    assert_eq!(scores.best(), Some(KEY as usize));
    assert_eq!(scores.ranking()[0], KEY as usize);

    // The true key correlates at the leaky sample only.
    let results = analysis.results().unwrap();
    assert!(results.get(KEY as usize, LEAKY_SAMPLE) > 0.8);
    assert!(results.get(KEY as usize, 0).abs() < 0.2);

    let traces = analysis.convergence_traces().unwrap();
    assert_eq!(traces.len(), 4);
    assert_eq!(traces.series(KEY as usize).len(), 4);
}

#[test]
fn dpa_recovers_key_with_monobit() {
    let container = leaky_container(31, 3000);
    let mut analysis = Analysis::<f64>::dpa(
        KeyAddition::new("plaintext"),
        Monobit::new(0).unwrap(),
        Discriminant::max(),
        AnalysisConfig::default(),
    )
    .unwrap();
    analysis.run(&container).unwrap();

    // A single bit only separates guesses by their low bit.
    let scores = analysis.scores().unwrap();
    assert_eq!(scores.best().map(|g| g & 1), Some(usize::from(KEY & 1)));
    assert!((scores.get(KEY as usize) - 1.0).abs() < 0.25);

    // Flipping the low bit flips the sign at the leaky sample, so `max`
    // picks up noise from the other samples instead.
    let results = analysis.results().unwrap();
    assert!((results.get(KEY as usize, LEAKY_SAMPLE) - 1.0).abs() < 0.25);
    assert!((results.get((KEY ^ 1) as usize, LEAKY_SAMPLE) + 1.0).abs() < 0.25);
    assert!(scores.get((KEY ^ 1) as usize) < 0.25);
}

#[test]
fn snr_recovers_key() {
    let container = leaky_container(32, 2000);
    let mut analysis = Analysis::<f64>::snr(
        Partitions::range(9).unwrap(),
        KeyAddition::new("plaintext"),
        HammingWeight,
        Discriminant::max(),
        AnalysisConfig::default(),
    )
    .unwrap();
    analysis.run(&container).unwrap();

    // Complementing the guess only relabels the Hamming weight classes.
    let scores = analysis.scores().unwrap();
    let ghost = (KEY ^ 0xFF) as usize;
    let best = scores.best().unwrap();
    assert!(best == KEY as usize || best == ghost);
    assert!((scores.get(KEY as usize) - scores.get(ghost)).abs() < 1e-9);
    assert_eq!(scores.ranking()[..2].iter().filter(|&&g| g == KEY as usize || g == ghost).count(), 2);
}

#[test]
fn nicv_and_anova_locate_leaky_sample() {
    let container = leaky_container(33, 1000);
    let mut nicv = Analysis::<f64>::nicv(
        Partitions::range(9).unwrap(),
        known_key(),
        HammingWeight,
        Discriminant::max(),
        AnalysisConfig::default(),
    )
    .unwrap();
    let mut anova = Analysis::<f64>::anova(
        Partitions::range(9).unwrap(),
        known_key(),
        HammingWeight,
        Discriminant::max(),
        AnalysisConfig::default(),
    )
    .unwrap();
    nicv.run(&container).unwrap();
    anova.run(&container).unwrap();

    let nicv = nicv.results().unwrap();
    let anova = anova.results().unwrap();
    for sample in 0..N_SAMPLES {
        let ratio = nicv.get(0, sample);
        assert!((0.0..=1.0).contains(&ratio));
        if sample == LEAKY_SAMPLE {
            assert!(ratio > 0.8);
            assert!(anova.get(0, sample) > 100.0);
        } else {
            assert!(ratio < 0.1);
            assert!(anova.get(0, sample) < 10.0);
        }
    }
}

#[test]
fn mia_locates_leaky_sample() {
    let container = leaky_container(34, 2000);
    let mut analysis = Analysis::<f64>::mia(
        Partitions::range(9).unwrap(),
        HistogramConfig::new(16),
        known_key(),
        HammingWeight,
        Discriminant::max(),
        AnalysisConfig::default(),
    )
    .unwrap();
    analysis.run(&container).unwrap();

    let results = analysis.results().unwrap();
    let leaky = results.get(0, LEAKY_SAMPLE);
    for sample in (0..N_SAMPLES).filter(|&s| s != LEAKY_SAMPLE) {
        assert!(leaky > 5.0 * results.get(0, sample));
    }
}

#[test]
fn rebuilt_analysis_matches_original() {
    let container = leaky_container(35, 600);
    let mut original = Analysis::<f64>::anova(
        Partitions::range(9).unwrap(),
        KeyAddition::new("plaintext").with_guesses(vec![0x00, KEY as u32]),
        HammingWeight,
        Discriminant::max(),
        AnalysisConfig::default(),
    )
    .unwrap();
    original.run(&container).unwrap();

    let mut rebuilt = AnalysisBuilder::from_distinguisher(original.distinguisher())
        .selection_function(KeyAddition::new("plaintext").with_guesses(vec![0x00, KEY as u32]))
        .model(HammingWeight)
        .discriminant(Discriminant::max())
        .build()
        .unwrap();
    assert_eq!(rebuilt.processed_traces(), 0);
    rebuilt.run(&container).unwrap();
    assert_eq!(rebuilt.results(), original.results());
}

#[test]
fn cpa_on_shared_metadata_only() {
    // Every trace shares one key row; nothing else is per-trace.
    let n = 10;
    let samples = DMatrix::from_fn(n, 3, |i, j| (i * 3 + j) as f32);
    let metadata = Metadata::new().with_field("key", DMatrix::from_row_slice(1, 1, &[KEY]));
    let container = Container::new(samples, metadata).unwrap().with_batch_size(4);

    let mut analysis = Analysis::<f64>::cpa(
        KeyAddition::new("key"),
        HammingWeight,
        Discriminant::maxabs(),
        AnalysisConfig::default(),
    )
    .unwrap();
    analysis.run(&container).unwrap();

    assert_eq!(analysis.processed_traces(), n);
    let results = analysis.results().unwrap();
    assert_eq!(results.n_hypotheses(), 256);
    assert_eq!(results.n_samples(), 3);
    // Predictions are constant across traces, so correlations are undefined.
    assert!(results.get(0, 0).is_nan());
}
