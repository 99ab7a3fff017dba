//! Tests for analysis construction errors.
//!
//! Every invalid configuration is rejected before any trace is processed.

use distinguo::{
    Analysis, AnalysisConfig, AnalysisError, ConfigError, Container, Discriminant,
    DistinguisherError, DistinguisherKind, HammingWeight, HistogramConfig, KeyAddition, Metadata,
    Monobit, Partitions, Value,
};
use nalgebra::DMatrix;

use crate::synthetic::leaky_container;

// =============================================================================
// CONVERGENCE STEP
// =============================================================================

#[test]
fn convergence_step_zero_rejected() {
    let err = Analysis::<f32>::cpa(
        KeyAddition::new("plaintext"),
        HammingWeight,
        Discriminant::maxabs(),
        AnalysisConfig::new().with_convergence_step(0),
    )
    .unwrap_err();
    assert_eq!(err, ConfigError::InvalidConvergenceStep(0));
}

#[test]
fn convergence_step_one_valid() {
    let analysis = Analysis::<f32>::cpa(
        KeyAddition::new("plaintext"),
        HammingWeight,
        Discriminant::maxabs(),
        AnalysisConfig::new().with_convergence_step(1),
    )
    .unwrap();
    assert_eq!(analysis.convergence_step(), Some(1));
}

// =============================================================================
// MODEL CAPABILITIES
// =============================================================================

#[test]
fn dpa_with_non_binary_model_rejected() {
    let err = Analysis::<f32>::dpa(
        KeyAddition::new("plaintext"),
        HammingWeight,
        Discriminant::maxabs(),
        AnalysisConfig::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        ConfigError::NonBinaryModel {
            kind: DistinguisherKind::Dpa,
            model: "HammingWeight".to_string(),
        }
    );
    assert!(err.to_string().contains("binary model"));

    let err = Analysis::<f32>::dpa(
        KeyAddition::new("plaintext"),
        Value,
        Discriminant::maxabs(),
        AnalysisConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::NonBinaryModel { .. }));
}

#[test]
fn dpa_with_monobit_valid() {
    let analysis = Analysis::<f32>::dpa(
        KeyAddition::new("plaintext"),
        Monobit::new(0).unwrap(),
        Discriminant::maxabs(),
        AnalysisConfig::default(),
    )
    .unwrap();
    assert_eq!(analysis.kind(), DistinguisherKind::Dpa);
}

#[test]
fn monobit_bit_out_of_range_rejected() {
    let err = Monobit::new(32).unwrap_err();
    assert_eq!(err, ConfigError::InvalidBit(32));
    assert!(err.to_string().contains("< 32"));

    // Converts into an analysis error like every other construction failure.
    let err: AnalysisError = err.into();
    assert_eq!(err, AnalysisError::Config(ConfigError::InvalidBit(32)));
}

// =============================================================================
// DISTINGUISHER PARAMETERS
// =============================================================================

#[test]
fn partitioned_without_partitions_rejected() {
    for kind in [
        DistinguisherKind::Anova,
        DistinguisherKind::Nicv,
        DistinguisherKind::Snr,
        DistinguisherKind::Mia,
    ] {
        let err = Analysis::<f32>::builder()
            .selection_function(KeyAddition::new("plaintext"))
            .model(HammingWeight)
            .discriminant(Discriminant::maxabs())
            .distinguisher(kind)
            .histogram(HistogramConfig::default())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Distinguisher(DistinguisherError::MissingPartitions(kind.name())),
            "{kind}"
        );
    }
}

#[test]
fn mia_without_any_parameter_reports_partitions() {
    let err = Analysis::<f32>::builder()
        .selection_function(KeyAddition::new("plaintext"))
        .model(HammingWeight)
        .discriminant(Discriminant::maxabs())
        .distinguisher(DistinguisherKind::Mia)
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::Distinguisher(DistinguisherError::MissingPartitions("mia"))
    );
}

#[test]
fn mia_without_histogram_rejected() {
    let err = Analysis::<f32>::builder()
        .selection_function(KeyAddition::new("plaintext"))
        .model(HammingWeight)
        .discriminant(Discriminant::maxabs())
        .distinguisher(DistinguisherKind::Mia)
        .partitions(Partitions::range(9).unwrap())
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Distinguisher(DistinguisherError::MissingHistogram(_))
    ));
}

#[test]
fn mia_with_invalid_histogram_rejected() {
    let err = Analysis::<f32>::mia(
        Partitions::range(9).unwrap(),
        HistogramConfig::new(0),
        KeyAddition::new("plaintext"),
        HammingWeight,
        Discriminant::maxabs(),
        AnalysisConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Distinguisher(DistinguisherError::InvalidHistogram(_))
    ));
}

#[test]
fn duplicate_partitions_rejected() {
    assert!(matches!(
        Partitions::new(vec![0, 1, 1]),
        Err(DistinguisherError::InvalidPartitions(_))
    ));
}

// =============================================================================
// RUN-TIME USAGE ERRORS
// =============================================================================

#[test]
fn missing_metadata_reported() {
    let mut analysis = Analysis::<f32>::cpa(
        KeyAddition::new("ciphertext"),
        HammingWeight,
        Discriminant::maxabs(),
        AnalysisConfig::default(),
    )
    .unwrap();
    let err = analysis.run(&leaky_container(1, 50)).unwrap_err();
    match err {
        AnalysisError::MissingMetadata { field, available } => {
            assert_eq!(field, "ciphertext");
            assert_eq!(available, vec!["key".to_string(), "plaintext".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(analysis.processed_traces(), 0);
}

#[test]
fn results_before_processing_fail() {
    let mut analysis = Analysis::<f32>::cpa(
        KeyAddition::new("plaintext"),
        HammingWeight,
        Discriminant::maxabs(),
        AnalysisConfig::default(),
    )
    .unwrap();
    assert_eq!(
        analysis.compute_results().unwrap_err(),
        AnalysisError::Distinguisher(DistinguisherError::NoData)
    );
    assert!(analysis.results().is_none());

    let empty = Container::new(DMatrix::zeros(0, 5), Metadata::new()).unwrap();
    assert!(analysis.run(&empty).is_err());
}

#[test]
fn zero_batch_size_rejected() {
    let mut analysis = Analysis::<f32>::cpa(
        KeyAddition::new("plaintext"),
        HammingWeight,
        Discriminant::maxabs(),
        AnalysisConfig::default(),
    )
    .unwrap();
    let container = leaky_container(2, 10).with_batch_size(0);
    assert_eq!(
        analysis.run(&container).unwrap_err(),
        AnalysisError::Config(ConfigError::InvalidBatchSize)
    );
}

#[test]
fn analysis_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Analysis<f32>>();
    assert_send::<Analysis<f64>>();
}
