//! Analysis construction: builder and one factory per variant.

use std::num::NonZeroUsize;

use distinguo_core::{
    Discriminant, Distinguisher, DistinguisherKind, DistinguisherParameters, HistogramConfig,
    Partitions, Precision,
};

use super::Analysis;
use crate::config::AnalysisConfig;
use crate::error::ConfigError;
use crate::model::LeakageModel;
use crate::selection::SelectionFunction;

/// Builder for [`Analysis`].
///
/// Every part is required except the distinguisher parameters, which only
/// partition-based and MIA analyses need.
///
/// ```ignore
/// let analysis: Analysis<f64> = Analysis::builder()
///     .selection_function(KeyAddition::new("plaintext"))
///     .model(HammingWeight)
///     .discriminant(Discriminant::maxabs())
///     .distinguisher(DistinguisherKind::Cpa)
///     .convergence_step(500)
///     .build()?;
/// ```
pub struct AnalysisBuilder<T: Precision = f32> {
    selection_function: Option<Box<dyn SelectionFunction>>,
    model: Option<Box<dyn LeakageModel>>,
    discriminant: Option<Discriminant<T>>,
    kinds: Vec<DistinguisherKind>,
    parameters: DistinguisherParameters,
    config: AnalysisConfig,
}

impl<T: Precision> Default for AnalysisBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Precision> AnalysisBuilder<T> {
    /// Empty builder.
    pub fn new() -> Self {
        Self {
            selection_function: None,
            model: None,
            discriminant: None,
            kinds: Vec::new(),
            parameters: DistinguisherParameters::default(),
            config: AnalysisConfig::default(),
        }
    }

    /// Builder preset with the kind and parameters of an existing
    /// distinguisher. Its accumulated state is not copied.
    pub fn from_distinguisher(distinguisher: &dyn Distinguisher<T>) -> Self {
        let mut builder = Self::new().distinguisher(distinguisher.kind());
        builder.parameters = distinguisher.parameters();
        builder
    }

    /// Set the selection function.
    pub fn selection_function(mut self, selection_function: impl SelectionFunction + 'static) -> Self {
        self.selection_function = Some(Box::new(selection_function));
        self
    }

    /// Set the leakage model.
    pub fn model(mut self, model: impl LeakageModel + 'static) -> Self {
        self.model = Some(Box::new(model));
        self
    }

    /// Set the discriminant.
    pub fn discriminant(mut self, discriminant: Discriminant<T>) -> Self {
        self.discriminant = Some(discriminant);
        self
    }

    /// Select the distinguisher. Selecting more than one fails at build.
    pub fn distinguisher(mut self, kind: DistinguisherKind) -> Self {
        self.kinds.push(kind);
        self
    }

    /// Partitions for ANOVA, NICV, SNR and MIA.
    pub fn partitions(mut self, partitions: Partitions) -> Self {
        self.parameters.partitions = Some(partitions);
        self
    }

    /// Histogram configuration for MIA.
    pub fn histogram(mut self, histogram: HistogramConfig) -> Self {
        self.parameters.histogram = Some(histogram);
        self
    }

    /// Enable convergence tracking.
    pub fn convergence_step(mut self, step: usize) -> Self {
        self.config.convergence_step = Some(step);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate and assemble the analysis.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a part is missing, if more than one
    /// distinguisher was selected, if DPA is given a non-binary model, if
    /// the convergence step is zero, or if the distinguisher parameters are
    /// missing or invalid.
    pub fn build(self) -> Result<Analysis<T>, ConfigError> {
        self.config.validate()?;
        let convergence_step = self.config.convergence_step.and_then(NonZeroUsize::new);

        let kind = match self.kinds.as_slice() {
            [] => return Err(ConfigError::MissingDistinguisher),
            [kind] => *kind,
            [first, second, ..] => {
                return Err(ConfigError::ConflictingDistinguishers {
                    first: *first,
                    second: *second,
                })
            }
        };
        let selection_function = self
            .selection_function
            .ok_or(ConfigError::MissingSelectionFunction)?;
        let model = self.model.ok_or(ConfigError::MissingModel)?;
        let discriminant = self.discriminant.ok_or(ConfigError::MissingDiscriminant)?;

        if kind.requires_binary_model() && !model.is_binary() {
            return Err(ConfigError::NonBinaryModel {
                kind,
                model: model.name(),
            });
        }

        let distinguisher = kind.build::<T>(&self.parameters)?;
        Ok(Analysis::from_parts(
            selection_function,
            model,
            discriminant,
            distinguisher,
            convergence_step,
        ))
    }
}

impl<T: Precision> Analysis<T> {
    fn variant(
        kind: DistinguisherKind,
        parameters: DistinguisherParameters,
        selection_function: impl SelectionFunction + 'static,
        model: impl LeakageModel + 'static,
        discriminant: Discriminant<T>,
        config: AnalysisConfig,
    ) -> Result<Self, ConfigError> {
        let mut builder = AnalysisBuilder::new()
            .selection_function(selection_function)
            .model(model)
            .discriminant(discriminant)
            .distinguisher(kind)
            .config(config);
        builder.parameters = parameters;
        builder.build()
    }

    /// Correlation power analysis.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration.
    pub fn cpa(
        selection_function: impl SelectionFunction + 'static,
        model: impl LeakageModel + 'static,
        discriminant: Discriminant<T>,
        config: AnalysisConfig,
    ) -> Result<Self, ConfigError> {
        Self::variant(
            DistinguisherKind::Cpa,
            DistinguisherParameters::default(),
            selection_function,
            model,
            discriminant,
            config,
        )
    }

    /// Difference of means. `model` must be binary.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigError::NonBinaryModel`] for a non-binary model.
    pub fn dpa(
        selection_function: impl SelectionFunction + 'static,
        model: impl LeakageModel + 'static,
        discriminant: Discriminant<T>,
        config: AnalysisConfig,
    ) -> Result<Self, ConfigError> {
        Self::variant(
            DistinguisherKind::Dpa,
            DistinguisherParameters::default(),
            selection_function,
            model,
            discriminant,
            config,
        )
    }

    /// Analysis of variance over `partitions`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration.
    pub fn anova(
        partitions: Partitions,
        selection_function: impl SelectionFunction + 'static,
        model: impl LeakageModel + 'static,
        discriminant: Discriminant<T>,
        config: AnalysisConfig,
    ) -> Result<Self, ConfigError> {
        Self::variant(
            DistinguisherKind::Anova,
            DistinguisherParameters::default().with_partitions(partitions),
            selection_function,
            model,
            discriminant,
            config,
        )
    }

    /// Normalized inter-class variance over `partitions`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration.
    pub fn nicv(
        partitions: Partitions,
        selection_function: impl SelectionFunction + 'static,
        model: impl LeakageModel + 'static,
        discriminant: Discriminant<T>,
        config: AnalysisConfig,
    ) -> Result<Self, ConfigError> {
        Self::variant(
            DistinguisherKind::Nicv,
            DistinguisherParameters::default().with_partitions(partitions),
            selection_function,
            model,
            discriminant,
            config,
        )
    }

    /// Signal-to-noise ratio over `partitions`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration.
    pub fn snr(
        partitions: Partitions,
        selection_function: impl SelectionFunction + 'static,
        model: impl LeakageModel + 'static,
        discriminant: Discriminant<T>,
        config: AnalysisConfig,
    ) -> Result<Self, ConfigError> {
        Self::variant(
            DistinguisherKind::Snr,
            DistinguisherParameters::default().with_partitions(partitions),
            selection_function,
            model,
            discriminant,
            config,
        )
    }

    /// Mutual information analysis over `partitions`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration or histogram.
    pub fn mia(
        partitions: Partitions,
        histogram: HistogramConfig,
        selection_function: impl SelectionFunction + 'static,
        model: impl LeakageModel + 'static,
        discriminant: Discriminant<T>,
        config: AnalysisConfig,
    ) -> Result<Self, ConfigError> {
        Self::variant(
            DistinguisherKind::Mia,
            DistinguisherParameters::default()
                .with_partitions(partitions)
                .with_histogram(histogram),
            selection_function,
            model,
            discriminant,
            config,
        )
    }
}
