//! Selection functions: metadata to intermediate values per hypothesis.
//!
//! A selection function maps the metadata of a batch to one intermediate
//! value per trace and per hypothesis. The leakage model is applied
//! afterwards by the analysis.

use distinguo_core::Hypotheses;

use crate::container::Metadata;
use crate::error::AnalysisError;

/// Computes intermediate values from batch metadata.
///
/// The returned [`Hypotheses`] must have one row per trace of the batch and
/// the same dimensions on every call.
pub trait SelectionFunction: Send {
    /// Intermediate values for every trace and hypothesis.
    ///
    /// # Errors
    ///
    /// Fails if a required metadata field is missing or malformed.
    fn select(&self, metadata: &Metadata) -> Result<Hypotheses<u32>, AnalysisError>;
}

/// Key-byte guess XOR a metadata byte, the first AES round key addition.
///
/// Dimensions are `[guesses, bytes]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAddition {
    field: String,
    guesses: Vec<u32>,
    bytes: Option<Vec<usize>>,
}

impl KeyAddition {
    /// Attack every byte of `field` with the 256 guesses `0..=255`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            guesses: (0..256).collect(),
            bytes: None,
        }
    }

    /// Restrict the guesses.
    pub fn with_guesses(mut self, guesses: Vec<u32>) -> Self {
        self.guesses = guesses;
        self
    }

    /// Restrict the attacked byte positions.
    pub fn with_bytes(mut self, bytes: Vec<usize>) -> Self {
        self.bytes = Some(bytes);
        self
    }

    /// Guess values, in hypothesis order.
    pub fn guesses(&self) -> &[u32] {
        &self.guesses
    }
}

impl SelectionFunction for KeyAddition {
    fn select(&self, metadata: &Metadata) -> Result<Hypotheses<u32>, AnalysisError> {
        let bytes = selected_bytes(metadata, &self.field, self.bytes.as_deref())?;
        let n_bytes = bytes.len();
        let n_traces = metadata.n_traces();

        // Byte-major lookup so the closure below is infallible.
        let mut values = Vec::with_capacity(n_traces * n_bytes);
        for trace in 0..n_traces {
            for &b in &bytes {
                values.push(u32::from(metadata.byte(&self.field, trace, b)?));
            }
        }

        Ok(Hypotheses::from_fn(
            n_traces,
            vec![self.guesses.len(), n_bytes],
            |i, j| values[i * n_bytes + j % n_bytes] ^ self.guesses[j / n_bytes],
        ))
    }
}

/// Raw metadata bytes, for known-value (non-profiled) leakage assessment.
///
/// Dimensions are `[bytes]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataField {
    field: String,
    bytes: Option<Vec<usize>>,
}

impl MetadataField {
    /// Every byte of `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            bytes: None,
        }
    }

    /// Restrict the byte positions.
    pub fn with_bytes(mut self, bytes: Vec<usize>) -> Self {
        self.bytes = Some(bytes);
        self
    }
}

impl SelectionFunction for MetadataField {
    fn select(&self, metadata: &Metadata) -> Result<Hypotheses<u32>, AnalysisError> {
        let bytes = selected_bytes(metadata, &self.field, self.bytes.as_deref())?;
        let n_traces = metadata.n_traces();
        let mut values = Vec::with_capacity(n_traces * bytes.len());
        for trace in 0..n_traces {
            for &b in &bytes {
                values.push(u32::from(metadata.byte(&self.field, trace, b)?));
            }
        }
        let n_bytes = bytes.len();
        Ok(Hypotheses::from_fn(n_traces, vec![n_bytes], |i, j| {
            values[i * n_bytes + j]
        }))
    }
}

/// Closure-backed selection function.
pub struct FnSelection<F> {
    f: F,
}

impl<F> FnSelection<F>
where
    F: Fn(&Metadata) -> Result<Hypotheses<u32>, AnalysisError> + Send,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> SelectionFunction for FnSelection<F>
where
    F: Fn(&Metadata) -> Result<Hypotheses<u32>, AnalysisError> + Send,
{
    fn select(&self, metadata: &Metadata) -> Result<Hypotheses<u32>, AnalysisError> {
        (self.f)(metadata)
    }
}

impl<F> std::fmt::Debug for FnSelection<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSelection").finish_non_exhaustive()
    }
}

fn selected_bytes(
    metadata: &Metadata,
    field: &str,
    bytes: Option<&[usize]>,
) -> Result<Vec<usize>, AnalysisError> {
    let width = metadata.get(field)?.ncols();
    match bytes {
        Some(bytes) => {
            if let Some(&column) = bytes.iter().find(|&&b| b >= width) {
                return Err(AnalysisError::MetadataColumn {
                    field: field.to_string(),
                    width,
                    column,
                });
            }
            Ok(bytes.to_vec())
        }
        None => Ok((0..width).collect()),
    }
}
