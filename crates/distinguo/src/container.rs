//! Trace sources: batched samples with their metadata.
//!
//! An analysis only needs two things from a source: a default batch size
//! and an iterator over batches of that size. [`Container`] is the
//! in-memory implementation used by tests and small campaigns.

use std::collections::BTreeMap;

use nalgebra::DMatrix;

use crate::error::AnalysisError;

/// Default number of traces per batch for [`Container`].
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Named per-trace metadata fields (plaintext, ciphertext, key, ...).
///
/// Each field is a `(traces × bytes)` matrix. A field with a single row is
/// shared by every trace (a fixed key, for instance).
///
/// Metadata attached to a [`Batch`] or a [`Container`] knows how many traces
/// it describes, so shared fields broadcast to that count even when no field
/// is per-trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    fields: BTreeMap<String, DMatrix<u8>>,
    n_traces: Option<usize>,
}

impl Metadata {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, values: DMatrix<u8>) -> Self {
        self.insert(name, values);
        self
    }

    /// Add or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, values: DMatrix<u8>) {
        self.fields.insert(name.into(), values);
    }

    /// Look up a field.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::MissingMetadata`] if the field is absent.
    pub fn get(&self, name: &str) -> Result<&DMatrix<u8>, AnalysisError> {
        self.fields.get(name).ok_or_else(|| AnalysisError::MissingMetadata {
            field: name.to_string(),
            available: self.names().map(str::to_string).collect(),
        })
    }

    /// Whether a field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of traces described.
    ///
    /// This is the trace count of the owning batch or container. Detached
    /// metadata falls back to the largest row count of any field.
    pub fn n_traces(&self) -> usize {
        self.n_traces
            .unwrap_or_else(|| self.fields.values().map(|v| v.nrows()).max().unwrap_or(0))
    }

    /// Byte `column` of field `name` for `trace`, broadcasting shared fields.
    ///
    /// # Errors
    ///
    /// Fails if the field is missing or narrower than `column + 1`.
    pub fn byte(&self, name: &str, trace: usize, column: usize) -> Result<u8, AnalysisError> {
        let field = self.get(name)?;
        if column >= field.ncols() {
            return Err(AnalysisError::MetadataColumn {
                field: name.to_string(),
                width: field.ncols(),
                column,
            });
        }
        let row = if field.nrows() == 1 { 0 } else { trace };
        Ok(field[(row, column)])
    }

    /// Rows `start..start + len` of every per-trace field. Shared fields are
    /// kept whole.
    pub fn rows(&self, start: usize, len: usize) -> Self {
        let fields = self
            .fields
            .iter()
            .map(|(name, values)| {
                let values = if values.nrows() == 1 {
                    values.clone()
                } else {
                    values.rows(start, len).into_owned()
                };
                (name.clone(), values)
            })
            .collect();
        Self {
            fields,
            n_traces: Some(len),
        }
    }

    /// Check every field has `n_traces` rows or a single shared row, then
    /// record the trace count.
    fn bind(mut self, n_traces: usize) -> Result<Self, AnalysisError> {
        for (name, values) in &self.fields {
            if values.nrows() != n_traces && values.nrows() != 1 {
                return Err(AnalysisError::MetadataRows {
                    field: name.clone(),
                    expected: n_traces,
                    got: values.nrows(),
                });
            }
        }
        self.n_traces = Some(n_traces);
        Ok(self)
    }
}

/// One batch of traces handed to [`Analysis::process`](crate::Analysis::process).
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Raw samples, `(traces × samples)`.
    pub samples: DMatrix<f32>,
    /// Metadata rows matching `samples`.
    pub metadata: Metadata,
}

impl Batch {
    /// Pair samples with metadata.
    ///
    /// # Errors
    ///
    /// Fails if a per-trace metadata field does not have one row per trace.
    pub fn new(samples: DMatrix<f32>, metadata: Metadata) -> Result<Self, AnalysisError> {
        let metadata = metadata.bind(samples.nrows())?;
        Ok(Self { samples, metadata })
    }

    /// Number of traces in the batch.
    pub fn len(&self) -> usize {
        self.samples.nrows()
    }

    /// Whether the batch holds no trace.
    pub fn is_empty(&self) -> bool {
        self.samples.nrows() == 0
    }
}

/// A supplier of trace batches.
pub trait TraceSource {
    /// Preferred number of traces per batch.
    fn batch_size(&self) -> usize;

    /// Iterate over consecutive batches of at most `batch_size` traces.
    fn batches(&self, batch_size: usize) -> Box<dyn Iterator<Item = Batch> + '_>;
}

/// In-memory trace set.
#[derive(Debug, Clone)]
pub struct Container {
    samples: DMatrix<f32>,
    metadata: Metadata,
    batch_size: usize,
}

impl Container {
    /// Wrap samples and metadata with the default batch size.
    ///
    /// # Errors
    ///
    /// Fails if a per-trace metadata field does not have one row per trace.
    pub fn new(samples: DMatrix<f32>, metadata: Metadata) -> Result<Self, AnalysisError> {
        let metadata = metadata.bind(samples.nrows())?;
        Ok(Self {
            samples,
            metadata,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Build from one sample vector and one metadata row per trace.
    ///
    /// Every trace must have the same number of samples, and every field the
    /// same width across traces.
    ///
    /// # Errors
    ///
    /// Fails if a field is missing from some trace or if widths differ.
    pub fn from_traces<'a>(
        traces: &[Vec<f32>],
        fields: impl IntoIterator<Item = (&'a str, Vec<Vec<u8>>)>,
    ) -> Result<Self, AnalysisError> {
        let n_samples = traces.first().map_or(0, Vec::len);
        let samples = DMatrix::from_fn(traces.len(), n_samples, |i, j| {
            traces[i].get(j).copied().unwrap_or(f32::NAN)
        });

        let mut metadata = Metadata::new();
        for (name, rows) in fields {
            let width = rows.first().map_or(0, Vec::len);
            if let Some(bad) = rows.iter().position(|r| r.len() != width) {
                return Err(AnalysisError::MetadataColumn {
                    field: name.to_string(),
                    width: rows[bad].len(),
                    column: width.saturating_sub(1),
                });
            }
            metadata.insert(name, DMatrix::from_fn(rows.len(), width, |i, j| rows[i][j]));
        }
        Self::new(samples, metadata)
    }

    /// Override the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Number of traces.
    pub fn len(&self) -> usize {
        self.samples.nrows()
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.nrows() == 0
    }

    /// Number of samples per trace.
    pub fn n_samples(&self) -> usize {
        self.samples.ncols()
    }

    /// Raw samples.
    pub fn samples(&self) -> &DMatrix<f32> {
        &self.samples
    }

    /// Metadata of every trace.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl TraceSource for Container {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn batches(&self, batch_size: usize) -> Box<dyn Iterator<Item = Batch> + '_> {
        let batch_size = batch_size.max(1);
        let n = self.len();
        Box::new((0..n).step_by(batch_size).map(move |start| {
            let len = batch_size.min(n - start);
            Batch {
                samples: self.samples.rows(start, len).into_owned(),
                metadata: self.metadata.rows(start, len),
            }
        }))
    }
}
