//! Synthetic trace sets leaking the Hamming weight of `plaintext ^ KEY`.

use std::cell::Cell;

use distinguo::{Batch, Container, Metadata, TraceSource};
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

pub const KEY: u8 = 0x2B;
pub const N_SAMPLES: usize = 5;
pub const LEAKY_SAMPLE: usize = 2;

/// `n_traces` traces of `N_SAMPLES` Gaussian noise samples, with
/// `HW(plaintext ^ KEY)` added at `LEAKY_SAMPLE`.
pub fn leaky_container(seed: u64, n_traces: usize) -> Container {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let noise = Normal::new(0.0f32, 0.5).unwrap();

    let plaintext: Vec<u8> = (0..n_traces).map(|_| rng.gen()).collect();
    let mut samples = DMatrix::<f32>::zeros(n_traces, N_SAMPLES);
    for i in 0..n_traces {
        for j in 0..N_SAMPLES {
            samples[(i, j)] = noise.sample(&mut rng);
        }
        samples[(i, LEAKY_SAMPLE)] += (plaintext[i] ^ KEY).count_ones() as f32;
    }

    let metadata = Metadata::new()
        .with_field("plaintext", DMatrix::from_column_slice(n_traces, 1, &plaintext))
        .with_field("key", DMatrix::from_row_slice(1, 1, &[KEY]));
    Container::new(samples, metadata).unwrap()
}

/// Wraps a container and remembers the batch size `run` asked for.
pub struct RecordingSource {
    pub inner: Container,
    pub requested: Cell<Option<usize>>,
}

impl RecordingSource {
    pub fn new(inner: Container) -> Self {
        Self {
            inner,
            requested: Cell::new(None),
        }
    }
}

impl TraceSource for RecordingSource {
    fn batch_size(&self) -> usize {
        self.inner.batch_size()
    }

    fn batches(&self, batch_size: usize) -> Box<dyn Iterator<Item = Batch> + '_> {
        self.requested.set(Some(batch_size));
        self.inner.batches(batch_size)
    }
}

pub fn assert_close(a: &DMatrix<f64>, b: &DMatrix<f64>, tol: f64) {
    assert_eq!(a.shape(), b.shape());
    for (x, y) in a.iter().zip(b.iter()) {
        if x.is_nan() && y.is_nan() {
            continue;
        }
        assert!((x - y).abs() <= tol, "{x} != {y}");
    }
}
