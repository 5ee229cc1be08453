use crate::dataset::{Dataset, Dimension, IndexMapping};
use crate::dtype::DataArray;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn close_l1(expected: f64, actual: f64, tolerance: f64) {
    assert!(
        (expected - actual).abs() <= tolerance,
        "expected {} but got {} (tolerance {})",
        expected,
        actual,
        tolerance
    );
}

/// Gaussian blobs around `centers`; sample `i` belongs to blob `i % centers.nrows()`.
pub fn generate_blobs(centers: &Array2<f64>, n_samples: usize, std: f64, seed: u64) -> (Array2<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, std).unwrap();
    let k = centers.nrows();

    let truth: Vec<usize> = (0..n_samples).map(|i| i % k).collect();
    let mut data = centers.select(Axis(0), &truth);
    data.mapv_inplace(|x| x + noise.sample(&mut rng));
    (data, truth)
}

/// True if both labelings group the rows identically, whatever the label names.
pub fn same_partition(a: &[usize], b: &[usize]) -> bool {
    let mut forward = HashMap::new();
    let mut backward = HashMap::new();
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(&x, &y)| {
            *forward.entry(x).or_insert(y) == y && *backward.entry(y).or_insert(x) == x
        })
}

/// A dataset on an `x_steps` x `y_steps` grid with one spectroscopic dimension.
pub fn grid_dataset(data: DataArray, x_steps: usize, y_steps: usize) -> Dataset {
    let position = IndexMapping::from_dimensions(&[
        Dimension::steps("X", "um", x_steps),
        Dimension::steps("Y", "um", y_steps),
    ]);
    let bias: Vec<f64> = (0..data.ncols()).map(|i| -1.0 + 0.2 * i as f64).collect();
    let spectroscopic = IndexMapping::from_dimensions(&[Dimension::new("Bias", "V", bias)]);
    Dataset::new("/Measurement_000/Channel_000/Raw_Data", data, position, spectroscopic)
        .unwrap()
        .with_quantity("Amplitude", "V")
}
