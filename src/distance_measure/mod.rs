use kdtree::distance::squared_euclidean;
use ndarray::{ArrayView1, ArrayView2};
use std::borrow::Cow;

pub mod euclidean;

pub use euclidean::{Euclidean, SquaredEuclidean};

pub trait DistanceMeasure where Self: Default + Copy + Clone + Sync {
    fn distance(point_a: &[f64], point_b: &[f64]) -> f64;
    fn name() -> &'static str;
}

/// Borrows the row if it is contiguous, copies it otherwise.
pub(crate) fn row_slice<'a>(row: &'a ArrayView1<f64>) -> Cow<'a, [f64]> {
    match row.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(row.to_vec()),
    }
}

/// Pairwise distances between all rows, as the condensed upper triangle
/// `d(0,1), d(0,2), ..., d(1,2), ...`.
pub fn pdist<D: DistanceMeasure>(points: ArrayView2<f64>) -> Vec<f64> {
    let rows: Vec<Vec<f64>> = points.outer_iter().map(|r| r.to_vec()).collect();
    let n = rows.len();
    let mut condensed = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            condensed.push(D::distance(&rows[i], &rows[j]));
        }
    }
    condensed
}

/// Position of the pair `(i, j)`, `i < j`, in a condensed distance vector over `n` points.
pub fn condensed_index(n: usize, i: usize, j: usize) -> usize {
    debug_assert!(i < j && j < n);
    n * i - i * (i + 1) / 2 + (j - i - 1)
}

pub(crate) fn squared_distance(point_a: &[f64], point_b: &[f64]) -> f64 {
    squared_euclidean(point_a, point_b)
}
