use crate::distance_measure::{row_slice, squared_distance};
use crate::error::{ClusterError, Result};
use crate::estimator::{check_n_clusters, params_of, rng_for, Clustering, KMeans};
use log::debug;
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const NAME: &str = "SpectralClustering";
const MAX_POWER_ITER: usize = 1000;
const POWER_TOL: f64 = 1e-10;

/// Clusters the leading eigenvectors of the normalized RBF affinity with k-means.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpectralClustering {
    pub n_clusters: usize,
    /// Kernel coefficient of `exp(-gamma * |x - y|^2)`.
    pub gamma: f64,
    pub n_init: usize,
    pub random_state: Option<u64>,
    #[serde(skip)]
    pub n_jobs: usize,
}

impl Default for SpectralClustering {
    fn default() -> Self {
        Self {
            n_clusters: 8,
            gamma: 1.0,
            n_init: 10,
            random_state: None,
            n_jobs: 0,
        }
    }
}

impl SpectralClustering {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Default::default()
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}

fn rbf_affinity(data: ArrayView2<f64>, gamma: f64) -> Array2<f64> {
    let n = data.nrows();
    let mut affinity = Array2::zeros((n, n));
    Zip::indexed(&mut affinity).par_for_each(|(i, j), a| {
        let d = squared_distance(&row_slice(&data.row(i)), &row_slice(&data.row(j)));
        *a = (-gamma * d).exp();
    });
    affinity
}

/// Modified Gram-Schmidt on the columns, in place.
fn orthonormalize(q: &mut Array2<f64>) {
    for j in 0..q.ncols() {
        for i in 0..j {
            let projection = q.column(i).dot(&q.column(j));
            let previous = q.column(i).to_owned();
            q.column_mut(j).scaled_add(-projection, &previous);
        }
        let norm = q.column(j).dot(&q.column(j)).sqrt();
        if norm > f64::EPSILON {
            q.column_mut(j).mapv_inplace(|x| x / norm);
        }
    }
}

/// Leading `k` eigenvectors of a symmetric matrix with eigenvalues in `[0, 2]`,
/// by orthogonal iteration.
fn leading_eigenvectors<R: Rng>(matrix: &Array2<f64>, k: usize, rng: &mut R) -> Array2<f64> {
    let n = matrix.nrows();
    let mut q = Array2::from_shape_fn((n, k), |_| rng.gen::<f64>() - 0.5);
    orthonormalize(&mut q);

    for iteration in 0..MAX_POWER_ITER {
        let mut next = matrix.dot(&q);
        orthonormalize(&mut next);
        // distance between the spanned subspaces
        let overlap = q.t().dot(&next);
        let change = (&next - &q.dot(&overlap)).mapv(|x| x * x).sum();
        q = next;
        if change < POWER_TOL {
            debug!("{} eigenvectors converged after {} iterations", NAME, iteration + 1);
            break;
        }
    }
    q
}

impl Clustering for SpectralClustering {
    fn fit(&self, data: ArrayView2<f64>) -> Result<Vec<usize>> {
        let n = data.nrows();
        check_n_clusters(NAME, self.n_clusters, n)?;
        if !(self.gamma > 0.0) {
            return Err(ClusterError::estimator(NAME, "gamma must be positive"));
        }

        let affinity = rbf_affinity(data, self.gamma);
        let degree_root: Array1<f64> = affinity.sum_axis(Axis(1)).mapv(f64::sqrt);

        // I + D^-1/2 A D^-1/2 shares its eigenvectors with the normalized laplacian
        // and has a non-negative spectrum
        let mut normalized = affinity;
        Zip::indexed(&mut normalized).for_each(|(i, j), a| {
            *a /= degree_root[i] * degree_root[j];
        });
        normalized.diag_mut().mapv_inplace(|x| x + 1.0);

        let mut rng = rng_for(self.random_state);
        let mut embedding = leading_eigenvectors(&normalized, self.n_clusters, &mut rng);
        for (mut row, &d) in embedding.outer_iter_mut().zip(degree_root.iter()) {
            row.mapv_inplace(|x| x / d);
        }

        KMeans {
            n_clusters: self.n_clusters,
            n_init: self.n_init,
            random_state: Some(rng.gen()),
            ..Default::default()
        }
        .fit(embedding.view())
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn get_params(&self) -> Result<BTreeMap<String, Value>> {
        params_of(self)
    }

    fn n_jobs(&self) -> usize {
        self.n_jobs
    }

    fn set_n_jobs(&mut self, n_jobs: usize) {
        self.n_jobs = n_jobs;
    }
}
