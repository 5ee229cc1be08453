use crate::distance_measure::{row_slice, squared_distance};
use crate::error::{ClusterError, Result};
use crate::estimator::{check_n_clusters, params_of, rng_for, Clustering};
use kdtree::KdTree;
use log::debug;
use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const NAME: &str = "KMeans";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KMeans {
    pub n_clusters: usize,
    /// Number of seeded restarts, the run with the lowest inertia wins.
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative tolerance on the squared center shift, scaled by the mean feature variance.
    pub tol: f64,
    pub random_state: Option<u64>,
    #[serde(skip)]
    pub n_jobs: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            n_clusters: 8,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            random_state: None,
            n_jobs: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct KMeansFit {
    pub centers: Array2<f64>,
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub n_iter: usize,
}

impl KMeans {
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

    pub fn fit_centers(&self, data: ArrayView2<f64>) -> Result<KMeansFit> {
        check_n_clusters(NAME, self.n_clusters, data.nrows())?;
        if self.n_init == 0 || self.max_iter == 0 {
            return Err(ClusterError::estimator(NAME, "n_init and max_iter must be at least 1"));
        }

        let tol = self.tol * mean_variance(data);
        let mut rng = rng_for(self.random_state);
        let mut best: Option<KMeansFit> = None;

        for run in 0..self.n_init {
            let mut centers = kmeans_plus_plus(data, self.n_clusters, &mut rng);
            let mut n_iter = 0;
            for _ in 0..self.max_iter {
                n_iter += 1;
                let (labels, _) = assign_labels(data, centers.view())?;
                let updated = update_centers(data, &labels, centers.view());
                let shift: f64 = (&updated - &centers).mapv(|x| x * x).sum();
                centers = updated;
                if shift <= tol {
                    break;
                }
            }

            let (labels, inertia) = assign_labels(data, centers.view())?;
            debug!("{} run {} converged after {} iterations, inertia {}", NAME, run, n_iter, inertia);
            if best.as_ref().map_or(true, |b| inertia < b.inertia) {
                best = Some(KMeansFit {
                    centers,
                    labels,
                    inertia,
                    n_iter,
                });
            }
        }

        best.ok_or_else(|| ClusterError::estimator(NAME, "no run finished"))
    }
}

impl Clustering for KMeans {
    fn fit(&self, data: ArrayView2<f64>) -> Result<Vec<usize>> {
        Ok(self.fit_centers(data)?.labels)
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

fn mean_variance(data: ArrayView2<f64>) -> f64 {
    data.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

/// k-means++ seeding: each next center is drawn with probability proportional to
/// its squared distance from the centers chosen so far.
pub(crate) fn kmeans_plus_plus<R: Rng>(data: ArrayView2<f64>, k: usize, rng: &mut R) -> Array2<f64> {
    let n = data.nrows();
    let mut centers = Array2::zeros((k, data.ncols()));
    let first = rng.gen_range(0..n);
    centers.row_mut(0).assign(&data.row(first));

    let mut closest: Vec<f64> = data
        .outer_iter()
        .map(|row| squared_distance(&row_slice(&row), &row_slice(&data.row(first))))
        .collect();

    for c in 1..k {
        let total: f64 = closest.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, &d) in closest.iter().enumerate() {
                if target < d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            // every point already coincides with a center
            rng.gen_range(0..n)
        };

        centers.row_mut(c).assign(&data.row(chosen));
        let center = data.row(chosen);
        for (d, row) in closest.iter_mut().zip(data.outer_iter()) {
            *d = d.min(squared_distance(&row_slice(&row), &row_slice(&center)));
        }
    }

    centers
}

/// Labels every row with its nearest center and returns the total squared distance.
pub(crate) fn assign_labels(data: ArrayView2<f64>, centers: ArrayView2<f64>) -> Result<(Vec<usize>, f64)> {
    let tree_err = |e: kdtree::ErrorKind| ClusterError::estimator(NAME, format!("{:?}", e));

    let mut tree = KdTree::new(centers.ncols());
    for (i, center) in centers.outer_iter().enumerate() {
        tree.add(center.to_vec(), i).map_err(tree_err)?;
    }

    let nearest: Vec<(usize, f64)> = data
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(|row| {
            let found = tree
                .nearest(&row_slice(&row), 1, &squared_distance)
                .map_err(tree_err)?;
            found
                .first()
                .map(|found| (*found.1, found.0))
                .ok_or_else(|| ClusterError::estimator(NAME, "no center to assign to"))
        })
        .collect::<Result<_>>()?;

    let inertia = nearest.iter().map(|(_, d)| d).sum();
    Ok((nearest.into_iter().map(|(label, _)| label).collect(), inertia))
}

/// Mean of the rows assigned to every center. Centers without members stay put.
pub(crate) fn update_centers(data: ArrayView2<f64>, labels: &[usize], centers: ArrayView2<f64>) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(centers.raw_dim());
    let mut counts = vec![0usize; centers.nrows()];
    for (row, &label) in data.outer_iter().zip(labels.iter()) {
        let mut sum = sums.row_mut(label);
        sum += &row;
        counts[label] += 1;
    }

    let mut updated = centers.to_owned();
    for (c, &count) in counts.iter().enumerate() {
        if count > 0 {
            let mean = &sums.row(c) / count as f64;
            updated.row_mut(c).assign(&mean);
        }
    }
    updated
}
