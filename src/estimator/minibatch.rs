use crate::error::{ClusterError, Result};
use crate::estimator::kmeans::{assign_labels, kmeans_plus_plus};
use crate::estimator::{check_n_clusters, params_of, rng_for, Clustering};
use log::debug;
use ndarray::{ArrayView2, Axis};
use num_integer::Integer;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const NAME: &str = "MiniBatchKMeans";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MiniBatchKMeans {
    pub n_clusters: usize,
    pub batch_size: usize,
    /// Passes over the full dataset.
    pub max_iter: usize,
    pub n_init: usize,
    /// Consecutive batches without improvement of the smoothed inertia before stopping.
    pub max_no_improvement: usize,
    pub random_state: Option<u64>,
    #[serde(skip)]
    pub n_jobs: usize,
}

impl Default for MiniBatchKMeans {
    fn default() -> Self {
        Self {
            n_clusters: 8,
            batch_size: 1024,
            max_iter: 100,
            n_init: 3,
            max_no_improvement: 10,
            random_state: None,
            n_jobs: 0,
        }
    }
}

impl MiniBatchKMeans {
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

impl Clustering for MiniBatchKMeans {
    fn fit(&self, data: ArrayView2<f64>) -> Result<Vec<usize>> {
        let n = data.nrows();
        check_n_clusters(NAME, self.n_clusters, n)?;
        if self.batch_size == 0 || self.max_iter == 0 || self.n_init == 0 {
            return Err(ClusterError::estimator(
                NAME,
                "batch_size, max_iter and n_init must be at least 1",
            ));
        }

        let batch_size = self.batch_size.min(n);
        let steps = self.max_iter * Integer::div_ceil(&n, &batch_size);
        let smoothing = batch_size as f64 / n as f64;
        let mut rng = rng_for(self.random_state);
        let mut best: Option<(Vec<usize>, f64)> = None;

        for run in 0..self.n_init {
            let mut centers = kmeans_plus_plus(data, self.n_clusters, &mut rng);
            let mut counts = vec![0usize; self.n_clusters];
            let mut smoothed: Option<f64> = None;
            let mut best_smoothed = f64::INFINITY;
            let mut no_improvement = 0;

            for step in 0..steps {
                let batch = data.select(Axis(0), &sample(&mut rng, n, batch_size).into_vec());
                let (labels, inertia) = assign_labels(batch.view(), centers.view())?;

                for (row, &label) in batch.outer_iter().zip(labels.iter()) {
                    counts[label] += 1;
                    let rate = 1.0 / counts[label] as f64;
                    let mut center = centers.row_mut(label);
                    center *= 1.0 - rate;
                    center.scaled_add(rate, &row);
                }

                let batch_inertia = inertia / batch_size as f64;
                let current = match smoothed {
                    Some(s) => s * (1.0 - smoothing) + batch_inertia * smoothing,
                    None => batch_inertia,
                };
                smoothed = Some(current);

                if current < best_smoothed {
                    best_smoothed = current;
                    no_improvement = 0;
                } else {
                    no_improvement += 1;
                }
                if self.max_no_improvement > 0 && no_improvement >= self.max_no_improvement {
                    debug!("{} run {} stopped early after {} batches", NAME, run, step + 1);
                    break;
                }
            }

            let (labels, inertia) = assign_labels(data, centers.view())?;
            if best.as_ref().map_or(true, |(_, b)| inertia < *b) {
                best = Some((labels, inertia));
            }
        }

        best.map(|(labels, _)| labels)
            .ok_or_else(|| ClusterError::estimator(NAME, "no run finished"))
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
