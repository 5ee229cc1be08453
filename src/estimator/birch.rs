use crate::distance_measure::{row_slice, squared_distance};
use crate::error::{ClusterError, Result};
use crate::estimator::kmeans::assign_labels;
use crate::estimator::{params_of, AgglomerativeClustering, Clustering};
use crate::linkage::LinkageMethod;
use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const NAME: &str = "Birch";

/// Balanced iterative reduction: rows are condensed into clustering-feature
/// subclusters, which are then grouped into `n_clusters` by ward linkage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Birch {
    /// Largest radius a subcluster may grow to.
    pub threshold: f64,
    /// Most subclusters held by one leaf node.
    pub branching_factor: usize,
    /// `None` keeps every subcluster as its own cluster.
    pub n_clusters: Option<usize>,
    #[serde(skip)]
    pub n_jobs: usize,
}

impl Default for Birch {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            branching_factor: 50,
            n_clusters: Some(3),
            n_jobs: 0,
        }
    }
}

impl Birch {
    pub fn new(threshold: f64, n_clusters: Option<usize>) -> Self {
        Self {
            threshold,
            n_clusters,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug)]
struct Subcluster {
    n: usize,
    linear_sum: Array1<f64>,
    squared_sum: f64,
    centroid: Array1<f64>,
}

impl Subcluster {
    fn new(point: ArrayView1<f64>) -> Self {
        Self {
            n: 1,
            linear_sum: point.to_owned(),
            squared_sum: point.dot(&point),
            centroid: point.to_owned(),
        }
    }

    /// Radius of the subcluster if `point` were added.
    fn radius_with(&self, point: ArrayView1<f64>) -> f64 {
        let n = (self.n + 1) as f64;
        let linear_sum = &self.linear_sum + &point;
        let squared_sum = self.squared_sum + point.dot(&point);
        let centroid = linear_sum / n;
        (squared_sum / n - centroid.dot(&centroid)).max(0.0).sqrt()
    }

    fn add(&mut self, point: ArrayView1<f64>) {
        self.n += 1;
        self.linear_sum += &point;
        self.squared_sum += point.dot(&point);
        self.centroid = &self.linear_sum / self.n as f64;
    }
}

fn distance_between(a: &Array1<f64>, b: ArrayView1<f64>) -> f64 {
    squared_distance(&row_slice(&a.view()), &row_slice(&b))
}

/// Splits an overfull leaf around its two most distant subclusters.
fn split_leaf(leaf: Vec<Subcluster>) -> (Vec<Subcluster>, Vec<Subcluster>) {
    let mut far = (0, 0, -1.0);
    for i in 0..leaf.len() {
        for j in (i + 1)..leaf.len() {
            let d = distance_between(&leaf[i].centroid, leaf[j].centroid.view());
            if d > far.2 {
                far = (i, j, d);
            }
        }
    }

    let (a, b) = (leaf[far.0].centroid.clone(), leaf[far.1].centroid.clone());
    leaf.into_iter()
        .partition(|s| distance_between(&a, s.centroid.view()) <= distance_between(&b, s.centroid.view()))
}

impl Birch {
    fn build_subclusters(&self, data: ArrayView2<f64>) -> Result<Vec<Subcluster>> {
        let mut leaves: Vec<Vec<Subcluster>> = vec![Vec::new()];

        for point in data.outer_iter() {
            let distances: Vec<(usize, usize, f64)> = leaves
                .iter()
                .enumerate()
                .flat_map(|(l, leaf)| {
                    leaf.iter()
                        .enumerate()
                        .map(move |(s, sub)| (l, s, distance_between(&sub.centroid, point)))
                })
                .collect();

            let nearest = if distances.is_empty() {
                None
            } else {
                let d = Array1::from_iter(distances.iter().map(|(_, _, d)| *d));
                let i = d
                    .argmin()
                    .map_err(|e| ClusterError::estimator(NAME, e.to_string()))?;
                Some((distances[i].0, distances[i].1))
            };

            match nearest {
                Some((l, s)) if leaves[l][s].radius_with(point) <= self.threshold => leaves[l][s].add(point),
                Some((l, _)) => {
                    leaves[l].push(Subcluster::new(point));
                    if leaves[l].len() > self.branching_factor {
                        let (left, right) = split_leaf(leaves.swap_remove(l));
                        leaves.push(left);
                        leaves.push(right);
                    }
                }
                None => leaves[0].push(Subcluster::new(point)),
            }
        }

        Ok(leaves.into_iter().flatten().collect())
    }
}

impl Clustering for Birch {
    fn fit(&self, data: ArrayView2<f64>) -> Result<Vec<usize>> {
        if !(self.threshold > 0.0) {
            return Err(ClusterError::estimator(NAME, "threshold must be positive"));
        }
        if self.branching_factor < 2 {
            return Err(ClusterError::estimator(NAME, "branching_factor must be at least 2"));
        }

        let subclusters = self.build_subclusters(data)?;
        let mut centroids = Array2::zeros((subclusters.len(), data.ncols()));
        for (mut row, sub) in centroids.outer_iter_mut().zip(subclusters.iter()) {
            row.assign(&sub.centroid);
        }
        debug!("{} condensed {} rows into {} subclusters", NAME, data.nrows(), subclusters.len());

        let subcluster_labels: Vec<usize> = match self.n_clusters {
            Some(0) => return Err(ClusterError::estimator(NAME, "n_clusters must be at least 1")),
            Some(k) if k <= subclusters.len() => {
                AgglomerativeClustering::new(k, LinkageMethod::Ward).fit(centroids.view())?
            }
            Some(k) => {
                warn!(
                    "{} found only {} subclusters, fewer than n_clusters={}; decrease the threshold",
                    NAME,
                    subclusters.len(),
                    k
                );
                (0..subclusters.len()).collect()
            }
            None => (0..subclusters.len()).collect(),
        };

        let (nearest, _) = assign_labels(data, centroids.view())?;
        Ok(nearest.into_iter().map(|s| subcluster_labels[s]).collect())
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
