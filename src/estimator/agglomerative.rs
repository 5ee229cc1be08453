use crate::distance_measure::{pdist, Euclidean};
use crate::error::Result;
use crate::estimator::{check_n_clusters, params_of, Clustering};
use crate::linkage::{cut_tree, linkage, LinkageMethod};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const NAME: &str = "AgglomerativeClustering";

/// Bottom-up hierarchical clustering on euclidean distances, cut into `n_clusters`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgglomerativeClustering {
    pub n_clusters: usize,
    pub linkage: LinkageMethod,
    #[serde(skip)]
    pub n_jobs: usize,
}

impl Default for AgglomerativeClustering {
    fn default() -> Self {
        Self {
            n_clusters: 2,
            linkage: LinkageMethod::Ward,
            n_jobs: 0,
        }
    }
}

impl AgglomerativeClustering {
    pub fn new(n_clusters: usize, linkage: LinkageMethod) -> Self {
        Self {
            n_clusters,
            linkage,
            n_jobs: 0,
        }
    }
}

impl Clustering for AgglomerativeClustering {
    fn fit(&self, data: ArrayView2<f64>) -> Result<Vec<usize>> {
        let n = data.nrows();
        check_n_clusters(NAME, self.n_clusters, n)?;
        let z = linkage(&pdist::<Euclidean>(data), n, self.linkage)?;
        cut_tree(z.view(), n, self.n_clusters)
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
