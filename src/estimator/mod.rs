//! The clustering algorithms a [`ClusterRunner`](crate::ClusterRunner) accepts.
//!
//! The set is closed: every supported family is a variant of [`Estimator`], and
//! names of any other algorithm are rejected where estimators are built from
//! configuration.


mod agglomerative;
mod birch;
mod kmeans;
mod minibatch;
mod spectral;

pub use agglomerative::AgglomerativeClustering;
pub use birch::Birch;
pub use kmeans::{KMeans, KMeansFit};
pub use minibatch::MiniBatchKMeans;
pub use spectral::SpectralClustering;

use crate::error::{ClusterError, Result};
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Common capability of every supported clustering algorithm.
pub trait Clustering {
    /// Fit the model and return one label per row of `data`.
    fn fit(&self, data: ArrayView2<f64>) -> Result<Vec<usize>>;

    fn name(&self) -> &'static str;

    /// Hyperparameters, without the concurrency hint.
    fn get_params(&self) -> Result<BTreeMap<String, Value>>;

    fn n_jobs(&self) -> usize;

    fn set_n_jobs(&mut self, n_jobs: usize);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlgorithmFamily {
    Agglomerative,
    Birch,
    KMeans,
    MiniBatchKMeans,
    Spectral,
}

impl AlgorithmFamily {
    pub const ALL: [AlgorithmFamily; 5] = [
        Self::Agglomerative,
        Self::Birch,
        Self::KMeans,
        Self::MiniBatchKMeans,
        Self::Spectral,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Agglomerative => "AgglomerativeClustering",
            Self::Birch => "Birch",
            Self::KMeans => "KMeans",
            Self::MiniBatchKMeans => "MiniBatchKMeans",
            Self::Spectral => "SpectralClustering",
        }
    }
}

impl fmt::Display for AlgorithmFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmFamily {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|family| family.name() == s)
            .ok_or_else(|| ClusterError::UnsupportedEstimator { name: s.to_string() })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Estimator {
    Agglomerative(AgglomerativeClustering),
    Birch(Birch),
    KMeans(KMeans),
    MiniBatchKMeans(MiniBatchKMeans),
    Spectral(SpectralClustering),
}

impl Estimator {
    pub fn family(&self) -> AlgorithmFamily {
        match self {
            Self::Agglomerative(_) => AlgorithmFamily::Agglomerative,
            Self::Birch(_) => AlgorithmFamily::Birch,
            Self::KMeans(_) => AlgorithmFamily::KMeans,
            Self::MiniBatchKMeans(_) => AlgorithmFamily::MiniBatchKMeans,
            Self::Spectral(_) => AlgorithmFamily::Spectral,
        }
    }

    /// Builds an estimator from an algorithm name and its hyperparameters.
    /// Hyperparameters that are left out keep their defaults.
    pub fn from_params(name: &str, params: Value) -> Result<Self> {
        Ok(match name.parse::<AlgorithmFamily>()? {
            AlgorithmFamily::Agglomerative => Self::Agglomerative(serde_json::from_value(params)?),
            AlgorithmFamily::Birch => Self::Birch(serde_json::from_value(params)?),
            AlgorithmFamily::KMeans => Self::KMeans(serde_json::from_value(params)?),
            AlgorithmFamily::MiniBatchKMeans => Self::MiniBatchKMeans(serde_json::from_value(params)?),
            AlgorithmFamily::Spectral => Self::Spectral(serde_json::from_value(params)?),
        })
    }

    fn inner(&self) -> &dyn Clustering {
        match self {
            Self::Agglomerative(e) => e,
            Self::Birch(e) => e,
            Self::KMeans(e) => e,
            Self::MiniBatchKMeans(e) => e,
            Self::Spectral(e) => e,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Clustering {
        match self {
            Self::Agglomerative(e) => e,
            Self::Birch(e) => e,
            Self::KMeans(e) => e,
            Self::MiniBatchKMeans(e) => e,
            Self::Spectral(e) => e,
        }
    }

    /// Validates the data and fits on a thread pool sized by the concurrency hint.
    pub fn fit_predict(&self, data: ArrayView2<f64>) -> Result<Vec<usize>> {
        let name = self.name();
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(ClusterError::estimator(name, "cannot cluster an empty dataset"));
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(ClusterError::estimator(name, "data contains NaN or infinite values"));
        }

        let labels = match self.n_jobs() {
            0 => self.fit(data)?,
            n_jobs => rayon::ThreadPoolBuilder::new()
                .num_threads(n_jobs)
                .build()?
                .install(|| self.fit(data))?,
        };

        if labels.len() != data.nrows() {
            return Err(ClusterError::estimator(
                name,
                format!("{} labels returned for {} rows", labels.len(), data.nrows()),
            ));
        }
        Ok(labels)
    }
}

impl Clustering for Estimator {
    fn fit(&self, data: ArrayView2<f64>) -> Result<Vec<usize>> {
        self.inner().fit(data)
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn get_params(&self) -> Result<BTreeMap<String, Value>> {
        self.inner().get_params()
    }

    fn n_jobs(&self) -> usize {
        self.inner().n_jobs()
    }

    fn set_n_jobs(&mut self, n_jobs: usize) {
        self.inner_mut().set_n_jobs(n_jobs)
    }
}

macro_rules! impl_from_estimator {
    ($($variant:ident => $ty:ty),*) => {
        $(impl From<$ty> for Estimator {
            fn from(estimator: $ty) -> Self {
                Self::$variant(estimator)
            }
        })*
    };
}

impl_from_estimator!(
    Agglomerative => AgglomerativeClustering,
    Birch => Birch,
    KMeans => KMeans,
    MiniBatchKMeans => MiniBatchKMeans,
    Spectral => SpectralClustering
);

/// An estimator described by configuration, e.g.
/// `{"cluster_algorithm": "KMeans", "n_clusters": 4, "random_state": 7}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub cluster_algorithm: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl EstimatorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build(&self) -> Result<Estimator> {
        Estimator::from_params(&self.cluster_algorithm, Value::Object(self.params.clone()))
    }
}

pub(crate) fn params_of<T: Serialize>(estimator: &T) -> Result<BTreeMap<String, Value>> {
    match serde_json::to_value(estimator)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Ok(std::iter::once(("value".to_string(), other)).collect()),
    }
}

pub(crate) fn check_n_clusters(algorithm: &'static str, n_clusters: usize, n_samples: usize) -> Result<()> {
    if n_clusters == 0 || n_clusters > n_samples {
        return Err(ClusterError::estimator(
            algorithm,
            format!("n_clusters={} must be between 1 and n_samples={}", n_clusters, n_samples),
        ));
    }
    Ok(())
}

pub(crate) fn rng_for(random_state: Option<u64>) -> StdRng {
    match random_state {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
