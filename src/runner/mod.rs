//! Drives a clustering estimator over a main dataset and keeps its results.
//!
//! A [`ClusterRunner`] resolves the spectroscopic components once, fits the
//! estimator on their real scalar form, averages the members of every cluster
//! and hands the outcome to a [`ResultStore`]. Results that were computed
//! before with identical parameters are looked up instead of being recomputed.


mod mean_response;

pub use mean_response::{compact_labels, mean_response};

use crate::components::{ComponentSelection, ResolvedComponents};
use crate::dataset::{squeeze, Dataset, Dimension, IndexMapping};
use crate::dtype::{DataArray, NdArray, ScalarTransform};
use crate::error::{ClusterError, Result};
use crate::estimator::{Clustering, Estimator, EstimatorConfig};
use crate::params::{Fingerprint, ParameterSnapshot};
use crate::reorder::reorder_clusters;
use crate::store::{
    Attributes, GroupHandle, ResultStore, StoredDataset, FINGERPRINT_ATTR, LABELS, LAST_PIXEL_ATTR,
    MEAN_RESPONSE, SOURCE_ATTR,
};
use log::{debug, info};
use ndarray::{Array1, ArrayD, Axis};
use rayon::ThreadPool;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

pub struct RunnerParameters {
    /// Threads for fitting and averaging. All available cores when `None`.
    pub cores: Option<usize>,
    pub process_name: String,
    /// Log progress and timings at info level rather than debug.
    pub verbose: bool,
}

impl Default for RunnerParameters {
    fn default() -> Self {
        Self {
            cores: None,
            process_name: "Cluster".to_string(),
            verbose: false,
        }
    }
}

impl RunnerParameters {
    pub fn cores(&self) -> usize {
        self.cores.unwrap_or_else(rayon::current_num_threads).max(1)
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Origin {
    Fresh,
    Existing(GroupHandle),
}

/// Results held in memory between `test` and `compute`.
#[derive(Clone, Debug)]
struct CachedResults {
    labels: StoredDataset,
    mean_response: StoredDataset,
    origin: Origin,
}

impl CachedResults {
    /// Reshapes the labels onto the position grid and the mean responses onto
    /// `spectroscopic`, the grid of the clustered columns.
    fn to_n_dims(&self, spectroscopic: &IndexMapping) -> Result<(ArrayD<u32>, NdArray)> {
        let labels = match self.labels.reshape_to_n_dims()? {
            NdArray::Unsigned(labels) => squeeze(labels)?,
            other => {
                return Err(ClusterError::reshape(format!(
                    "labels must be unsigned but are {:?}",
                    other.family()
                )))
            }
        };
        let mean_response = self
            .mean_response
            .data
            .reshape_to_n_dims(&self.mean_response.position, spectroscopic)?;
        Ok((labels, mean_response))
    }
}

pub struct ClusterRunner<S: ResultStore> {
    dataset: Arc<Dataset>,
    estimator: Estimator,
    components: ResolvedComponents,
    store: S,
    parameters: RunnerParameters,
    snapshot: ParameterSnapshot,
    fingerprint: Fingerprint,
    transform: ScalarTransform,
    pool: ThreadPool,
    cache: Option<CachedResults>,
}

impl<S: ResultStore> ClusterRunner<S> {
    pub fn new(
        dataset: impl Into<Arc<Dataset>>,
        mut estimator: Estimator,
        components: ComponentSelection,
        store: S,
        parameters: RunnerParameters,
    ) -> Result<Self> {
        let dataset = dataset.into();
        let components = components.resolve(dataset.num_features())?;

        let cores = parameters.cores();
        estimator.set_n_jobs(cores);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(cores).build()?;

        let snapshot = ParameterSnapshot::new(&estimator, &components)?;
        let fingerprint = snapshot.fingerprint(dataset.name(), &parameters.process_name);
        let transform = ScalarTransform::check_dtype(dataset.data());
        debug!(
            "{} on {} with {} of {} components, fingerprint {}",
            estimator.name(),
            dataset.name(),
            components.num_comps(),
            dataset.num_features(),
            fingerprint
        );

        Ok(Self {
            dataset,
            estimator,
            components,
            store,
            parameters,
            snapshot,
            fingerprint,
            transform,
            pool,
            cache: None,
        })
    }

    /// Builds the estimator from configuration, rejecting unsupported algorithms.
    pub fn from_config(
        dataset: impl Into<Arc<Dataset>>,
        config: &EstimatorConfig,
        components: ComponentSelection,
        store: S,
        parameters: RunnerParameters,
    ) -> Result<Self> {
        Self::new(dataset, config.build()?, components, store, parameters)
    }

    pub fn parameters(&self) -> &ParameterSnapshot {
        &self.snapshot
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn num_comps(&self) -> usize {
        self.components.num_comps()
    }

    pub fn components(&self) -> &ResolvedComponents {
        &self.components
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn has_cached_results(&self) -> bool {
        self.cache.is_some()
    }

    /// Clusters the dataset, or picks up earlier results with the same parameters,
    /// without writing anything.
    ///
    /// Returns the labels on the position grid and the mean responses as
    /// `(cluster, spectroscopic dimensions...)`.
    pub fn test(&mut self, rearrange_clusters: bool, override_existing: bool) -> Result<(ArrayD<u32>, NdArray)> {
        let cache = self.run(rearrange_clusters, override_existing)?;
        let results = cache.to_n_dims(&self.selected_spectroscopic())?;
        self.cache = Some(cache);
        Ok(results)
    }

    /// Persists the results and returns their group.
    ///
    /// Results that were picked up from an existing group are not written again
    /// unless `override_existing` asks for a recomputation. Freshly computed
    /// results are always written.
    pub fn compute(&mut self, rearrange_clusters: bool, override_existing: bool) -> Result<GroupHandle> {
        let cache = match self.cache.take() {
            Some(cache) if !(override_existing && cache.origin != Origin::Fresh) => cache,
            _ => {
                let cache = self.run(rearrange_clusters, override_existing)?;
                cache.to_n_dims(&self.selected_spectroscopic())?;
                cache
            }
        };

        if let Origin::Existing(group) = &cache.origin {
            debug!("{} already holds these results", group);
            return Ok(group.clone());
        }
        match self.write_results(&cache) {
            Ok(group) => Ok(group),
            Err(e) => {
                self.cache = Some(cache);
                Err(e)
            }
        }
    }

    /// Drops results held in memory. Nothing that was written is touched.
    pub fn delete_results(&mut self) {
        if self.cache.take().is_some() {
            debug!("dropped cached results for {}", self.dataset.name());
        }
    }

    /// Spectroscopic entries of the clustered columns, in selection order.
    fn selected_spectroscopic(&self) -> IndexMapping {
        self.dataset.spectroscopic().select_entries(self.components.indices())
    }

    fn log_progress(&self, message: String) {
        if self.parameters.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }

    fn run(&self, rearrange_clusters: bool, override_existing: bool) -> Result<CachedResults> {
        let source = self.dataset.name();
        let duplicates = self
            .store
            .check_for_duplicates(source, &self.parameters.process_name, &self.snapshot)
            .map_err(|e| ClusterError::Storage {
                group: source.to_string(),
                source: e,
            })?;
        if !duplicates.partial.is_empty() {
            debug!(
                "ignoring {} partially written results groups: {:?}",
                duplicates.partial.len(),
                duplicates.partial
            );
        }

        if !override_existing {
            if let Some(group) = duplicates.latest_complete() {
                info!("Returning previously computed results from: {}", group);
                return self.load_existing(group.clone());
            }
        }
        self.fit(rearrange_clusters)
    }

    fn load_existing(&self, group: GroupHandle) -> Result<CachedResults> {
        let read = |name: &str| {
            self.store.read_dataset(&group, name).map_err(|e| ClusterError::Storage {
                group: group.name.clone(),
                source: e,
            })
        };
        Ok(CachedResults {
            labels: read(LABELS)?,
            mean_response: read(MEAN_RESPONSE)?,
            origin: Origin::Existing(group.clone()),
        })
    }

    fn fit(&self, rearrange_clusters: bool) -> Result<CachedResults> {
        let selected = self.dataset.data().select_columns(self.components.indices());
        let real = self.transform.to_real(&selected)?;

        let start = Instant::now();
        let raw_labels = self.estimator.fit_predict(real.view())?;
        let (labels, num_clusters) = compact_labels(&raw_labels);
        self.log_progress(format!(
            "{} found {} clusters in {} positions after {:?}",
            self.estimator.name(),
            num_clusters,
            labels.len(),
            start.elapsed()
        ));

        let start = Instant::now();
        let mean_real = self
            .pool
            .install(|| mean_response(real.view(), labels.view(), num_clusters))?;
        let mean = self.transform.from_real(mean_real.view())?;
        self.log_progress(format!("mean response of {} clusters took {:?}", num_clusters, start.elapsed()));

        let (labels, mean) = if rearrange_clusters {
            reorder_clusters(labels.view(), &mean, &self.transform)?
        } else {
            (labels, mean)
        };

        Ok(CachedResults {
            labels: self.labels_dataset(labels),
            mean_response: self.mean_response_dataset(mean, num_clusters),
            origin: Origin::Fresh,
        })
    }

    fn labels_dataset(&self, labels: Array1<u32>) -> StoredDataset {
        StoredDataset {
            data: DataArray::Unsigned(labels.insert_axis(Axis(1))),
            position: self.dataset.position().clone(),
            spectroscopic: IndexMapping::from_dimensions(&[Dimension::steps("Cluster", "ID", 1)]),
            quantity: "Cluster ID".to_string(),
            units: "a. u.".to_string(),
        }
    }

    fn mean_response_dataset(&self, mean: DataArray, num_clusters: usize) -> StoredDataset {
        let source = self.dataset.spectroscopic();
        let spectroscopic = if self.components.covers_all() {
            source.clone()
        } else {
            let selected = self.components.indices();
            // several source dimensions cannot share one axis, so fall back to column indices
            let values = match source.values().ncols() {
                1 => selected.iter().map(|&i| source.values()[[i, 0]]).collect(),
                _ => selected.iter().map(|&i| i as f64).collect(),
            };
            IndexMapping::from_dimensions(&[Dimension::new("Original_Spectral_Index", "a.u.", values)])
        };
        StoredDataset {
            data: mean,
            position: IndexMapping::from_dimensions(&[Dimension::steps("Cluster", "a. u.", num_clusters)]),
            spectroscopic,
            quantity: self.dataset.quantity().to_string(),
            units: self.dataset.units().to_string(),
        }
    }

    fn write_results(&mut self, cache: &CachedResults) -> Result<GroupHandle> {
        let source = self.dataset.name().to_string();
        let group = self
            .store
            .create_results_group(&source, &self.parameters.process_name)
            .map_err(|e| ClusterError::Persistence {
                group: format!("{}-{}", self.dataset.leaf_name(), self.parameters.process_name),
                source: e,
            })?;

        let positions = self.dataset.num_positions();
        let mut attributes: Attributes = self.snapshot.to_attributes();
        attributes.insert(FINGERPRINT_ATTR.to_string(), Value::from(self.fingerprint.as_str()));
        attributes.insert(LAST_PIXEL_ATTR.to_string(), Value::from(positions));
        attributes.insert(SOURCE_ATTR.to_string(), Value::from(source));

        let start = Instant::now();
        let written = self
            .store
            .write_attributes(&group, attributes)
            .and_then(|_| self.store.write_dataset(&group, LABELS, cache.labels.clone()))
            .and_then(|_| self.store.write_dataset(&group, MEAN_RESPONSE, cache.mean_response.clone()))
            .and_then(|_| self.store.write_completion(&group, Array1::ones(positions)));

        match written {
            Ok(()) => {
                self.log_progress(format!("wrote {} in {:?}", group, start.elapsed()));
                Ok(group)
            }
            Err(e) => {
                if let Err(discard) = self.store.discard_group(&group) {
                    debug!("could not discard {}: {}", group, discard);
                }
                Err(ClusterError::Persistence {
                    group: group.name,
                    source: e,
                })
            }
        }
    }
}
