pub mod components;
pub mod dataset;
pub mod distance_measure;
pub mod dtype;
pub mod error;
pub mod estimator;
pub mod linkage;
pub mod params;
mod reorder;
pub mod runner;
pub mod store;
#[cfg(test)]
mod test_utils;

pub use components::ComponentSelection;
pub use dataset::{Dataset, Dimension, IndexMapping};
pub use distance_measure::DistanceMeasure;
pub use dtype::{DataArray, DtypeFamily, NdArray, ScalarTransform};
pub use error::{ClusterError, Result};
pub use estimator::{Clustering, Estimator, EstimatorConfig};
pub use reorder::reorder_clusters;
pub use runner::{ClusterRunner, RunnerParameters};
pub use store::{MemoryStore, ResultStore};
