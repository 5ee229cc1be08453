//! Where clustering results are kept.
//!
//! [`ResultStore`] is the port the runner persists through. Backends report
//! failures as [`anyhow::Error`]; the runner wraps them into its own errors.

#[cfg(test)]
mod tests;

mod memory;

pub use memory::{MemoryGroup, MemoryStore};

use crate::dataset::IndexMapping;
use crate::dtype::{DataArray, NdArray};
use crate::error::Result;
use crate::params::ParameterSnapshot;
use ndarray::Array1;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const LABELS: &str = "Labels";
pub const MEAN_RESPONSE: &str = "Mean_Response";
pub const COMPLETED_POSITIONS: &str = "completed_positions";
pub const FINGERPRINT_ATTR: &str = "fingerprint";
pub const LAST_PIXEL_ATTR: &str = "last_pixel";
pub const SOURCE_ATTR: &str = "source_dataset";

pub type Attributes = BTreeMap<String, Value>;

/// Reference to a results group inside a store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupHandle {
    pub name: String,
}

impl GroupHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Groups whose recorded parameters match a query, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Duplicates {
    pub complete: Vec<GroupHandle>,
    /// Matching groups without a full completion marker.
    pub partial: Vec<GroupHandle>,
}

impl Duplicates {
    pub fn latest_complete(&self) -> Option<&GroupHandle> {
        self.complete.last()
    }
}

/// A 2D dataset together with the mappings that give it N-dimensional shape.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredDataset {
    pub data: DataArray,
    pub position: IndexMapping,
    pub spectroscopic: IndexMapping,
    pub quantity: String,
    pub units: String,
}

impl StoredDataset {
    pub fn reshape_to_n_dims(&self) -> Result<NdArray> {
        self.data.reshape_to_n_dims(&self.position, &self.spectroscopic)
    }
}

pub trait ResultStore {
    /// Groups derived from `source` by `process_name` with the same parameters.
    fn check_for_duplicates(
        &self,
        source: &str,
        process_name: &str,
        snapshot: &ParameterSnapshot,
    ) -> anyhow::Result<Duplicates>;

    /// Creates the next free `<source leaf>-<process_name>_<NNN>` group.
    fn create_results_group(&mut self, source: &str, process_name: &str) -> anyhow::Result<GroupHandle>;

    fn write_attributes(&mut self, group: &GroupHandle, attributes: Attributes) -> anyhow::Result<()>;

    fn write_dataset(&mut self, group: &GroupHandle, name: &str, dataset: StoredDataset) -> anyhow::Result<()>;

    fn read_dataset(&self, group: &GroupHandle, name: &str) -> anyhow::Result<StoredDataset>;

    /// Records which positions hold finished results, one flag per position.
    fn write_completion(&mut self, group: &GroupHandle, marker: Array1<u8>) -> anyhow::Result<()>;

    fn discard_group(&mut self, group: &GroupHandle) -> anyhow::Result<()>;
}

impl<S: ResultStore + ?Sized> ResultStore for &mut S {
    fn check_for_duplicates(
        &self,
        source: &str,
        process_name: &str,
        snapshot: &ParameterSnapshot,
    ) -> anyhow::Result<Duplicates> {
        (**self).check_for_duplicates(source, process_name, snapshot)
    }

    fn create_results_group(&mut self, source: &str, process_name: &str) -> anyhow::Result<GroupHandle> {
        (**self).create_results_group(source, process_name)
    }

    fn write_attributes(&mut self, group: &GroupHandle, attributes: Attributes) -> anyhow::Result<()> {
        (**self).write_attributes(group, attributes)
    }

    fn write_dataset(&mut self, group: &GroupHandle, name: &str, dataset: StoredDataset) -> anyhow::Result<()> {
        (**self).write_dataset(group, name, dataset)
    }

    fn read_dataset(&self, group: &GroupHandle, name: &str) -> anyhow::Result<StoredDataset> {
        (**self).read_dataset(group, name)
    }

    fn write_completion(&mut self, group: &GroupHandle, marker: Array1<u8>) -> anyhow::Result<()> {
        (**self).write_completion(group, marker)
    }

    fn discard_group(&mut self, group: &GroupHandle) -> anyhow::Result<()> {
        (**self).discard_group(group)
    }
}

/// Last component of a slash separated dataset path.
pub(crate) fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
