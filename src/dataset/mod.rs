#[cfg(test)]
mod tests;

use crate::dtype::DataArray;
use crate::error::{ClusterError, Result};
use ndarray::{Array2, ArrayD, ArrayView2, Axis, IxDyn};
use num_traits::Zero;

/// A named axis of a position or spectroscopic grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub units: String,
    pub values: Vec<f64>,
}

impl Dimension {
    pub fn new(name: &str, units: &str, values: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            units: units.to_string(),
            values,
        }
    }

    /// A dimension with values `0, 1, ..., steps - 1`.
    pub fn steps(name: &str, units: &str, steps: usize) -> Self {
        Self::new(name, units, (0..steps).map(|x| x as f64).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Maps each flattened entry (a row for positions, a column for spectroscopic
/// values) onto its N-dimensional coordinates.
///
/// Both `indices` and `values` are laid out as entries x dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexMapping {
    names: Vec<String>,
    units: Vec<String>,
    indices: Array2<u32>,
    values: Array2<f64>,
}

impl IndexMapping {
    pub fn new(names: Vec<String>, units: Vec<String>, indices: Array2<u32>, values: Array2<f64>) -> Result<Self> {
        let dims = indices.ncols();
        if names.len() != dims || units.len() != dims || values.dim() != indices.dim() {
            return Err(ClusterError::reshape(format!(
                "index mapping with {} dimensions has {} names, {} units and values of shape {:?}",
                dims,
                names.len(),
                units.len(),
                values.dim()
            )));
        }
        Ok(Self {
            names,
            units,
            indices,
            values,
        })
    }

    /// Builds the full grid spanned by `dimensions`, first dimension varying fastest.
    pub fn from_dimensions(dimensions: &[Dimension]) -> Self {
        let entries: usize = dimensions.iter().map(Dimension::len).product();
        let mut indices = Array2::zeros((entries, dimensions.len()));
        let mut values = Array2::zeros((entries, dimensions.len()));

        for entry in 0..entries {
            let mut rest = entry;
            for (d, dim) in dimensions.iter().enumerate() {
                let index = rest % dim.len();
                rest /= dim.len();
                indices[[entry, d]] = index as u32;
                values[[entry, d]] = dim.values[index];
            }
        }

        Self {
            names: dimensions.iter().map(|d| d.name.clone()).collect(),
            units: dimensions.iter().map(|d| d.units.clone()).collect(),
            indices,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keeps the entries at `rows`, in that order, with the same dimensions.
    ///
    /// Indices are renumbered densely per dimension, so a selection that forms
    /// a smaller grid reshapes onto that grid.
    pub fn select_entries(&self, rows: &[usize]) -> Self {
        let mut indices = self.indices.select(Axis(0), rows);
        for mut col in indices.columns_mut() {
            let mut used: Vec<u32> = col.to_vec();
            used.sort_unstable();
            used.dedup();
            col.mapv_inplace(|i| used.binary_search(&i).unwrap_or(0) as u32);
        }

        Self {
            names: self.names.clone(),
            units: self.units.clone(),
            indices,
            values: self.values.select(Axis(0), rows),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn indices(&self) -> &Array2<u32> {
        &self.indices
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Size of every dimension, taken as the largest index plus one.
    pub fn dim_sizes(&self) -> Vec<usize> {
        self.indices
            .columns()
            .into_iter()
            .map(|col| col.iter().max().map(|&m| m as usize + 1).unwrap_or(0))
            .collect()
    }
}

/// A main dataset: positions x spectroscopic values plus the mappings of both axes.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    name: String,
    data: DataArray,
    position: IndexMapping,
    spectroscopic: IndexMapping,
    quantity: String,
    units: String,
}

impl Dataset {
    pub fn new(name: &str, data: DataArray, position: IndexMapping, spectroscopic: IndexMapping) -> Result<Self> {
        let (rows, cols) = data.shape();
        if position.len() != rows {
            return Err(ClusterError::reshape(format!(
                "{} has {} positions but {} position index entries",
                name,
                rows,
                position.len()
            )));
        }
        if spectroscopic.len() != cols {
            return Err(ClusterError::reshape(format!(
                "{} has {} spectroscopic values but {} spectroscopic index entries",
                name,
                cols,
                spectroscopic.len()
            )));
        }

        Ok(Self {
            name: name.to_string(),
            data,
            position,
            spectroscopic,
            quantity: "quantity".to_string(),
            units: "a. u.".to_string(),
        })
    }

    pub fn with_quantity(mut self, quantity: &str, units: &str) -> Self {
        self.quantity = quantity.to_string();
        self.units = units.to_string();
        self
    }

    /// Full path of the dataset, which doubles as its identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last path component of the dataset name.
    pub fn leaf_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn data(&self) -> &DataArray {
        &self.data
    }

    pub fn position(&self) -> &IndexMapping {
        &self.position
    }

    pub fn spectroscopic(&self) -> &IndexMapping {
        &self.spectroscopic
    }

    pub fn quantity(&self) -> &str {
        &self.quantity
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn num_positions(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.data.ncols()
    }
}

fn grid_offsets(mapping: &IndexMapping, axis: &str) -> Result<(Vec<usize>, Vec<usize>)> {
    let sizes = mapping.dim_sizes();
    let cells: usize = sizes.iter().product();
    if cells != mapping.len() {
        return Err(ClusterError::reshape(format!(
            "{} indices of sizes {:?} span {} cells but there are {} entries",
            axis,
            sizes,
            cells,
            mapping.len()
        )));
    }

    // row-major strides over the declared dimension order
    let mut strides = vec![1; sizes.len()];
    for d in (0..sizes.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * sizes[d + 1];
    }

    let mut seen = vec![false; cells];
    let mut offsets = Vec::with_capacity(mapping.len());
    for entry in mapping.indices().rows() {
        let offset: usize = entry
            .iter()
            .zip(strides.iter())
            .map(|(&i, &s)| i as usize * s)
            .sum();
        if seen[offset] {
            return Err(ClusterError::reshape(format!(
                "{} coordinates {:?} occur more than once",
                axis,
                entry.to_vec()
            )));
        }
        seen[offset] = true;
        offsets.push(offset);
    }

    Ok((sizes, offsets))
}

/// Reshapes a positions x spectroscopic array into
/// `[position dims..., spectroscopic dims...]`, in the declared dimension order.
pub fn reshape_to_n_dims<T: Clone + Zero>(
    data: ArrayView2<T>,
    position: &IndexMapping,
    spectroscopic: &IndexMapping,
) -> Result<ArrayD<T>> {
    let (rows, cols) = data.dim();
    if rows != position.len() || cols != spectroscopic.len() {
        return Err(ClusterError::reshape(format!(
            "data of shape ({}, {}) does not match {} position and {} spectroscopic entries",
            rows,
            cols,
            position.len(),
            spectroscopic.len()
        )));
    }

    let (pos_sizes, pos_offsets) = grid_offsets(position, "position")?;
    let (spec_sizes, spec_offsets) = grid_offsets(spectroscopic, "spectroscopic")?;

    let mut flat = vec![T::zero(); rows * cols];
    for ((r, c), value) in data.indexed_iter() {
        flat[pos_offsets[r] * cols + spec_offsets[c]] = value.clone();
    }

    let shape: Vec<usize> = pos_sizes.into_iter().chain(spec_sizes).collect();
    ArrayD::from_shape_vec(IxDyn(&shape), flat).map_err(|e| ClusterError::reshape(e.to_string()))
}

/// Drops every axis of length one.
pub fn squeeze<T>(array: ArrayD<T>) -> Result<ArrayD<T>> {
    let shape: Vec<usize> = array.shape().iter().copied().filter(|&n| n != 1).collect();
    array
        .into_shape(IxDyn(&shape))
        .map_err(|e| ClusterError::reshape(e.to_string()))
}
