use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Which spectroscopic columns take part in clustering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSelection {
    All,
    /// The first `n` columns.
    Count(usize),
    Range {
        start: usize,
        stop: usize,
        step: usize,
    },
    Indices(Vec<usize>),
}

impl Default for ComponentSelection {
    fn default() -> Self {
        Self::All
    }
}

impl From<usize> for ComponentSelection {
    fn from(count: usize) -> Self {
        Self::Count(count)
    }
}

impl From<Vec<usize>> for ComponentSelection {
    fn from(indices: Vec<usize>) -> Self {
        Self::Indices(indices)
    }
}

/// How the resolved selection is recorded alongside the results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpectralComponents {
    All,
    Count(usize),
    Indices(Vec<usize>),
}

impl SpectralComponents {
    pub fn to_value(&self) -> Value {
        match self {
            Self::All => Value::from("all"),
            Self::Count(n) => Value::from(*n),
            Self::Indices(indices) => Value::from(indices.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedComponents {
    indices: Vec<usize>,
    total: usize,
}

impl ResolvedComponents {
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn num_comps(&self) -> usize {
        self.indices.len()
    }

    /// True when every column is used, in its original order.
    pub fn covers_all(&self) -> bool {
        self.indices.len() == self.total && self.is_prefix()
    }

    fn is_prefix(&self) -> bool {
        self.indices.iter().enumerate().all(|(i, &c)| i == c)
    }

    pub fn attr(&self) -> SpectralComponents {
        if self.covers_all() {
            SpectralComponents::All
        } else if self.is_prefix() {
            SpectralComponents::Count(self.indices.len())
        } else {
            SpectralComponents::Indices(self.indices.clone())
        }
    }
}

impl ComponentSelection {
    pub fn resolve(&self, total: usize) -> Result<ResolvedComponents> {
        if total == 0 {
            return Err(ClusterError::selection("dataset has no spectroscopic columns"));
        }

        let indices: Vec<usize> = match self {
            Self::All => (0..total).collect(),
            Self::Count(n) => {
                if *n == 0 || *n > total {
                    return Err(ClusterError::selection(format!(
                        "requested {} components but the dataset has {}",
                        n, total
                    )));
                }
                (0..*n).collect()
            }
            Self::Range { start, stop, step } => {
                if *step == 0 {
                    return Err(ClusterError::selection("range step must be at least 1"));
                }
                if start >= stop || *stop > total {
                    return Err(ClusterError::selection(format!(
                        "range {}..{} is empty or exceeds the {} available components",
                        start, stop, total
                    )));
                }
                (*start..*stop).step_by(*step).collect()
            }
            Self::Indices(indices) => {
                if indices.is_empty() {
                    return Err(ClusterError::selection("no components listed"));
                }
                if let Some(bad) = indices.iter().find(|&&i| i >= total) {
                    return Err(ClusterError::selection(format!(
                        "component {} is out of range for {} components",
                        bad, total
                    )));
                }
                let unique: HashSet<&usize> = indices.iter().collect();
                if unique.len() != indices.len() {
                    return Err(ClusterError::selection("components are listed more than once"));
                }
                indices.clone()
            }
        };

        Ok(ResolvedComponents { indices, total })
    }
}
