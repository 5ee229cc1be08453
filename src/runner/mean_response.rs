use crate::error::{ClusterError, Result};
use ndarray::{stack, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Maps raw estimator labels onto `0..K`, keeping the order of the raw labels.
pub fn compact_labels(raw: &[usize]) -> (Array1<u32>, usize) {
    let distinct: BTreeMap<usize, u32> = raw
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(new, old)| (old, new as u32))
        .collect();
    (raw.iter().map(|l| distinct[l]).collect(), distinct.len())
}

/// Mean of the member rows of every cluster, one output row per cluster.
///
/// Clusters are averaged in parallel on the current rayon pool. Labels must lie
/// in `0..num_clusters` and every cluster needs at least one member.
pub fn mean_response(real: ArrayView2<f64>, labels: ArrayView1<u32>, num_clusters: usize) -> Result<Array2<f64>> {
    if labels.len() != real.nrows() {
        return Err(ClusterError::InvalidLabels {
            message: format!("{} labels given for {} rows", labels.len(), real.nrows()),
        });
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); num_clusters];
    for (row, &label) in labels.iter().enumerate() {
        members
            .get_mut(label as usize)
            .ok_or_else(|| ClusterError::InvalidLabels {
                message: format!("label {} exceeds the {} clusters", label, num_clusters),
            })?
            .push(row);
    }

    let means: Vec<Array1<f64>> = members
        .par_iter()
        .enumerate()
        .map(|(cluster, rows)| {
            real.select(Axis(0), rows)
                .mean_axis(Axis(0))
                .ok_or_else(|| ClusterError::InvalidLabels {
                    message: format!("cluster {} has no members", cluster),
                })
        })
        .collect::<Result<_>>()?;

    let views: Vec<_> = means.iter().map(|m| m.view()).collect();
    stack(Axis(0), &views).map_err(|e| ClusterError::reshape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_compact_labels_keeps_order() {
        let (labels, k) = compact_labels(&[7, 3, 3, 9, 7]);
        assert_eq!(k, 3);
        assert_eq!(labels, arr1(&[1, 0, 0, 2, 1]));
    }

    #[test]
    fn test_mean_per_cluster() {
        let real = arr2(&[[1.0, 10.0], [3.0, 30.0], [5.0, 0.0], [0.0, 0.0]]);
        let labels = arr1(&[1, 1, 0, 2]);
        let means = mean_response(real.view(), labels.view(), 3).unwrap();
        assert_eq!(means, arr2(&[[5.0, 0.0], [2.0, 20.0], [0.0, 0.0]]));
    }

    #[test]
    fn test_empty_cluster_fails() {
        let real = arr2(&[[1.0], [2.0]]);
        let labels = arr1(&[0, 2]);
        assert!(mean_response(real.view(), labels.view(), 3).is_err());
        assert!(mean_response(real.view(), labels.view(), 2).is_err());
    }

    #[test]
    fn test_same_means_on_any_pool() {
        let real = Array2::from_shape_fn((60, 4), |(i, j)| (i * 7 + j) as f64 % 13.0);
        let labels = Array1::from_shape_fn(60, |i| (i % 5) as u32);
        let single = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let many = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        assert_eq!(
            single.install(|| mean_response(real.view(), labels.view(), 5)).unwrap(),
            many.install(|| mean_response(real.view(), labels.view(), 5)).unwrap()
        );
    }
}
