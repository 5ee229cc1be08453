use crate::distance_measure::{pdist, Euclidean};
use crate::dtype::{DataArray, ScalarTransform};
use crate::error::{ClusterError, Result};
use crate::linkage::{linkage, LinkageMethod};
use log::debug;
use ndarray::{Array1, ArrayView1};

/// Renumbers clusters so that similar mean responses get neighbouring labels.
///
/// The centroids are joined by weighted (WPGMA) linkage over their euclidean
/// distances in real scalar space. Walking the merges in order, every original
/// cluster is appended to the new order the first time it is merged. Rows that
/// carried label `order[r]` are labelled `r` afterwards, and centroid row `r`
/// is the former row `order[r]`.
pub fn reorder_clusters(
    labels: ArrayView1<u32>,
    mean_response: &DataArray,
    transform: &ScalarTransform,
) -> Result<(Array1<u32>, DataArray)> {
    let num_clusters = mean_response.nrows();
    if let Some(&label) = labels.iter().find(|&&l| l as usize >= num_clusters) {
        return Err(ClusterError::InvalidLabels {
            message: format!("label {} found but only {} clusters exist", label, num_clusters),
        });
    }
    if num_clusters <= 1 {
        return Ok((labels.to_owned(), mean_response.clone()));
    }

    let real = transform.to_real(mean_response)?;
    let condensed = pdist::<Euclidean>(real.view());
    let z = linkage(&condensed, num_clusters, LinkageMethod::Weighted)?;

    let order: Vec<usize> = z
        .outer_iter()
        .flat_map(|row| vec![row[0] as usize, row[1] as usize])
        .filter(|&id| id < num_clusters)
        .collect();
    debug!("reordered {} clusters as {:?}", num_clusters, order);

    let mut relabel = vec![0u32; num_clusters];
    for (new, &old) in order.iter().enumerate() {
        relabel[old] = new as u32;
    }

    Ok((
        labels.mapv(|l| relabel[l as usize]),
        mean_response.select_rows(&order),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::same_partition;
    use ndarray::{arr1, arr2};
    use num_complex::Complex64;

    fn real(rows: &[[f64; 1]]) -> (DataArray, ScalarTransform) {
        let data = DataArray::Real(arr2(rows));
        let transform = ScalarTransform::check_dtype(&data);
        (data, transform)
    }

    fn as_usize(labels: &Array1<u32>) -> Vec<usize> {
        labels.iter().map(|&l| l as usize).collect()
    }

    #[test]
    fn test_reorder_groups_nearby_centroids() {
        let (mean, transform) = real(&[[0.0], [10.0], [1.0], [11.0]]);
        let labels = arr1(&[0, 1, 2, 3, 2, 0]);

        let (new_labels, new_mean) = reorder_clusters(labels.view(), &mean, &transform).unwrap();
        assert_eq!(new_labels, arr1(&[0, 2, 1, 3, 1, 0]));
        assert_eq!(new_mean, DataArray::Real(arr2(&[[0.0], [1.0], [10.0], [11.0]])));
    }

    #[test]
    fn test_reorder_preserves_partition_and_rows() {
        let (mean, transform) = real(&[[7.0], [-3.0], [2.5], [40.0], [2.0]]);
        let labels = arr1(&[4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 4]);

        let (new_labels, new_mean) = reorder_clusters(labels.view(), &mean, &transform).unwrap();
        assert!(same_partition(&as_usize(&labels), &as_usize(&new_labels)));

        // every row keeps its centroid
        let (old_rows, new_rows) = match (&mean, &new_mean) {
            (DataArray::Real(old), DataArray::Real(new)) => (old, new),
            _ => panic!("reordering changed the dtype family"),
        };
        for (&old, &new) in labels.iter().zip(new_labels.iter()) {
            assert_eq!(old_rows.row(old as usize), new_rows.row(new as usize));
        }
    }

    #[test]
    fn test_reorder_is_deterministic() {
        let (mean, transform) = real(&[[3.0], [3.0], [0.0], [6.0]]);
        let labels = arr1(&[0, 1, 2, 3]);
        let first = reorder_clusters(labels.view(), &mean, &transform).unwrap();
        let second = reorder_clusters(labels.view(), &mean, &transform).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reorder_complex_centroids() {
        let mean = DataArray::Complex(arr2(&[
            [Complex64::new(0.0, 9.0)],
            [Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 1.0)],
        ]));
        let transform = ScalarTransform::check_dtype(&mean);
        let labels = arr1(&[0, 1, 2]);

        let (new_labels, new_mean) = reorder_clusters(labels.view(), &mean, &transform).unwrap();
        assert_eq!(new_labels, arr1(&[2, 0, 1]));
        assert_eq!(new_mean.family(), mean.family());
        assert_eq!(new_mean, mean.select_rows(&[1, 2, 0]));
    }

    #[test]
    fn test_single_cluster_is_unchanged() {
        let (mean, transform) = real(&[[5.0]]);
        let labels = arr1(&[0, 0, 0]);
        let (new_labels, new_mean) = reorder_clusters(labels.view(), &mean, &transform).unwrap();
        assert_eq!(new_labels, labels);
        assert_eq!(new_mean, mean);
    }

    #[test]
    fn test_labels_out_of_range_fail() {
        let (mean, transform) = real(&[[0.0], [1.0]]);
        let labels = arr1(&[0, 2]);
        assert!(matches!(
            reorder_clusters(labels.view(), &mean, &transform),
            Err(ClusterError::InvalidLabels { .. })
        ));
    }
}
