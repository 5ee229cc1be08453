use ndarray::{Array1, Array2};
use proptest::prelude::*;
use std::collections::HashMap;
use usid_cluster::components::ComponentSelection;
use usid_cluster::runner::{compact_labels, mean_response};
use usid_cluster::{reorder_clusters, DataArray, ScalarTransform};

fn same_partition(a: &[u32], b: &[u32]) -> bool {
    let mut forward = HashMap::new();
    let mut backward = HashMap::new();
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(&x, &y)| {
            *forward.entry(x).or_insert(y) == y && *backward.entry(y).or_insert(x) == x
        })
}

fn centroids_and_labels() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<u32>)> {
    (1usize..7, 1usize..4).prop_flat_map(|(k, width)| {
        (
            prop::collection::vec(prop::collection::vec(-100.0f64..100.0, width), k),
            prop::collection::vec(0..k as u32, 1..40),
        )
    })
}

fn to_array(rows: &[Vec<f64>]) -> Array2<f64> {
    let width = rows[0].len();
    Array2::from_shape_fn((rows.len(), width), |(i, j)| rows[i][j])
}

proptest! {
    #[test]
    fn prop_reorder_is_deterministic((centroids, labels) in centroids_and_labels()) {
        let mean = DataArray::Real(to_array(&centroids));
        let transform = ScalarTransform::check_dtype(&mean);
        let labels = Array1::from(labels);

        let first = reorder_clusters(labels.view(), &mean, &transform).unwrap();
        let second = reorder_clusters(labels.view(), &mean, &transform).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_reorder_preserves_partition((centroids, labels) in centroids_and_labels()) {
        let mean = DataArray::Real(to_array(&centroids));
        let transform = ScalarTransform::check_dtype(&mean);
        let labels = Array1::from(labels);

        let (new_labels, new_mean) = reorder_clusters(labels.view(), &mean, &transform).unwrap();
        prop_assert!(same_partition(labels.as_slice().unwrap(), new_labels.as_slice().unwrap()));
        prop_assert_eq!(new_mean.shape(), mean.shape());

        let (old_rows, new_rows) = match (&mean, &new_mean) {
            (DataArray::Real(old), DataArray::Real(new)) => (old.clone(), new.clone()),
            _ => unreachable!(),
        };
        for (&old, &new) in labels.iter().zip(new_labels.iter()) {
            prop_assert_eq!(old_rows.row(old as usize), new_rows.row(new as usize));
        }
    }

    #[test]
    fn prop_mean_rows_follow_compacted_labels(
        raw in prop::collection::vec(0usize..50, 1..60),
        width in 1usize..4
    ) {
        let (labels, k) = compact_labels(&raw);
        prop_assert!(labels.iter().all(|&l| (l as usize) < k));

        let data = Array2::from_shape_fn((raw.len(), width), |(r, c)| (raw[r] * 10 + c) as f64);
        let means = mean_response(data.view(), labels.view(), k).unwrap();
        prop_assert_eq!(means.dim(), (k, width));

        // rows sharing a raw label are identical, so their mean is that row
        for (r, &label) in labels.iter().enumerate() {
            prop_assert_eq!(means.row(label as usize), data.row(r));
        }
    }

    #[test]
    fn prop_selection_is_never_clipped(total in 1usize..30, extra in 1usize..10) {
        prop_assert!(ComponentSelection::Count(total + extra).resolve(total).is_err());
        let resolved = ComponentSelection::Count(total).resolve(total).unwrap();
        prop_assert_eq!(resolved.num_comps(), total);
    }
}
