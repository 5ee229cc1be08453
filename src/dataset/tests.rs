use crate::dataset::{reshape_to_n_dims, squeeze, Dataset, Dimension, IndexMapping};
use crate::dtype::DataArray;
use ndarray::{arr2, Array2, IxDyn};

#[test]
fn test_first_dimension_varies_fastest() {
    let mapping = IndexMapping::from_dimensions(&[
        Dimension::steps("X", "um", 3),
        Dimension::new("Y", "um", vec![0.5, 1.5]),
    ]);

    assert_eq!(mapping.len(), 6);
    assert_eq!(mapping.dim_sizes(), vec![3, 2]);
    assert_eq!(
        mapping.indices(),
        &arr2(&[[0, 0], [1, 0], [2, 0], [0, 1], [1, 1], [2, 1]])
    );
    assert_eq!(mapping.values()[[4, 1]], 1.5);
}

#[test]
fn test_reshape_places_every_entry_at_its_coordinates() {
    let position = IndexMapping::from_dimensions(&[Dimension::steps("X", "um", 2), Dimension::steps("Y", "um", 3)]);
    let spectroscopic = IndexMapping::from_dimensions(&[Dimension::steps("Bias", "V", 2)]);
    let data = Array2::from_shape_fn((6, 2), |(r, c)| (r * 10 + c) as f64);

    let nd = reshape_to_n_dims(data.view(), &position, &spectroscopic).unwrap();
    assert_eq!(nd.shape(), &[2, 3, 2]);

    for r in 0..6 {
        let x = position.indices()[[r, 0]] as usize;
        let y = position.indices()[[r, 1]] as usize;
        for c in 0..2 {
            assert_eq!(nd[IxDyn(&[x, y, c])], data[[r, c]]);
        }
    }
}

#[test]
fn test_reshape_rejects_incomplete_grid() {
    let names = vec!["X".to_string(), "Y".to_string()];
    let units = vec!["um".to_string(), "um".to_string()];
    // three entries cannot fill a 2 x 2 grid
    let indices = arr2(&[[0, 0], [1, 0], [1, 1]]);
    let values = indices.mapv(f64::from);
    let position = IndexMapping::new(names, units, indices, values).unwrap();
    let spectroscopic = IndexMapping::from_dimensions(&[Dimension::steps("Bias", "V", 1)]);

    let data = Array2::<f64>::zeros((3, 1));
    assert!(reshape_to_n_dims(data.view(), &position, &spectroscopic).is_err());
}

#[test]
fn test_reshape_rejects_repeated_coordinates() {
    let indices = arr2(&[[0], [0]]);
    let values = indices.mapv(f64::from);
    let position = IndexMapping::new(vec!["X".to_string()], vec!["um".to_string()], indices, values).unwrap();
    let spectroscopic = IndexMapping::from_dimensions(&[Dimension::steps("Bias", "V", 1)]);

    let data = Array2::<f64>::zeros((2, 1));
    assert!(reshape_to_n_dims(data.view(), &position, &spectroscopic).is_err());
}

#[test]
fn test_squeeze_drops_unit_axes() {
    let position = IndexMapping::from_dimensions(&[Dimension::steps("X", "um", 4), Dimension::steps("Y", "um", 1)]);
    let spectroscopic = IndexMapping::from_dimensions(&[Dimension::steps("Cluster", "ID", 1)]);
    let data = arr2(&[[1u32], [2], [3], [4]]);

    let nd = reshape_to_n_dims(data.view(), &position, &spectroscopic).unwrap();
    assert_eq!(nd.shape(), &[4, 1, 1]);
    let squeezed = squeeze(nd).unwrap();
    assert_eq!(squeezed.shape(), &[4]);
    assert_eq!(squeezed.as_slice().unwrap(), &[1, 2, 3, 4]);
}

#[test]
fn test_dataset_checks_mapping_lengths() {
    let position = IndexMapping::from_dimensions(&[Dimension::steps("X", "um", 3)]);
    let spectroscopic = IndexMapping::from_dimensions(&[Dimension::steps("Bias", "V", 2)]);
    let data = DataArray::Real(Array2::zeros((2, 2)));

    assert!(Dataset::new("/Measurement_000/Raw_Data", data, position, spectroscopic).is_err());
}

#[test]
fn test_leaf_name() {
    let position = IndexMapping::from_dimensions(&[Dimension::steps("X", "um", 1)]);
    let spectroscopic = IndexMapping::from_dimensions(&[Dimension::steps("Bias", "V", 1)]);
    let dataset = Dataset::new(
        "/Measurement_000/Channel_000/Raw_Data",
        DataArray::Real(Array2::zeros((1, 1))),
        position,
        spectroscopic,
    )
    .unwrap();
    assert_eq!(dataset.leaf_name(), "Raw_Data");
}

#[test]
fn test_selected_entries_form_a_dense_grid() {
    let mapping = IndexMapping::from_dimensions(&[
        Dimension::steps("Freq", "Hz", 4),
        Dimension::new("Bias", "V", vec![-1.0, 0.0, 1.0]),
    ]);

    // the last two bias steps at every other frequency
    let selected = mapping.select_entries(&[5, 7, 9, 11]);
    assert_eq!(selected.names(), mapping.names());
    assert_eq!(selected.dim_sizes(), vec![2, 2]);
    assert_eq!(selected.indices(), &arr2(&[[0, 0], [1, 0], [0, 1], [1, 1]]));
    assert_eq!(selected.values().column(1).to_vec(), vec![0.0, 0.0, 1.0, 1.0]);
}
