use crate::components::ComponentSelection;
use crate::dataset::{Dimension, IndexMapping};
use crate::dtype::DataArray;
use crate::estimator::KMeans;
use crate::params::ParameterSnapshot;
use crate::store::{
    Attributes, GroupHandle, MemoryStore, ResultStore, StoredDataset, FINGERPRINT_ATTR, LABELS,
};
use ndarray::{arr2, Array1};
use serde_json::Value;

const SOURCE: &str = "/Measurement_000/Channel_000/Raw_Data";

fn snapshot(n_clusters: usize) -> ParameterSnapshot {
    let components = ComponentSelection::All.resolve(4).unwrap();
    ParameterSnapshot::new(&KMeans::new(n_clusters).into(), &components).unwrap()
}

fn fingerprint_attrs(snapshot: &ParameterSnapshot) -> Attributes {
    let mut attributes = snapshot.to_attributes();
    attributes.insert(
        FINGERPRINT_ATTR.to_string(),
        Value::from(snapshot.fingerprint(SOURCE, "Cluster").as_str()),
    );
    attributes
}

fn labels() -> StoredDataset {
    StoredDataset {
        data: DataArray::Unsigned(arr2(&[[0], [1], [1]])),
        position: IndexMapping::from_dimensions(&[Dimension::steps("X", "um", 3)]),
        spectroscopic: IndexMapping::from_dimensions(&[Dimension::steps("Cluster", "ID", 1)]),
        quantity: "Cluster ID".to_string(),
        units: "a. u.".to_string(),
    }
}

#[test]
fn test_groups_are_numbered_per_source() {
    let mut store = MemoryStore::new();
    let first = store.create_results_group(SOURCE, "Cluster").unwrap();
    let second = store.create_results_group(SOURCE, "Cluster").unwrap();
    assert_eq!(first.name, "Raw_Data-Cluster_000");
    assert_eq!(second.name, "Raw_Data-Cluster_001");

    store.discard_group(&first).unwrap();
    assert_eq!(store.groups().collect::<Vec<_>>(), vec![second]);
    assert_eq!(
        store.create_results_group(SOURCE, "Cluster").unwrap().name,
        "Raw_Data-Cluster_000"
    );
}

#[test]
fn test_discarding_a_missing_group_fails() {
    let mut store = MemoryStore::new();
    let group = store.create_results_group(SOURCE, "Cluster").unwrap();
    store.discard_group(&group).unwrap();
    assert!(store.is_empty());
    assert!(store.discard_group(&group).is_err());
}

#[test]
fn test_duplicates_need_matching_fingerprint_and_completion() {
    let mut store = MemoryStore::new();
    let params = snapshot(3);

    let complete = store.create_results_group(SOURCE, "Cluster").unwrap();
    store.write_attributes(&complete, fingerprint_attrs(&params)).unwrap();
    store.write_completion(&complete, Array1::ones(3)).unwrap();

    let partial = store.create_results_group(SOURCE, "Cluster").unwrap();
    store.write_attributes(&partial, fingerprint_attrs(&params)).unwrap();
    store.write_completion(&partial, Array1::from(vec![1, 0, 1])).unwrap();

    let other = store.create_results_group(SOURCE, "Cluster").unwrap();
    store.write_attributes(&other, fingerprint_attrs(&snapshot(4))).unwrap();
    store.write_completion(&other, Array1::ones(3)).unwrap();

    let duplicates = store.check_for_duplicates(SOURCE, "Cluster", &params).unwrap();
    assert_eq!(duplicates.complete, vec![complete.clone()]);
    assert_eq!(duplicates.partial, vec![partial]);
    assert_eq!(duplicates.latest_complete(), Some(&complete));

    let elsewhere = store.check_for_duplicates("/Other/Raw_Data", "Cluster", &params).unwrap();
    assert!(elsewhere.complete.is_empty() && elsewhere.partial.is_empty());
}

#[test]
fn test_datasets_round_trip() {
    let mut store = MemoryStore::new();
    let group = store.create_results_group(SOURCE, "Cluster").unwrap();
    store.write_dataset(&group, LABELS, labels()).unwrap();

    assert_eq!(store.read_dataset(&group, LABELS).unwrap(), labels());
    assert!(store.read_dataset(&group, "Mean_Response").is_err());
    assert!(store.read_dataset(&GroupHandle::new("missing"), LABELS).is_err());
}

#[test]
fn test_write_budget_fails_writes() {
    let mut store = MemoryStore::new();
    store.set_write_budget(Some(2));
    let group = store.create_results_group(SOURCE, "Cluster").unwrap();
    store.write_dataset(&group, LABELS, labels()).unwrap();

    let err = store.write_completion(&group, Array1::ones(3)).unwrap_err();
    assert!(err.to_string().contains("budget"));
    assert!(store.group(&group).unwrap().completion.is_none());

    // discarding is always possible
    store.discard_group(&group).unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_mutable_reference_is_a_store() {
    fn create<S: ResultStore>(mut store: S) -> GroupHandle {
        store.create_results_group(SOURCE, "Cluster").unwrap()
    }

    let mut store = MemoryStore::new();
    let handle = create(&mut store);
    assert!(store.group(&handle).is_some());
    assert_eq!(store.len(), 1);
}
