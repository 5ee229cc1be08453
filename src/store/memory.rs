use crate::params::ParameterSnapshot;
use crate::store::{
    leaf_name, Attributes, Duplicates, GroupHandle, ResultStore, StoredDataset, COMPLETED_POSITIONS,
    FINGERPRINT_ATTR,
};
use anyhow::{anyhow, bail, Context};
use log::debug;
use ndarray::Array1;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryGroup {
    pub source: String,
    pub process_name: String,
    pub attributes: Attributes,
    pub datasets: BTreeMap<String, StoredDataset>,
    pub completion: Option<Array1<u8>>,
    created: usize,
}

impl MemoryGroup {
    pub fn is_complete(&self) -> bool {
        self.completion
            .as_ref()
            .map_or(false, |marker| !marker.is_empty() && marker.iter().all(|&flag| flag == 1))
    }
}

/// Keeps results groups in memory.
///
/// A write budget makes the store fail once a number of writes has been spent,
/// which lets callers exercise their failure paths.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    groups: BTreeMap<String, MemoryGroup>,
    write_budget: Option<usize>,
    created: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows `budget` more writes, or any number with `None`.
    pub fn set_write_budget(&mut self, budget: Option<usize>) {
        self.write_budget = budget;
    }

    pub fn groups(&self) -> impl Iterator<Item = GroupHandle> + '_ {
        let mut groups: Vec<_> = self.groups.iter().collect();
        groups.sort_by_key(|(_, group)| group.created);
        groups.into_iter().map(|(name, _)| GroupHandle::new(name.as_str()))
    }

    pub fn group(&self, handle: &GroupHandle) -> Option<&MemoryGroup> {
        self.groups.get(&handle.name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn spend_write(&mut self) -> anyhow::Result<()> {
        match self.write_budget.as_mut() {
            Some(0) => bail!("write budget exhausted"),
            Some(budget) => {
                *budget -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn group_mut(&mut self, handle: &GroupHandle) -> anyhow::Result<&mut MemoryGroup> {
        self.groups
            .get_mut(&handle.name)
            .ok_or_else(|| anyhow!("no results group named {}", handle))
    }
}

impl ResultStore for MemoryStore {
    fn check_for_duplicates(
        &self,
        source: &str,
        process_name: &str,
        snapshot: &ParameterSnapshot,
    ) -> anyhow::Result<Duplicates> {
        let fingerprint = Value::from(snapshot.fingerprint(source, process_name).as_str());

        let mut matching: Vec<(&String, &MemoryGroup)> = self
            .groups
            .iter()
            .filter(|(_, group)| {
                group.source == source
                    && group.process_name == process_name
                    && group.attributes.get(FINGERPRINT_ATTR) == Some(&fingerprint)
            })
            .collect();
        matching.sort_by_key(|(_, group)| group.created);

        let mut duplicates = Duplicates::default();
        for (name, group) in matching {
            let handle = GroupHandle::new(name.as_str());
            if group.is_complete() {
                duplicates.complete.push(handle);
            } else {
                duplicates.partial.push(handle);
            }
        }
        Ok(duplicates)
    }

    fn create_results_group(&mut self, source: &str, process_name: &str) -> anyhow::Result<GroupHandle> {
        self.spend_write()?;
        let prefix = format!("{}-{}_", leaf_name(source), process_name);
        let name = (0..)
            .map(|index| format!("{}{:03}", prefix, index))
            .find(|name| !self.groups.contains_key(name))
            .ok_or_else(|| anyhow!("no free group index for {}", prefix))?;

        self.created += 1;
        self.groups.insert(
            name.clone(),
            MemoryGroup {
                source: source.to_string(),
                process_name: process_name.to_string(),
                created: self.created,
                ..Default::default()
            },
        );
        debug!("created results group {}", name);
        Ok(GroupHandle::new(name))
    }

    fn write_attributes(&mut self, group: &GroupHandle, attributes: Attributes) -> anyhow::Result<()> {
        self.spend_write()?;
        self.group_mut(group)?.attributes.extend(attributes);
        Ok(())
    }

    fn write_dataset(&mut self, group: &GroupHandle, name: &str, dataset: StoredDataset) -> anyhow::Result<()> {
        self.spend_write()?;
        self.group_mut(group)?.datasets.insert(name.to_string(), dataset);
        Ok(())
    }

    fn read_dataset(&self, group: &GroupHandle, name: &str) -> anyhow::Result<StoredDataset> {
        self.groups
            .get(&group.name)
            .with_context(|| format!("no results group named {}", group))?
            .datasets
            .get(name)
            .cloned()
            .with_context(|| format!("{} has no dataset {}", group, name))
    }

    fn write_completion(&mut self, group: &GroupHandle, marker: Array1<u8>) -> anyhow::Result<()> {
        self.spend_write()?;
        debug!("{} of {} set for {} positions", COMPLETED_POSITIONS, group, marker.len());
        self.group_mut(group)?.completion = Some(marker);
        Ok(())
    }

    fn discard_group(&mut self, group: &GroupHandle) -> anyhow::Result<()> {
        self.groups
            .remove(&group.name)
            .ok_or_else(|| anyhow!("no results group named {}", group))?;
        debug!("discarded results group {}", group);
        Ok(())
    }
}
