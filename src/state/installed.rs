use std::collections::BTreeMap;

use super::InstallationRecord;
use crate::manifest::{PackageId, PackageRef};

/// The installed packages, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InstalledSet {
    records: BTreeMap<PackageId, InstallationRecord>,
}

impl InstalledSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: InstallationRecord) {
        self.records.insert(record.id(), record);
    }

    pub fn remove(&mut self, id: &PackageId) -> Option<InstallationRecord> {
        self.records.remove(id)
    }

    pub fn get(&self, id: &PackageId) -> Option<&InstallationRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &PackageId) -> bool {
        self.records.contains_key(id)
    }

    /// Records satisfying `reference`, newest first.
    pub fn matching<'a, 'r>(
        &'a self,
        reference: &'r PackageRef,
    ) -> impl Iterator<Item = &'a InstallationRecord> + use<'a, 'r> {
        self.records
            .values()
            .rev()
            .filter(move |record| reference.matches(&record.id()))
    }

    pub fn satisfies(&self, reference: &PackageRef) -> bool {
        self.matching(reference).next().is_some()
    }

    /// Installed versions of `name`, newest first.
    pub fn family<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a InstallationRecord> + 'a {
        self.records
            .values()
            .rev()
            .filter(move |record| record.name == name)
    }

    /// Installed records that would lose a dependency if `id` went away.
    ///
    /// A dependency also satisfied by another installed record does not count.
    pub fn dependents_of(&self, id: &PackageId) -> Vec<&InstallationRecord> {
        self.records
            .values()
            .filter(|record| record.id() != *id)
            .filter(|record| {
                record.manifest.depends_on.iter().any(|dep| {
                    dep.matches(id)
                        && !self
                            .matching(dep)
                            .any(|other| other.id() != *id && other.id() != record.id())
                })
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstallationRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<InstallationRecord> for InstalledSet {
    fn from_iter<I: IntoIterator<Item = InstallationRecord>>(iter: I) -> Self {
        let mut set = InstalledSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}
