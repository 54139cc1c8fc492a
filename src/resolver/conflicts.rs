use std::collections::HashMap;

use crate::manifest::{PackageId, PackageManifest, PackageRef};

/// Declared conflicts, as an adjacency set over package ids.
///
/// Two packages are adjacent when either one declares the other, so a check
/// from one side gives the same answer as a check from the other.
#[derive(Debug, Default)]
pub struct ConflictIndex {
    declared: HashMap<PackageId, Vec<PackageRef>>,
}

impl ConflictIndex {
    pub fn build<'a>(manifests: impl IntoIterator<Item = &'a PackageManifest>) -> Self {
        let mut index = ConflictIndex::default();
        for manifest in manifests {
            if manifest.conflicts_with.is_empty() {
                continue;
            }
            let refs = index.declared.entry(manifest.id()).or_default();
            for reference in &manifest.conflicts_with {
                if !refs.contains(reference) {
                    refs.push(reference.clone());
                }
            }
        }
        index
    }

    fn declares(&self, from: &PackageId, other: &PackageId) -> bool {
        self.declared
            .get(from)
            .is_some_and(|refs| refs.iter().any(|r| r.matches(other)))
    }

    /// True when `a` and `b` may not be installed together.
    pub fn adjacent(&self, a: &PackageId, b: &PackageId) -> bool {
        a != b && (self.declares(a, b) || self.declares(b, a))
    }
}
