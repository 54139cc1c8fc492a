//! Dependency graph over package ids.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CaskError, CaskResult};
use crate::manifest::{PackageId, PackageManifest, PackageRef};

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// id -> resolved dependency ids, in declaration order
    nodes: BTreeMap<PackageId, Vec<PackageId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: PackageId) {
        self.nodes.entry(id).or_default();
    }

    pub fn add_dependency(&mut self, from: &PackageId, to: PackageId) {
        self.add_node(to.clone());
        let deps = self.nodes.entry(from.clone()).or_default();
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    /// Build the graph reachable from `root`, resolving each declared
    /// dependency with `resolve`. References that do not resolve are left out.
    pub fn build<'a, F>(root: &'a PackageManifest, resolve: F) -> Self
    where
        F: Fn(&PackageRef) -> Option<&'a PackageManifest>,
    {
        let mut graph = DependencyGraph::new();
        graph.add_node(root.id());

        let mut queue = vec![root];
        let mut seen = BTreeSet::from([root.id()]);
        while let Some(manifest) = queue.pop() {
            let from = manifest.id();
            for reference in &manifest.depends_on {
                let Some(dep) = resolve(reference) else {
                    continue;
                };
                let dep_id = dep.id();
                graph.add_dependency(&from, dep_id.clone());
                if seen.insert(dep_id) {
                    queue.push(dep);
                }
            }
        }
        graph
    }

    pub fn contains(&self, id: &PackageId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn dependencies(&self, id: &PackageId) -> &[PackageId] {
        self.nodes.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fail with the offending path if a cycle is reachable from `start`.
    pub fn detect_cycle(&self, start: &PackageId) -> CaskResult<()> {
        let mut visited = BTreeSet::new();
        let mut path = Vec::new();
        self.detect_cycle_dfs(start, &mut visited, &mut path)
    }

    fn detect_cycle_dfs(
        &self,
        node: &PackageId,
        visited: &mut BTreeSet<PackageId>,
        path: &mut Vec<PackageId>,
    ) -> CaskResult<()> {
        if let Some(pos) = path.iter().position(|p| p == node) {
            let cycle = path[pos..]
                .iter()
                .chain(std::iter::once(node))
                .map(|id| id.to_string())
                .collect();
            return Err(CaskError::DependencyCycle { cycle });
        }
        if !visited.insert(node.clone()) {
            return Ok(());
        }

        path.push(node.clone());
        for dep in self.dependencies(node) {
            self.detect_cycle_dfs(dep, visited, path)?;
        }
        path.pop();
        Ok(())
    }

    /// Ids reachable from `root` with every dependency before its
    /// dependents; `root` comes last. The graph must be acyclic.
    pub fn topological_order(&self, root: &PackageId) -> Vec<PackageId> {
        let mut order = Vec::new();
        let mut visited = BTreeSet::new();
        self.post_order(root, &mut visited, &mut order);
        order
    }

    fn post_order(
        &self,
        node: &PackageId,
        visited: &mut BTreeSet<PackageId>,
        order: &mut Vec<PackageId>,
    ) {
        if !visited.insert(node.clone()) {
            return;
        }
        for dep in self.dependencies(node) {
            self.post_order(dep, visited, order);
        }
        order.push(node.clone());
    }
}
