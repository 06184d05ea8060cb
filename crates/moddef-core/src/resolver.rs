//! Dependency resolver: deterministic package load order.
//!
//! Packages are sorted topologically so every package loads after its
//! dependencies. Among packages that are ready at the same time, the lower
//! `priority` loads first, then the lexicographically smaller id.
//!
//! A cycle anywhere in the graph is fatal. A package whose dependency is
//! missing, or was itself rejected, is rejected with
//! [`PackageError::UnresolvedDependency`]; its dependents follow it.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use tracing::{debug, warn};

use crate::error::{LoadError, PackageError};
use crate::manifest::PackageManifest;

/// The outcome of ordering a package set.
#[derive(Debug, Default)]
pub struct LoadPlan {
    /// Accepted package ids, in load order.
    pub order: Vec<String>,
    /// Rejected packages, in the order they were reached.
    pub rejected: Vec<PackageError>,
}

/// Order a set of manifests.
///
/// Ids are expected to be unique; when two manifests share one, the first
/// is used.
pub fn resolve<'a>(
    manifests: impl IntoIterator<Item = &'a PackageManifest>,
) -> Result<LoadPlan, LoadError> {
    let mut by_id: BTreeMap<&str, &PackageManifest> = BTreeMap::new();
    for manifest in manifests {
        by_id.entry(manifest.id.as_str()).or_insert(manifest);
    }
    let graph = Graph::new(&by_id);

    if let Some(cycle) = graph.find_cycle() {
        warn!(cycle = %cycle.join(" -> "), "Dependency cycle");
        return Err(LoadError::CyclicDependency { packages: cycle });
    }

    let mut plan = LoadPlan::default();
    let mut rejected = vec![false; graph.len()];

    for node in graph.topological_order() {
        let manifest = graph.nodes[node];
        let missing = manifest.dependencies.iter().find(|dep| {
            match graph.index_of(dep) {
                Some(dep_node) => rejected[dep_node],
                None => true,
            }
        });
        match missing {
            Some(dependency) => {
                rejected[node] = true;
                warn!(package = %manifest.id, %dependency, "Unresolved dependency");
                plan.rejected.push(PackageError::UnresolvedDependency {
                    package: manifest.id.clone(),
                    dependency: dependency.clone(),
                });
            }
            None => plan.order.push(manifest.id.clone()),
        }
    }

    debug!(order = ?plan.order, rejected = plan.rejected.len(), "Resolved load order");
    Ok(plan)
}

/// Index-based view of the dependency graph. Nodes are sorted by id.
struct Graph<'a> {
    nodes: Vec<&'a PackageManifest>,
    /// `deps[n]`: nodes that `n` depends on, in declared order, present only.
    deps: Vec<Vec<usize>>,
    /// `dependents[n]`: nodes that depend on `n`.
    dependents: Vec<BTreeSet<usize>>,
}

impl<'a> Graph<'a> {
    fn new(by_id: &BTreeMap<&str, &'a PackageManifest>) -> Self {
        let nodes: Vec<&PackageManifest> = by_id.values().copied().collect();
        let index: BTreeMap<&str, usize> = by_id.keys().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut deps = vec![Vec::new(); nodes.len()];
        let mut dependents = vec![BTreeSet::new(); nodes.len()];
        for (n, manifest) in nodes.iter().enumerate() {
            for dep in &manifest.dependencies {
                if let Some(&d) = index.get(dep.as_str())
                    && !deps[n].contains(&d)
                {
                    deps[n].push(d);
                    dependents[d].insert(n);
                }
            }
        }

        Self {
            nodes,
            deps,
            dependents,
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes
            .binary_search_by(|m| m.id.as_str().cmp(id))
            .ok()
    }

    /// Depth-first search for a back edge. Returns the cycle as a path that
    /// starts and ends at the same package.
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut path: Vec<usize> = Vec::new();

        for start in 0..self.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // Explicit stack of (node, next dependency to look at).
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::Visiting;
            path.push(start);

            while let Some((node, next)) = stack.last_mut() {
                let node = *node;
                match self.deps[node].get(*next) {
                    Some(&dep) => {
                        *next += 1;
                        match marks[dep] {
                            Mark::Done => {}
                            Mark::Visiting => {
                                let from = path.iter().position(|&n| n == dep).unwrap_or(0);
                                let mut cycle: Vec<String> = path[from..]
                                    .iter()
                                    .map(|&n| self.nodes[n].id.clone())
                                    .collect();
                                cycle.push(self.nodes[dep].id.clone());
                                return Some(cycle);
                            }
                            Mark::Unvisited => {
                                marks[dep] = Mark::Visiting;
                                path.push(dep);
                                stack.push((dep, 0));
                            }
                        }
                    }
                    None => {
                        marks[node] = Mark::Done;
                        path.pop();
                        stack.pop();
                    }
                }
            }
        }

        None
    }

    /// Kahn's algorithm with a (priority, id) ready queue. Assumes no cycles.
    fn topological_order(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self.deps.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<(i32, &str, usize)>> = BinaryHeap::new();
        for (n, &degree) in in_degree.iter().enumerate() {
            if degree == 0 {
                ready.push(Reverse(self.key(n)));
            }
        }

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse((_, _, node))) = ready.pop() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(self.key(dependent)));
                }
            }
        }
        order
    }

    fn key(&self, node: usize) -> (i32, &str, usize) {
        let manifest = self.nodes[node];
        (manifest.priority, manifest.id.as_str(), node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn order(manifests: &[PackageManifest]) -> Vec<String> {
        resolve(manifests).unwrap().order
    }

    #[test]
    fn test_dependencies_load_first() {
        let manifests = vec![
            PackageManifest::new("expansion").with_dependency("base"),
            PackageManifest::new("base"),
            PackageManifest::new("music").with_dependency("expansion"),
        ];
        assert_eq!(order(&manifests), vec!["base", "expansion", "music"]);
    }

    #[test]
    fn test_ties_break_on_priority_then_id() {
        let manifests = vec![
            PackageManifest::new("c"),
            PackageManifest::new("a").with_priority(5),
            PackageManifest::new("b"),
            PackageManifest::new("d").with_priority(-10).with_dependency("a"),
        ];
        assert_eq!(order(&manifests), vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn test_order_is_independent_of_input_order() {
        let mut manifests = vec![
            PackageManifest::new("z"),
            PackageManifest::new("y").with_dependency("z"),
            PackageManifest::new("x"),
        ];
        let first = order(&manifests);
        manifests.reverse();
        assert_eq!(order(&manifests), first);
    }

    #[test]
    fn test_mutual_dependency_is_a_cycle() {
        let manifests = vec![
            PackageManifest::new("p1").with_dependency("p2"),
            PackageManifest::new("p2").with_dependency("p1"),
        ];
        match resolve(&manifests) {
            Err(LoadError::CyclicDependency { packages }) => {
                assert_eq!(packages, vec!["p1", "p2", "p1"]);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_reports_only_participants() {
        let manifests = vec![
            PackageManifest::new("a").with_dependency("b"),
            PackageManifest::new("b").with_dependency("c"),
            PackageManifest::new("c").with_dependency("d"),
            PackageManifest::new("d").with_dependency("b"),
        ];
        match resolve(&manifests) {
            Err(LoadError::CyclicDependency { packages }) => {
                assert_eq!(packages, vec!["b", "c", "d", "b"]);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let manifests = vec![PackageManifest::new("a").with_dependency("a")];
        assert!(matches!(
            resolve(&manifests),
            Err(LoadError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_missing_dependency_rejects_transitively() {
        let manifests = vec![
            PackageManifest::new("base"),
            PackageManifest::new("addon").with_dependency("ghost"),
            PackageManifest::new("addon_patch").with_dependency("addon"),
        ];
        let plan = resolve(&manifests).unwrap();
        assert_eq!(plan.order, vec!["base"]);

        let rejected: Vec<(Option<&str>, String)> = plan
            .rejected
            .iter()
            .map(|e| (e.package(), e.to_string()))
            .collect();
        assert_eq!(
            rejected,
            vec![
                (
                    Some("addon"),
                    "package addon depends on ghost, which was not loaded".to_string()
                ),
                (
                    Some("addon_patch"),
                    "package addon_patch depends on addon, which was not loaded".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        let plan = resolve(std::iter::empty()).unwrap();
        assert!(plan.order.is_empty());
        assert!(plan.rejected.is_empty());
    }
}
