//! Dependency graph construction and dependency-first walking.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::trace;

use crate::error::{Error, Result};
use crate::manifest::ManifestStore;
use crate::package::{DepKind, Package};
use crate::workspace::Workspace;

/// What a walk visitor wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    Continue,
    Stop,
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    Completed,
    Stopped,
}

/// Visits workspace packages so that every local dependency is visited
/// before the packages that depend on it.
///
/// Edges are re-read through the manifest store on every walk, so range
/// rewrites made by earlier visits are observed.
pub struct GraphWalker<'a> {
    workspace: &'a Workspace,
    manifests: &'a dyn ManifestStore,
}

impl<'a> GraphWalker<'a> {
    pub fn new(workspace: &'a Workspace, manifests: &'a dyn ManifestStore) -> Self {
        Self {
            workspace,
            manifests,
        }
    }

    /// Walks every participating package exactly once, dependencies first.
    ///
    /// Roots are taken in declaration order. The visitor may stop the walk.
    ///
    /// # Errors
    ///
    /// Returns `Error::CircularDependency` with the offending chain, or any
    /// error the visitor returns.
    pub fn walk<F>(&self, mut visitor: F) -> Result<WalkOutcome>
    where
        F: FnMut(&'a Package) -> Result<WalkAction>,
    {
        let mut walked = HashSet::new();
        let mut ancestors = Vec::new();

        for package in self.workspace.participating() {
            if self.visit(package, &mut ancestors, &mut walked, &mut visitor)? == WalkAction::Stop {
                return Ok(WalkOutcome::Stopped);
            }
        }

        Ok(WalkOutcome::Completed)
    }

    /// Collects the visit order without side effects.
    pub fn walk_order(&self) -> Result<Vec<&'a Package>> {
        let mut order = Vec::new();
        self.walk(|package| {
            order.push(package);
            Ok(WalkAction::Continue)
        })?;
        Ok(order)
    }

    fn visit<F>(
        &self,
        package: &'a Package,
        ancestors: &mut Vec<&'a Package>,
        walked: &mut HashSet<&'a Path>,
        visitor: &mut F,
    ) -> Result<WalkAction>
    where
        F: FnMut(&'a Package) -> Result<WalkAction>,
    {
        if walked.contains(package.path.as_path()) {
            return Ok(WalkAction::Continue);
        }

        ancestors.push(package);

        let deps = self.workspace.direct_local_deps(package, self.manifests)?;
        for dep in deps {
            if let Some(pos) = ancestors.iter().position(|a| a.path == dep.package.path) {
                let chain = ancestors[pos..]
                    .iter()
                    .map(|p| p.display_name())
                    .chain(std::iter::once(dep.package.display_name()))
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(Error::CircularDependency { chain });
            }

            if self.visit(dep.package, ancestors, walked, visitor)? == WalkAction::Stop {
                return Ok(WalkAction::Stop);
            }
        }

        ancestors.pop();
        walked.insert(package.path.as_path());

        trace!(package = %package.display_name(), "visiting");
        visitor(package)
    }
}

/// Snapshot of the local dependency relation, used for dependent queries.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, DepKind>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph of participating packages and their local edges.
    ///
    /// Edges point from dependent to dependency.
    pub fn build(workspace: &Workspace, manifests: &dyn ManifestStore) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for package in workspace.participating() {
            let name = package.display_name();
            let node = graph.add_node(name.clone());
            node_map.insert(name, node);
        }

        for package in workspace.participating() {
            let from = node_map[&package.display_name()];
            let mut seen = HashSet::new();
            for dep in workspace.direct_local_deps(package, manifests)? {
                let to = node_map[&dep.package.display_name()];
                if seen.insert(to) {
                    graph.add_edge(from, to, dep.edge.kind);
                }
            }
        }

        Ok(Self { graph, node_map })
    }

    fn node(&self, name: &str) -> Result<NodeIndex> {
        self.node_map
            .get(name)
            .copied()
            .ok_or_else(|| Error::PackageNotFound {
                name: name.to_string(),
                available: self.all_packages().join(", "),
            })
    }

    /// Package names in insertion order.
    pub fn all_packages(&self) -> Vec<String> {
        self.graph.node_indices().map(|i| self.graph[i].clone()).collect()
    }

    /// Direct local dependencies with the kind of the first declared edge.
    pub fn dependencies(&self, name: &str) -> Result<Vec<(String, DepKind)>> {
        let node = self.node(name)?;
        let mut deps: Vec<(String, DepKind)> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (self.graph[e.target()].clone(), *e.weight()))
            .collect();
        deps.reverse();
        Ok(deps)
    }

    /// Packages that directly depend on `name`.
    pub fn dependents(&self, name: &str) -> Result<Vec<String>> {
        let node = self.node(name)?;
        let mut dependents: Vec<String> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|idx| self.graph[idx].clone())
            .collect();
        dependents.sort();
        Ok(dependents)
    }

    /// Packages that depend on `name`, directly or transitively.
    pub fn all_dependents(&self, name: &str) -> Result<HashSet<String>> {
        let start = self.node(name)?;
        let mut result = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for dependent in self.graph.neighbors_directed(node, Direction::Incoming) {
                if result.insert(self.graph[dependent].clone()) {
                    queue.push_back(dependent);
                }
            }
        }

        Ok(result)
    }

    /// Packages nothing else depends on.
    pub fn roots(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.graph[idx].clone())
            .collect()
    }
}
