use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    graph::{ArcIndex, Cost, Graph, NodeIndex},
    scenario::{Path, Scenario},
    subproblem::ShortestPaths,
};

/// An optimality cut, given by the arcs `P` of a shortest `s -> t` path found by the subproblem.
///
/// It encodes `η <= Σ_{a ∈ P} (l_a + (u_a - l_a) Y_a)`: whatever scenario the master picks,
/// the shortest distance can never exceed the cost of `P` under that scenario.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cut {
    arcs: Vec<ArcIndex>,
}

impl Cut {
    pub fn from_path(path: &Path) -> Self {
        let mut arcs = path.arcs().to_vec();
        arcs.sort();
        arcs.dedup();
        Cut { arcs }
    }

    /// The cut given by the tree path to `target`, `None` if the target was not reached
    pub fn from_shortest_paths(
        graph: &Graph,
        paths: &ShortestPaths,
        target: NodeIndex,
    ) -> Option<Self> {
        paths.path_to(graph, target).map(|path| Cut::from_path(&path))
    }

    /// The arcs of the cut, in index order
    pub fn arcs(&self) -> &[ArcIndex] {
        &self.arcs
    }

    /// `Σ_{a ∈ P} l_a`, the right hand side of the cut
    pub fn constant(&self, graph: &Graph) -> Cost {
        self.arcs.iter().map(|&a| graph.arc(a).lower).sum()
    }

    /// The value of the right hand side under `scenario`
    pub fn evaluate(&self, graph: &Graph, scenario: &Scenario) -> Cost {
        self.arcs.iter().map(|&a| scenario.cost(graph, a)).sum()
    }
}

/// Append-only log of the cuts generated so far. Identical cuts are stored once.
#[derive(Debug, Clone, Default)]
pub struct CutStore {
    cuts: Vec<Cut>,
    seen: HashSet<Cut>,
}

impl CutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `cut` to the store. Returns false if an identical cut is already present.
    pub fn push(&mut self, cut: Cut) -> bool {
        if self.seen.contains(&cut) {
            return false;
        }
        self.seen.insert(cut.clone());
        self.cuts.push(cut);
        true
    }

    pub fn contains(&self, cut: &Cut) -> bool {
        self.seen.contains(cut)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cut> {
        self.cuts.iter()
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }
}
