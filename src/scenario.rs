use std::collections::{HashSet, VecDeque};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use typed_index_collections::TiVec;

use crate::{
    error::Result,
    graph::{ArcIndex, Cost, Graph, NodeIndex},
    subproblem,
};

/// An assignment of every arc to either its upper (`true`) or lower (`false`) cost bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    selected: TiVec<ArcIndex, bool>,
}

impl Scenario {
    /// The scenario where every arc is at its lower bound
    pub fn lower(graph: &Graph) -> Self {
        Scenario {
            selected: vec![false; graph.arc_count()].into(),
        }
    }

    /// The scenario where exactly the given arcs are at their upper bound
    pub fn from_arcs(graph: &Graph, arcs: impl IntoIterator<Item = ArcIndex>) -> Self {
        let mut scenario = Scenario::lower(graph);
        for arc in arcs {
            scenario.selected[arc] = true;
        }
        scenario
    }

    pub fn is_selected(&self, arc: ArcIndex) -> bool {
        self.selected[arc]
    }

    /// The arcs at their upper bound, in index order
    pub fn selected(&self) -> impl Iterator<Item = ArcIndex> + '_ {
        self.selected
            .iter_enumerated()
            .filter(|(_, &on)| on)
            .map(|(arc, _)| arc)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.iter().filter(|&&on| on).count()
    }

    /// The effective cost of `arc` under this scenario
    pub fn cost(&self, graph: &Graph, arc: ArcIndex) -> Cost {
        graph.arc(arc).cost(self.selected[arc])
    }

    /// `Σ upper_ij · Y_ij`: the worst-case cost of the selected arcs
    pub fn worst_case_cost(&self, graph: &Graph) -> Cost {
        self.selected().map(|a| graph.arc(a).upper).sum()
    }

    /// Extracts one simple `source -> target` path using only selected arcs, dropping any
    /// cycles or detached arcs. Returns `None` if the selected arcs do not connect the two.
    pub fn extract_path(
        &self,
        graph: &Graph,
        source: NodeIndex,
        target: NodeIndex,
        tie_break: TieBreak,
    ) -> Option<Path> {
        match tie_break {
            TieBreak::Lexicographic => self.lexicographic_path(graph, source, target),
            TieBreak::FewestArcs => self.fewest_arcs_path(graph, source, target),
        }
    }

    /// Selected arcs leaving `node`, ordered by head node
    fn selected_out(&self, graph: &Graph, node: NodeIndex) -> Vec<ArcIndex> {
        graph
            .out_arcs(node)
            .iter()
            .copied()
            .filter(|&a| self.selected[a])
            .sorted_by_key(|&a| graph.arc(a).to)
            .collect()
    }

    /// Whether `target` is reachable from `from` through selected arcs, avoiding `blocked`
    fn reaches_avoiding(
        &self,
        graph: &Graph,
        from: NodeIndex,
        target: NodeIndex,
        blocked: &TiVec<NodeIndex, bool>,
    ) -> bool {
        let mut seen = blocked.clone();
        let mut queue = VecDeque::from([from]);
        seen[from] = true;
        while let Some(node) = queue.pop_front() {
            if node == target {
                return true;
            }
            for a in self.selected_out(graph, node) {
                let next = graph.arc(a).to;
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Greedily takes the smallest successor from which the target stays reachable,
    /// which yields the lexicographically smallest node sequence.
    fn lexicographic_path(
        &self,
        graph: &Graph,
        source: NodeIndex,
        target: NodeIndex,
    ) -> Option<Path> {
        let mut on_path: TiVec<NodeIndex, bool> = vec![false; graph.node_count()].into();
        on_path[source] = true;
        let mut arcs = Vec::new();
        let mut current = source;

        while current != target {
            let next = self.selected_out(graph, current).into_iter().find(|&a| {
                let to = graph.arc(a).to;
                !on_path[to] && self.reaches_avoiding(graph, to, target, &on_path)
            })?;
            current = graph.arc(next).to;
            on_path[current] = true;
            arcs.push(next);
        }

        Some(Path::from_arcs(graph, source, arcs))
    }

    /// Breadth-first search over selected arcs
    fn fewest_arcs_path(
        &self,
        graph: &Graph,
        source: NodeIndex,
        target: NodeIndex,
    ) -> Option<Path> {
        let mut via: TiVec<NodeIndex, Option<ArcIndex>> = vec![None; graph.node_count()].into();
        let mut seen: TiVec<NodeIndex, bool> = vec![false; graph.node_count()].into();
        let mut queue = VecDeque::from([source]);
        seen[source] = true;

        while let Some(node) = queue.pop_front() {
            if node == target {
                break;
            }
            for a in self.selected_out(graph, node) {
                let next = graph.arc(a).to;
                if !seen[next] {
                    seen[next] = true;
                    via[next] = Some(a);
                    queue.push_back(next);
                }
            }
        }

        if !seen[target] {
            return None;
        }

        let mut arcs = Vec::new();
        let mut node = target;
        while let Some(a) = via[node] {
            arcs.push(a);
            node = graph.arc(a).from;
        }
        arcs.reverse();
        Some(Path::from_arcs(graph, source, arcs))
    }
}

/// How to pick a path when the selected arcs admit more than one `source -> target` path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// The path with the lexicographically smallest node sequence
    Lexicographic,
    /// The path with the fewest arcs, ties broken by smallest node index
    FewestArcs,
}

impl Default for TieBreak {
    fn default() -> Self {
        TieBreak::Lexicographic
    }
}

impl std::fmt::Display for TieBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TieBreak::Lexicographic => write!(f, "lexicographic"),
            TieBreak::FewestArcs => write!(f, "fewest-arcs"),
        }
    }
}

/// A walk through the graph, given by its consecutive arcs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    nodes: Vec<NodeIndex>,
    arcs: Vec<ArcIndex>,
}

impl Path {
    /// Builds a path starting at `source` following `arcs`. The arcs are assumed to be consecutive.
    pub fn from_arcs(graph: &Graph, source: NodeIndex, arcs: Vec<ArcIndex>) -> Self {
        let nodes = std::iter::once(source)
            .chain(arcs.iter().map(|&a| graph.arc(a).to))
            .collect();
        Path { nodes, arcs }
    }

    /// Builds a path from a node sequence.
    /// Returns `None` if two consecutive nodes are not joined by an arc.
    pub fn from_nodes(graph: &Graph, nodes: &[NodeIndex]) -> Option<Self> {
        let first = *nodes.first()?;
        let arcs = nodes
            .iter()
            .tuple_windows()
            .map(|(&from, &to)| graph.find_arc(from, to))
            .collect::<Option<Vec<_>>>()?;
        Some(Path::from_arcs(graph, first, arcs))
    }

    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn arcs(&self) -> &[ArcIndex] {
        &self.arcs
    }

    pub fn source(&self) -> NodeIndex {
        self.nodes[0]
    }

    pub fn target(&self) -> NodeIndex {
        self.nodes[self.nodes.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Whether no node is visited twice
    pub fn is_simple(&self) -> bool {
        let mut seen = HashSet::new();
        self.nodes.iter().all(|node| seen.insert(*node))
    }

    /// The scenario that puts exactly this path's arcs at their upper bound
    pub fn scenario(&self, graph: &Graph) -> Scenario {
        Scenario::from_arcs(graph, self.arcs.iter().copied())
    }

    /// The cost of the path with every arc at its upper bound
    pub fn worst_case_cost(&self, graph: &Graph) -> Cost {
        self.arcs.iter().map(|&a| graph.arc(a).upper).sum()
    }

    /// The cost of the path under an arbitrary scenario
    pub fn cost(&self, graph: &Graph, scenario: &Scenario) -> Cost {
        self.arcs.iter().map(|&a| scenario.cost(graph, a)).sum()
    }

    /// The regret of following this path: its worst-case cost minus the shortest distance
    /// between its endpoints in the scenario where only this path's arcs are at their upper bound.
    pub fn regret(&self, graph: &Graph) -> Result<Cost> {
        let scenario = self.scenario(graph);
        let paths = subproblem::solve(graph, self.source(), &scenario)?;
        Ok(self.worst_case_cost(graph) - paths.distance(self.target()))
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.nodes.iter().join(" -> "))
    }
}
