//! Exact single-source shortest paths under a fixed scenario.
//!
//! The distance vector doubles as the extreme point of the subproblem's dual region:
//! every arc satisfies `x_j <= x_i + c_ij` and the arcs of the shortest-path tree are tight.

use std::{cmp::Reverse, collections::BinaryHeap};

use float_ord::FloatOrd;
use log::trace;
use typed_index_collections::TiVec;

use crate::{
    error::{Error, Result},
    graph::{ArcIndex, Cost, Graph, NodeIndex},
    scenario::{Path, Scenario},
};

/// Shortest distances from a source, together with the shortest-path tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPaths {
    source: NodeIndex,
    distance: TiVec<NodeIndex, Cost>,
    predecessor: TiVec<NodeIndex, Option<ArcIndex>>,
}

impl ShortestPaths {
    fn new(graph: &Graph, source: NodeIndex) -> Self {
        let mut distance: TiVec<NodeIndex, Cost> = vec![Cost::INFINITY; graph.node_count()].into();
        distance[source] = 0.0;
        ShortestPaths {
            source,
            distance,
            predecessor: vec![None; graph.node_count()].into(),
        }
    }

    pub fn source(&self) -> NodeIndex {
        self.source
    }

    /// The shortest distance to `node`, `+inf` if it is unreachable
    pub fn distance(&self, node: NodeIndex) -> Cost {
        self.distance[node]
    }

    /// The potential vector `x`, indexed by node
    pub fn potentials(&self) -> &TiVec<NodeIndex, Cost> {
        &self.distance
    }

    pub fn is_reachable(&self, node: NodeIndex) -> bool {
        self.distance[node].is_finite()
    }

    /// The tree arc entering `node`
    pub fn predecessor(&self, node: NodeIndex) -> Option<ArcIndex> {
        self.predecessor[node]
    }

    /// The tree path from the source to `target`, `None` if the target is unreachable.
    pub fn path_to(&self, graph: &Graph, target: NodeIndex) -> Option<Path> {
        if !self.is_reachable(target) {
            return None;
        }

        let mut arcs = Vec::new();
        let mut node = target;
        while node != self.source {
            let arc = self.predecessor[node]?;
            arcs.push(arc);
            node = graph.arc(arc).from;
        }
        arcs.reverse();
        Some(Path::from_arcs(graph, self.source, arcs))
    }

    /// Checks that the potentials are dual feasible (`x_j <= x_i + c_ij` for every arc between
    /// reachable nodes) and that every tree arc is tight, up to `eps`.
    pub fn certifies(&self, graph: &Graph, scenario: &Scenario, eps: Cost) -> bool {
        let feasible = graph.arcs().all(|(a, arc)| {
            let (xi, xj) = (self.distance[arc.from], self.distance[arc.to]);
            !xi.is_finite() || xj <= xi + scenario.cost(graph, a) + eps
        });

        let tight = graph.nodes().all(|node| match self.predecessor[node] {
            Some(a) => {
                let arc = graph.arc(a);
                let slack = self.distance[arc.from] + scenario.cost(graph, a) - self.distance[node];
                slack.abs() <= eps
            }
            None => node == self.source || !self.is_reachable(node),
        });

        feasible && tight
    }
}

/// Computes the shortest distances from `source` with arc costs `upper` where the scenario
/// selects the arc and `lower` otherwise.
///
/// Uses Dijkstra when every effective cost is non-negative and falls back to Bellman-Ford
/// otherwise, failing with `NegativeCycleDetected` if the relaxation does not settle.
pub fn solve(graph: &Graph, source: NodeIndex, scenario: &Scenario) -> Result<ShortestPaths> {
    if !graph.contains(source) {
        return Err(Error::InvalidInstance(format!(
            "source {} is not a node of the graph",
            source
        )));
    }

    let negative = graph.arcs().any(|(a, _)| scenario.cost(graph, a) < 0.0);
    match negative {
        false => Ok(dijkstra(graph, source, scenario)),
        true => {
            trace!("Negative arc costs in scenario, using Bellman-Ford");
            bellman_ford(graph, source, scenario)
        }
    }
}

fn dijkstra(graph: &Graph, source: NodeIndex, scenario: &Scenario) -> ShortestPaths {
    let mut paths = ShortestPaths::new(graph, source);
    let mut done: TiVec<NodeIndex, bool> = vec![false; graph.node_count()].into();
    let mut heap = BinaryHeap::new();
    heap.push(Reverse((FloatOrd(0.0), source)));

    while let Some(Reverse((FloatOrd(dist), node))) = heap.pop() {
        if done[node] {
            continue;
        }
        done[node] = true;

        for &a in graph.out_arcs(node) {
            let next = graph.arc(a).to;
            let candidate = dist + scenario.cost(graph, a);
            if candidate < paths.distance[next] {
                paths.distance[next] = candidate;
                paths.predecessor[next] = Some(a);
                heap.push(Reverse((FloatOrd(candidate), next)));
            }
        }
    }

    paths
}

fn bellman_ford(graph: &Graph, source: NodeIndex, scenario: &Scenario) -> Result<ShortestPaths> {
    let mut paths = ShortestPaths::new(graph, source);

    let relax = |paths: &mut ShortestPaths| {
        let mut changed = false;
        for (a, arc) in graph.arcs() {
            let from = paths.distance[arc.from];
            if !from.is_finite() {
                continue;
            }
            let candidate = from + scenario.cost(graph, a);
            if candidate < paths.distance[arc.to] {
                paths.distance[arc.to] = candidate;
                paths.predecessor[arc.to] = Some(a);
                changed = true;
            }
        }
        changed
    };

    for _ in 1..graph.node_count() {
        if !relax(&mut paths) {
            return Ok(paths);
        }
    }

    // Any improvement after N - 1 passes means a negative cycle is reachable.
    match relax(&mut paths) {
        true => Err(Error::NegativeCycleDetected),
        false => Ok(paths),
    }
}

/// Fails with `NegativeCycleDetected` if the graph has a negative cycle under `scenario`,
/// reachable from `source` or not.
///
/// Every node starts at distance 0, as if a virtual source had a zero-cost arc to each of them.
pub fn check_negative_cycles(graph: &Graph, scenario: &Scenario) -> Result<()> {
    let mut distance: TiVec<NodeIndex, Cost> = vec![0.0; graph.node_count()].into();

    let mut relax = || {
        let mut changed = false;
        for (a, arc) in graph.arcs() {
            let candidate = distance[arc.from] + scenario.cost(graph, a);
            if candidate < distance[arc.to] {
                distance[arc.to] = candidate;
                changed = true;
            }
        }
        changed
    };

    // N + 1 nodes with the virtual source, so N passes settle every distance
    for _ in 0..graph.node_count() {
        if !relax() {
            return Ok(());
        }
    }
    match relax() {
        true => Err(Error::NegativeCycleDetected),
        false => Ok(()),
    }
}
