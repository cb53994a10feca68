use std::{collections::VecDeque, path::Path};

use derive_more::{Deref, Display, From, Into};
use itertools::iproduct;
use log::trace;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use typed_index_collections::TiVec;

use crate::error::{Error, Result};

/// The type used for arc costs and regrets
pub type Cost = f64;

#[derive(
    Deref,
    Debug,
    Display,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    From,
    Into,
    Clone,
    Copy,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct NodeIndex(pub usize);

#[derive(
    Deref,
    Debug,
    Display,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    From,
    Into,
    Clone,
    Copy,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ArcIndex(pub usize);

/// A directed arc whose cost is only known to lie in `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub from: NodeIndex,
    pub to: NodeIndex,
    pub lower: Cost,
    pub upper: Cost,
}

impl Arc {
    pub fn new(from: usize, to: usize, lower: Cost, upper: Cost) -> Self {
        Arc {
            from: NodeIndex(from),
            to: NodeIndex(to),
            lower,
            upper,
        }
    }

    /// The cost of the arc at its upper bound if `worst` is set, and at its lower bound otherwise.
    pub fn cost(&self, worst: bool) -> Cost {
        match worst {
            true => self.upper,
            false => self.lower,
        }
    }

    /// The width of the cost interval
    pub fn spread(&self) -> Cost {
        self.upper - self.lower
    }
}

/// A directed graph with interval arc costs, stored as an adjacency list keyed by origin node.
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct Graph {
    arcs: TiVec<ArcIndex, Arc>,
    outgoing: TiVec<NodeIndex, Vec<ArcIndex>>,
    incoming: TiVec<NodeIndex, Vec<ArcIndex>>,
}

impl Graph {
    /// Builds a graph with `node_count` nodes from the given arcs.
    ///
    /// Fails with `InvalidInstance` on self-loops, parallel arcs, out-of-range endpoints,
    /// non-finite bounds or `lower > upper`.
    pub fn new(node_count: usize, arcs: impl IntoIterator<Item = Arc>) -> Result<Graph> {
        let mut graph = Graph {
            arcs: TiVec::new(),
            outgoing: vec![Vec::new(); node_count].into(),
            incoming: vec![Vec::new(); node_count].into(),
        };

        for arc in arcs {
            let (from, to) = (arc.from, arc.to);
            if *from >= node_count || *to >= node_count {
                return Err(Error::InvalidInstance(format!(
                    "arc ({}, {}) has an endpoint outside 0..{}",
                    from, to, node_count
                )));
            }
            if from == to {
                return Err(Error::InvalidInstance(format!("self-loop at node {}", from)));
            }
            if !arc.lower.is_finite() || !arc.upper.is_finite() {
                return Err(Error::InvalidInstance(format!(
                    "arc ({}, {}) has non-finite bounds",
                    from, to
                )));
            }
            if arc.lower > arc.upper {
                return Err(Error::InvalidInstance(format!(
                    "arc ({}, {}) has lower bound {} above upper bound {}",
                    from, to, arc.lower, arc.upper
                )));
            }
            if graph.find_arc(from, to).is_some() {
                return Err(Error::InvalidInstance(format!(
                    "parallel arcs from {} to {}",
                    from, to
                )));
            }

            let index = graph.arcs.push_and_get_key(arc);
            graph.outgoing[from].push(index);
            graph.incoming[to].push(index);
        }

        Ok(graph)
    }

    /// Builds a graph from dense lower/upper bound matrices. Entries equal to or above `no_arc`
    /// mean that there is no arc. The diagonal is ignored.
    pub fn from_matrices(
        lower: &Array2<Cost>,
        upper: &Array2<Cost>,
        no_arc: Cost,
    ) -> Result<Graph> {
        let (rows, cols) = lower.dim();
        if rows != cols {
            return Err(Error::InvalidInstance(format!(
                "bound matrices must be square, got {}x{}",
                rows, cols
            )));
        }
        if upper.dim() != lower.dim() {
            return Err(Error::InvalidInstance(format!(
                "lower bounds are {}x{} but upper bounds are {:?}",
                rows,
                cols,
                upper.dim()
            )));
        }

        let mut arcs = Vec::new();
        for (i, j) in iproduct!(0..rows, 0..cols) {
            if i == j {
                continue;
            }
            let (l, u) = (lower[[i, j]], upper[[i, j]]);
            match (l >= no_arc, u >= no_arc) {
                (true, true) => continue,
                (false, false) => arcs.push(Arc::new(i, j, l, u)),
                _ => {
                    return Err(Error::InvalidInstance(format!(
                        "only one bound of ({}, {}) is the no-arc sentinel",
                        i, j
                    )))
                }
            }
        }

        trace!("Read {} arcs from {}x{} bound matrices", arcs.len(), rows, cols);
        Graph::new(rows, arcs)
    }

    /// Dense lower/upper bound matrices with `no_arc` where there is no arc and 0 on the diagonal.
    pub fn to_matrices(&self, no_arc: Cost) -> (Array2<Cost>, Array2<Cost>) {
        let n = self.node_count();
        let mut lower = Array2::from_elem((n, n), no_arc);
        let mut upper = Array2::from_elem((n, n), no_arc);
        for i in 0..n {
            lower[[i, i]] = 0.0;
            upper[[i, i]] = 0.0;
        }
        for arc in self.arcs.iter() {
            lower[[*arc.from, *arc.to]] = arc.lower;
            upper[[*arc.from, *arc.to]] = arc.upper;
        }
        (lower, upper)
    }

    /// The number of nodes in the graph
    pub fn node_count(&self) -> usize {
        self.outgoing.len()
    }

    /// The number of arcs in the graph
    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.node_count()).map(NodeIndex)
    }

    pub fn contains(&self, node: NodeIndex) -> bool {
        *node < self.node_count()
    }

    pub fn arc(&self, index: ArcIndex) -> &Arc {
        &self.arcs[index]
    }

    /// All arcs, together with their index
    pub fn arcs(&self) -> impl Iterator<Item = (ArcIndex, &Arc)> {
        self.arcs.iter_enumerated()
    }

    /// The arcs leaving `node`. Empty for nodes outside the graph.
    pub fn out_arcs(&self, node: NodeIndex) -> &[ArcIndex] {
        self.outgoing.get(node).map(|arcs| &arcs[..]).unwrap_or(&[])
    }

    /// The arcs entering `node`. Empty for nodes outside the graph.
    pub fn in_arcs(&self, node: NodeIndex) -> &[ArcIndex] {
        self.incoming.get(node).map(|arcs| &arcs[..]).unwrap_or(&[])
    }

    /// The nodes `j` such that there is an arc `node -> j`
    pub fn neighbors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.out_arcs(node).iter().map(move |&a| self.arcs[a].to)
    }

    pub fn find_arc(&self, from: NodeIndex, to: NodeIndex) -> Option<ArcIndex> {
        self.out_arcs(from)
            .iter()
            .copied()
            .find(|&a| self.arcs[a].to == to)
    }

    /// The `(lower, upper)` cost bounds of the arc `from -> to`.
    pub fn bound(&self, from: NodeIndex, to: NodeIndex) -> Result<(Cost, Cost)> {
        self.find_arc(from, to)
            .map(|a| (self.arcs[a].lower, self.arcs[a].upper))
            .ok_or(Error::NoSuchArc { from, to })
    }

    /// Whether `target` can be reached from `source` using any arc of the graph.
    pub fn reaches(&self, source: NodeIndex, target: NodeIndex) -> bool {
        if !self.contains(source) || !self.contains(target) {
            return false;
        }

        let mut seen: TiVec<NodeIndex, bool> = vec![false; self.node_count()].into();
        let mut queue = VecDeque::from([source]);
        seen[source] = true;

        while let Some(node) = queue.pop_front() {
            if node == target {
                return true;
            }
            for next in self.neighbors(node) {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }

        false
    }

    pub fn has_negative_bounds(&self) -> bool {
        self.arcs.iter().any(|arc| arc.lower < 0.0)
    }

    /// An upper bound on the absolute cost of any simple path in any scenario.
    pub fn cost_magnitude(&self) -> Cost {
        self.arcs
            .iter()
            .map(|arc| arc.lower.abs().max(arc.upper.abs()))
            .sum()
    }
}

/// The on-disk representation of an instance: two dense `N x N` bound matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceFile {
    pub source: usize,
    pub target: usize,
    pub no_arc: Cost,
    pub lower: Vec<Vec<Cost>>,
    pub upper: Vec<Vec<Cost>>,
}

/// A graph together with the `(source, target)` query.
#[derive(Debug, Clone)]
pub struct Instance {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub no_arc: Cost,
    pub graph: Graph,
}

impl Instance {
    pub fn read(path: impl AsRef<Path>) -> Result<Instance> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let raw: InstanceFile = serde_json::from_reader(reader)?;
        Instance::try_from(raw)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(file, &InstanceFile::from(self))?;
        Ok(())
    }
}

fn square(rows: Vec<Vec<Cost>>, what: &str) -> Result<Array2<Cost>> {
    let n = rows.len();
    if let Some(row) = rows.iter().find(|row| row.len() != n) {
        return Err(Error::InvalidInstance(format!(
            "{} bound matrix has a row of length {} in a {} node instance",
            what,
            row.len(),
            n
        )));
    }

    let flat = rows.into_iter().flatten().collect::<Vec<_>>();
    Array2::from_shape_vec((n, n), flat).map_err(|e| Error::InvalidInstance(e.to_string()))
}

impl TryFrom<InstanceFile> for Instance {
    type Error = Error;

    fn try_from(raw: InstanceFile) -> Result<Self> {
        let lower = square(raw.lower, "lower")?;
        let upper = square(raw.upper, "upper")?;
        let graph = Graph::from_matrices(&lower, &upper, raw.no_arc)?;
        Ok(Instance {
            source: NodeIndex(raw.source),
            target: NodeIndex(raw.target),
            no_arc: raw.no_arc,
            graph,
        })
    }
}

impl From<&Instance> for InstanceFile {
    fn from(instance: &Instance) -> Self {
        let (lower, upper) = instance.graph.to_matrices(instance.no_arc);
        let rows = |m: Array2<Cost>| -> Vec<Vec<Cost>> {
            m.outer_iter().map(|row| row.to_vec()).collect()
        };
        InstanceFile {
            source: *instance.source,
            target: *instance.target,
            no_arc: instance.no_arc,
            lower: rows(lower),
            upper: rows(upper),
        }
    }
}
