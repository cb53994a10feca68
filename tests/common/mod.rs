#![allow(dead_code)]

use robust_path::{
    generate::{generate, GeneratorConfig},
    Arc, ArcIndex, Cost, Graph, Instance, NodeIndex, Path, Scenario,
};

/// Two routes from 0 to 3: 0 -> 1 -> 3 with costs in [1, 5] and 0 -> 2 -> 3 with [2, 2] and [1, 10]
pub fn diamond() -> Graph {
    Graph::new(
        4,
        vec![
            Arc::new(0, 1, 1.0, 5.0),
            Arc::new(1, 3, 1.0, 5.0),
            Arc::new(0, 2, 2.0, 2.0),
            Arc::new(2, 3, 1.0, 10.0),
        ],
    )
    .unwrap()
}

pub fn random_instance(nodes: usize, density: f64, seed: u64) -> Instance {
    generate(&GeneratorConfig {
        nodes,
        source: 0,
        target: nodes - 1,
        density,
        seed,
        ..GeneratorConfig::default()
    })
    .unwrap()
}

/// All pairs shortest distances under `scenario`, `+inf` where there is no path
pub fn floyd_warshall(graph: &Graph, scenario: &Scenario) -> Vec<Vec<Cost>> {
    let n = graph.node_count();
    let mut dist = vec![vec![Cost::INFINITY; n]; n];
    for (i, row) in dist.iter_mut().enumerate() {
        row[i] = 0.0;
    }
    for (a, arc) in graph.arcs() {
        let c = scenario.cost(graph, a);
        if c < dist[*arc.from][*arc.to] {
            dist[*arc.from][*arc.to] = c;
        }
    }
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                let through = dist[i][k] + dist[k][j];
                if through < dist[i][j] {
                    dist[i][j] = through;
                }
            }
        }
    }
    dist
}

/// Every simple `source -> target` path
pub fn simple_paths(graph: &Graph, source: NodeIndex, target: NodeIndex) -> Vec<Path> {
    fn walk(
        graph: &Graph,
        node: NodeIndex,
        target: NodeIndex,
        visited: &mut Vec<bool>,
        arcs: &mut Vec<ArcIndex>,
        out: &mut Vec<Vec<ArcIndex>>,
    ) {
        if node == target {
            out.push(arcs.clone());
            return;
        }
        for &a in graph.out_arcs(node) {
            let next = graph.arc(a).to;
            if !visited[*next] {
                visited[*next] = true;
                arcs.push(a);
                walk(graph, next, target, visited, arcs, out);
                arcs.pop();
                visited[*next] = false;
            }
        }
    }

    let mut visited = vec![false; graph.node_count()];
    visited[*source] = true;
    let mut out = Vec::new();
    walk(graph, source, target, &mut visited, &mut Vec::new(), &mut out);
    out.into_iter()
        .map(|arcs| Path::from_arcs(graph, source, arcs))
        .collect()
}

/// The regret of a path, computed with Floyd-Warshall
pub fn reference_regret(graph: &Graph, path: &Path) -> Cost {
    let dist = floyd_warshall(graph, &path.scenario(graph));
    path.worst_case_cost(graph) - dist[*path.source()][*path.target()]
}

/// The minimum regret over all simple paths
pub fn brute_force_regret(graph: &Graph, source: NodeIndex, target: NodeIndex) -> Cost {
    simple_paths(graph, source, target)
        .iter()
        .map(|path| reference_regret(graph, path))
        .fold(Cost::INFINITY, Cost::min)
}
