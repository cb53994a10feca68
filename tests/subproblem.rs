mod common;

use common::{floyd_warshall, random_instance};
use rand::{rngs::StdRng, Rng, SeedableRng};
use robust_path::{subproblem, Arc, ArcIndex, Graph, NodeIndex, Scenario};

fn random_scenario(graph: &Graph, rng: &mut StdRng) -> Scenario {
    Scenario::from_arcs(graph, (0..graph.arc_count()).map(ArcIndex).filter(|_| rng.gen_bool(0.5)))
}

fn check(graph: &Graph, scenario: &Scenario) {
    let reference = floyd_warshall(graph, scenario);
    let source = NodeIndex(0);
    let paths = subproblem::solve(graph, source, scenario).unwrap();

    for node in graph.nodes() {
        let expected = reference[0][*node];
        let actual = paths.distance(node);
        match expected.is_finite() {
            true => assert!(
                (actual - expected).abs() < 1e-9,
                "node {}: {} != {}",
                node,
                actual,
                expected
            ),
            false => assert!(!paths.is_reachable(node)),
        }

        if let Some(path) = paths.path_to(graph, node) {
            assert!((path.cost(graph, scenario) - actual).abs() < 1e-9);
            assert!(path.is_simple());
        }
    }
    assert_eq!(paths.distance(source), 0.0);
    assert!(paths.certifies(graph, scenario, 1e-9));
}

#[test]
fn distances_match_floyd_warshall() {
    let mut rng = StdRng::seed_from_u64(42);
    for seed in 0..10 {
        let instance = random_instance(25, 0.12, seed);
        for _ in 0..3 {
            let scenario = random_scenario(&instance.graph, &mut rng);
            check(&instance.graph, &scenario);
        }
    }
}

#[test]
fn negative_costs_on_acyclic_graphs() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..10 {
        let n = 15;
        let mut arcs = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if rng.gen_bool(0.3) {
                    let lower = rng.gen_range(-10..10) as f64;
                    let upper = lower + rng.gen_range(0..10) as f64;
                    arcs.push(Arc::new(i, j, lower, upper));
                }
            }
        }
        let graph = Graph::new(n, arcs).unwrap();
        check(&graph, &Scenario::lower(&graph));
        let scenario = random_scenario(&graph, &mut rng);
        check(&graph, &scenario);
    }
}
