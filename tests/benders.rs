mod common;

use common::{brute_force_regret, diamond, random_instance, reference_regret};
use robust_path::{
    benders::{self, Benders, Config, Status},
    cuts::{Cut, CutStore},
    models::{MasterProblem, Monolithic},
    oracle::{MicroLpOracle, Oracle, OracleError, Outcome, Program},
    termination::Termination,
    Arc, Error, Graph, NodeIndex, TieBreak,
};

const EPS: f64 = 1e-6;

fn solve(graph: &Graph, s: usize, t: usize) -> benders::Report {
    let (s, t) = (NodeIndex(s), NodeIndex(t));
    benders::solve(graph, s, t, Config::default(), MicroLpOracle::new()).unwrap()
}

/// Solves the first `budget` programs, then times out on every call
struct Expiring {
    inner: MicroLpOracle,
    budget: usize,
}

impl Oracle for Expiring {
    fn solve(&mut self, program: &Program) -> Result<Outcome, OracleError> {
        match self.budget {
            0 => Err(OracleError::Timeout),
            _ => {
                self.budget -= 1;
                self.inner.solve(program)
            }
        }
    }

    fn name(&self) -> &str {
        "expiring"
    }
}

#[test]
fn toy_graph_prefers_the_tighter_route() {
    let graph = diamond();
    let report = solve(&graph, 0, 3);

    assert!(report.status.is_optimal());
    assert!((report.objective() - 7.0).abs() < EPS);
    assert!((report.upper_bound - 7.0).abs() < EPS);
    let best = report.path.unwrap();
    assert_eq!(best.path.nodes(), &[NodeIndex(0), NodeIndex(1), NodeIndex(3)]);
    assert!((reference_regret(&graph, &best.path) - 7.0).abs() < EPS);
}

#[test]
fn disconnected_graph_fails_before_iterating() {
    // {0, 1} and {2, 3} are separate components
    let graph = Graph::new(4, vec![Arc::new(0, 1, 1.0, 2.0), Arc::new(2, 3, 1.0, 2.0)]).unwrap();
    let (s, t) = (NodeIndex(0), NodeIndex(3));
    let result = benders::solve(&graph, s, t, Config::default(), MicroLpOracle::new());
    assert!(matches!(
        result,
        Err(Error::NoPathExists { source: NodeIndex(0), target: NodeIndex(3) })
    ));
}

#[test]
fn single_arc_has_no_regret() {
    let graph = Graph::new(2, vec![Arc::new(0, 1, 3.0, 8.0)]).unwrap();
    let report = solve(&graph, 0, 1);

    assert!(report.status.is_optimal());
    assert_eq!(report.iterations, 1);
    assert!(report.objective().abs() < EPS);
    let best = report.path.unwrap();
    assert_eq!(best.worst_case_cost, 8.0);
    assert_eq!(best.shortest_distance, 8.0);
}

#[test]
fn bounds_are_monotone() {
    for seed in 0..4 {
        let instance = random_instance(12, 0.25, seed);
        let report = solve(&instance.graph, *instance.source, *instance.target);
        assert!(report.status.is_optimal(), "seed {}: {}", seed, report.status);

        for pair in report.trajectory.windows(2) {
            assert!(pair[1].lower >= pair[0].lower);
            assert!(pair[1].upper <= pair[0].upper);
        }
        for record in &report.trajectory {
            assert!(record.lower >= record.master_objective - EPS);
            if let Some(z) = record.subproblem_objective {
                assert!(record.upper <= z + EPS);
            }
        }
    }
}

#[test]
fn converged_runs_carry_a_certificate() {
    for seed in 10..14 {
        let instance = random_instance(10, 0.3, seed);
        let graph = &instance.graph;
        let report = solve(graph, *instance.source, *instance.target);

        assert!(report.status.is_optimal());
        assert!(report.gap() <= EPS);
        let best = report.path.as_ref().unwrap();
        assert!(best.path.is_simple());
        assert_eq!(best.path.source(), instance.source);
        assert_eq!(best.path.target(), instance.target);

        let optimum = brute_force_regret(graph, instance.source, instance.target);
        assert!((report.objective() - optimum).abs() < EPS, "seed {}", seed);
        assert!((report.upper_bound - optimum).abs() < EPS, "seed {}", seed);
    }
}

#[test]
fn resubmitting_a_cut_leaves_the_master_unchanged() {
    let graph = diamond();
    let master = MasterProblem::new(&graph, NodeIndex(0), NodeIndex(3), MicroLpOracle::new());
    let nodes = [NodeIndex(0), NodeIndex(2), NodeIndex(3)];
    let path = robust_path::Path::from_nodes(&graph, &nodes).unwrap();

    let mut cuts = CutStore::new();
    assert!(cuts.push(Cut::from_path(&path)));
    let (before, _) = master.build(&cuts);

    assert!(!cuts.push(Cut::from_path(&path)));
    let (after, _) = master.build(&cuts);
    assert_eq!(before.constraints, after.constraints);
}

#[test]
fn tie_break_policies_agree_on_the_objective() {
    let instance = random_instance(10, 0.35, 3);
    let graph = &instance.graph;

    let objectives = [TieBreak::Lexicographic, TieBreak::FewestArcs].map(|tie_break| {
        let config = Config {
            tie_break,
            ..Config::default()
        };
        benders::solve(graph, instance.source, instance.target, config, MicroLpOracle::new())
            .unwrap()
            .upper_bound
    });
    assert!((objectives[0] - objectives[1]).abs() < EPS);
}

#[test]
fn limits_report_a_partial_result() {
    let instance = random_instance(12, 0.3, 5);
    let report = Benders::new(
        &instance.graph,
        instance.source,
        instance.target,
        Config::default(),
        MicroLpOracle::new(),
    )
    .unwrap()
    .with_termination(Termination::try_from("1 iterations").unwrap())
    .solve();

    // A single iteration leaves η at its artificial bound
    assert!(matches!(report.status, Status::IterationLimitExceeded));
    assert_eq!(report.trajectory.len(), 1);
    assert!(report.upper_bound.is_finite());
    assert!(report.lower_bound <= report.upper_bound);
    assert!(report.path.is_some());
}

#[test]
fn oracle_failures_abort_with_the_partial_result() {
    let graph = diamond();
    let oracle = Expiring {
        inner: MicroLpOracle::new(),
        budget: 1,
    };
    let (s, t) = (NodeIndex(0), NodeIndex(3));
    let report = benders::solve(&graph, s, t, Config::default(), oracle).unwrap();

    // The second master solve times out, and so does its retry
    assert!(matches!(report.status, Status::Aborted(Error::SolverTimeout)));
    assert_eq!(report.trajectory.len(), 1);
    assert_eq!(report.iterations, 2);
    assert!(report.upper_bound.is_finite());
    assert!(report.lower_bound <= report.upper_bound);
    assert!(report.path.is_some());
    assert!(matches!(report.into_result(), Err(Error::SolverTimeout)));
}

#[test]
fn stress_instance_matches_the_single_level_model() {
    let instance = random_instance(20, 0.15, 1234);
    let graph = &instance.graph;
    let report = solve(graph, *instance.source, *instance.target);

    assert!(report.status.is_optimal());
    assert!(report.iterations < Config::default().max_iterations);

    let single = Monolithic::solve(
        graph,
        instance.source,
        instance.target,
        TieBreak::default(),
        &mut MicroLpOracle::new(),
    )
    .unwrap();
    assert!(
        (report.upper_bound - single.objective).abs() < 1e-4,
        "decomposition {} vs single-level {}",
        report.upper_bound,
        single.objective
    );
    assert!((report.objective() - report.upper_bound).abs() < 1e-4);
}

#[test]
fn reports_serialize_to_json() {
    let report = solve(&diamond(), 0, 3);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "optimal");
    assert_eq!(json["path"]["path"]["nodes"], serde_json::json!([0, 1, 3]));
    assert_eq!(
        json["trajectory"].as_array().unwrap().len() as u64,
        report.iterations
    );
}
