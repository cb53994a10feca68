//! The Benders loop: alternate between the master problem, which proposes a worst-case
//! scenario, and the shortest path subproblem, which evaluates it and returns a cut.

use std::{
    path::Path as FsPath,
    time::{Duration, Instant},
};

use derive_more::Display;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize, Serializer};

use crate::{
    cuts::{Cut, CutStore},
    error::{Error, Result},
    graph::{Cost, Graph, NodeIndex},
    models::MasterProblem,
    oracle::Oracle,
    scenario::{Path, Scenario, TieBreak},
    subproblem,
    termination::{Stop, Termination},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper limit on master/subproblem round trips
    pub max_iterations: u64,
    /// Stop once `UB - LB` is at most this
    pub tolerance: Cost,
    /// Wall-clock limit for the whole run, in seconds
    pub time_limit: Option<f64>,
    /// Time limit handed to the oracle for every master solve, in seconds
    pub oracle_time_limit: f64,
    /// Accept instances with negative lower bounds
    pub allow_negative_bounds: bool,
    pub tie_break: TieBreak,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_iterations: 1000,
            tolerance: 1e-6,
            time_limit: None,
            oracle_time_limit: 1800.0,
            allow_negative_bounds: false,
            tie_break: TieBreak::default(),
        }
    }
}

impl Config {
    pub fn read(path: impl AsRef<FsPath>) -> Result<Config> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn termination(&self) -> Termination {
        Termination::from_limits(self.max_iterations, self.time_limit.map(seconds))
    }
}

/// Negative and NaN limits become zero, overly large ones unbounded
pub fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

/// The bounds after one iteration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundRecord {
    pub iteration: u64,
    pub master_objective: Cost,
    /// `None` if the target was not reached under the master's scenario
    pub subproblem_objective: Option<Cost>,
    pub lower: Cost,
    pub upper: Cost,
    pub cuts: usize,
}

#[derive(Debug, Display)]
pub enum Status {
    #[display(fmt = "optimal")]
    Optimal,
    #[display(fmt = "iteration limit exceeded")]
    IterationLimitExceeded,
    #[display(fmt = "time limit reached")]
    TimeLimitReached,
    #[display(fmt = "aborted: {}", _0)]
    Aborted(Error),
}

impl Status {
    pub fn is_optimal(&self) -> bool {
        matches!(self, Status::Optimal)
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A path together with the quantities that make up its regret
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegretPath {
    pub path: Path,
    /// Cost of the path with all of its arcs at their upper bound
    pub worst_case_cost: Cost,
    /// Shortest distance in the scenario where only the path's arcs are at their upper bound
    pub shortest_distance: Cost,
    pub regret: Cost,
}

impl RegretPath {
    pub fn new(graph: &Graph, path: Path) -> Result<Self> {
        let paths = subproblem::solve(graph, path.source(), &path.scenario(graph))?;
        let worst_case_cost = path.worst_case_cost(graph);
        let shortest_distance = paths.distance(path.target());
        Ok(RegretPath {
            path,
            worst_case_cost,
            shortest_distance,
            regret: worst_case_cost - shortest_distance,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub status: Status,
    pub lower_bound: Cost,
    pub upper_bound: Cost,
    /// The best path found, trimmed to a simple `s -> t` path
    pub path: Option<RegretPath>,
    pub iterations: u64,
    pub cuts: usize,
    pub elapsed: Duration,
    pub trajectory: Vec<BoundRecord>,
}

impl Report {
    pub fn gap(&self) -> Cost {
        self.upper_bound - self.lower_bound
    }

    /// The regret of the reported path, or the upper bound if there is none
    pub fn objective(&self) -> Cost {
        self.path.as_ref().map(|p| p.regret).unwrap_or(self.upper_bound)
    }

    /// Turns every status other than `Optimal` into the matching error
    pub fn into_result(self) -> Result<Report> {
        match self.status {
            Status::Optimal => Ok(self),
            Status::IterationLimitExceeded => {
                Err(Error::IterationLimitExceeded(self.iterations))
            }
            Status::TimeLimitReached => Err(Error::TimeLimitReached(self.iterations)),
            Status::Aborted(err) => Err(err),
        }
    }
}

pub struct Benders<'g, O> {
    graph: &'g Graph,
    source: NodeIndex,
    target: NodeIndex,
    config: Config,
    /// Overrides the limits in `config`
    termination: Option<Termination>,
    master: MasterProblem<'g, O>,
}

impl<'g, O: Oracle> Benders<'g, O> {
    /// Validates the query and sets up the decomposition.
    ///
    /// Fails with `InvalidInstance` on bad endpoints or forbidden negative bounds,
    /// `NegativeCycleDetected` if allowed negative bounds close a negative cycle anywhere, and
    /// `NoPathExists` if no `source -> target` path exists.
    pub fn new(
        graph: &'g Graph,
        source: NodeIndex,
        target: NodeIndex,
        config: Config,
        mut oracle: O,
    ) -> Result<Self> {
        validate(graph, source, target, &config)?;

        oracle.set_time_limit(seconds(config.oracle_time_limit));
        Ok(Benders {
            graph,
            source,
            target,
            config,
            termination: None,
            master: MasterProblem::new(graph, source, target, oracle),
        })
    }

    /// Replace the termination criteria derived from the config
    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = Some(termination);
        self
    }

    /// Runs the decomposition until the bounds meet, a limit is hit or an iteration fails.
    /// The report always carries the bounds and the best path found so far.
    pub fn solve(mut self) -> Report {
        let start = Instant::now();
        let (graph, source, target) = (self.graph, self.source, self.target);
        // Clocks start here, not when the solver was built
        let mut termination = self
            .termination
            .take()
            .unwrap_or_else(|| self.config.termination());

        let mut cuts = CutStore::new();
        let mut lower = Cost::NEG_INFINITY;
        let mut upper = Cost::INFINITY;
        let mut incumbent: Option<Scenario> = None;
        let mut trajectory = Vec::new();
        let mut iteration = 0;

        info!(
            "Solving {} -> {} on {} nodes and {} arcs with {}",
            source,
            target,
            graph.node_count(),
            graph.arc_count(),
            self.master.oracle().name()
        );

        let mut status = loop {
            iteration += 1;

            let master = match self.master.resolve(&cuts) {
                Ok(master) => master,
                Err(err) => break Status::Aborted(err),
            };
            lower = lower.max(master.objective);

            let paths = match subproblem::solve(graph, source, &master.scenario) {
                Ok(paths) => paths,
                Err(err) => break Status::Aborted(err),
            };

            let subproblem_objective = match paths.is_reachable(target) {
                true => Some(master.scenario.worst_case_cost(graph) - paths.distance(target)),
                false => {
                    warn!("Target {} unreachable under the master's scenario", target);
                    None
                }
            };
            if let Some(z) = subproblem_objective {
                if z < upper {
                    upper = z;
                    incumbent = Some(master.scenario.clone());
                }
            }

            trajectory.push(BoundRecord {
                iteration,
                master_objective: master.objective,
                subproblem_objective,
                lower,
                upper,
                cuts: cuts.len(),
            });
            info!(
                "Iteration {}: LB = {:.6}, UB = {:.6}, gap = {:.6}, cuts = {}",
                iteration,
                lower,
                upper,
                upper - lower,
                cuts.len()
            );

            if upper - lower <= self.config.tolerance {
                break Status::Optimal;
            }

            let cut = match Cut::from_shortest_paths(graph, &paths, target) {
                Some(cut) => cut,
                None => match fallback_cut(graph, source, target) {
                    Ok(cut) => cut,
                    Err(err) => break Status::Aborted(err),
                },
            };
            debug!("New cut over {} arcs", cut.arcs().len());

            if !cuts.push(cut) {
                // Re-proposed scenario: LB >= UB up to round-off
                warn!(
                    "Master re-proposed an explored scenario with gap {:.3e}, stopping",
                    upper - lower
                );
                break Status::Optimal;
            }

            match termination.check(iteration, upper - lower) {
                Some(Stop::Iterations) => break Status::IterationLimitExceeded,
                Some(Stop::Time) => break Status::TimeLimitReached,
                None => (),
            }
        };

        let tie_break = self.config.tie_break;
        let path = incumbent
            .and_then(|scenario| scenario.extract_path(graph, source, target, tie_break))
            .map(|path| RegretPath::new(graph, path))
            .transpose();

        let path = match path {
            Ok(path) => path,
            Err(err) => {
                if !matches!(status, Status::Aborted(_)) {
                    status = Status::Aborted(err);
                }
                None
            }
        };

        if let (Status::Optimal, Some(best)) = (&status, &path) {
            if (best.regret - upper).abs() > self.config.tolerance {
                warn!(
                    "Trimmed path has regret {:.6}, upper bound is {:.6}",
                    best.regret, upper
                );
            }
        }

        let report = Report {
            status,
            lower_bound: lower,
            upper_bound: upper,
            path,
            iterations: iteration,
            cuts: cuts.len(),
            elapsed: start.elapsed(),
            trajectory,
        };
        info!(
            "Finished with status {} after {} iterations in {:.3}s",
            report.status,
            report.iterations,
            report.elapsed.as_secs_f64()
        );
        report
    }
}

/// Validates the query and runs the decomposition in one go.
pub fn solve<O: Oracle>(
    graph: &Graph,
    source: NodeIndex,
    target: NodeIndex,
    config: Config,
    oracle: O,
) -> Result<Report> {
    Ok(Benders::new(graph, source, target, config, oracle)?.solve())
}

fn validate(graph: &Graph, source: NodeIndex, target: NodeIndex, config: &Config) -> Result<()> {
    for node in [source, target] {
        if !graph.contains(node) {
            return Err(Error::InvalidInstance(format!(
                "node {} is outside 0..{}",
                node,
                graph.node_count()
            )));
        }
    }
    if source == target {
        return Err(Error::InvalidInstance(format!(
            "source and target are both {}",
            source
        )));
    }
    if graph.has_negative_bounds() {
        if !config.allow_negative_bounds {
            return Err(Error::InvalidInstance(
                "negative cost bounds are not allowed".to_string(),
            ));
        }
        // A cycle that is negative at its upper bounds is negative at its lower bounds too
        subproblem::check_negative_cycles(graph, &Scenario::lower(graph))?;
    }
    if !config.tolerance.is_finite() || config.tolerance < 0.0 {
        return Err(Error::InvalidInstance(format!(
            "tolerance must be finite and non-negative, got {}",
            config.tolerance
        )));
    }

    let no_path = graph.out_arcs(source).is_empty() || graph.in_arcs(target).is_empty();
    if no_path || !graph.reaches(source, target) {
        return Err(Error::NoPathExists { source, target });
    }

    Ok(())
}

/// The shortest path under the all-lower scenario, used when no cut can be read off the tree
fn fallback_cut(graph: &Graph, source: NodeIndex, target: NodeIndex) -> Result<Cut> {
    let paths = subproblem::solve(graph, source, &Scenario::lower(graph))?;
    Cut::from_shortest_paths(graph, &paths, target).ok_or(Error::NoPathExists { source, target })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::Arc, oracle::MicroLpOracle};

    fn diamond() -> Graph {
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

    #[test]
    fn config_defaults_fill_missing_keys() {
        let config: Config =
            serde_json::from_str(r#"{"max_iterations": 5, "tie_break": "fewest-arcs"}"#).unwrap();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.tie_break, TieBreak::FewestArcs);
        assert_eq!(config.tolerance, Config::default().tolerance);
    }

    #[test]
    fn rejects_bad_queries() {
        let graph = diamond();
        let run = |s: usize, t: usize| {
            let config = Config::default();
            Benders::new(&graph, NodeIndex(s), NodeIndex(t), config, MicroLpOracle::new())
                .map(|_| ())
        };

        assert!(matches!(run(0, 0), Err(Error::InvalidInstance(_))));
        assert!(matches!(run(0, 4), Err(Error::InvalidInstance(_))));
        assert!(matches!(run(3, 0), Err(Error::NoPathExists { .. })));
        assert!(matches!(run(1, 2), Err(Error::NoPathExists { .. })));
    }

    #[test]
    fn negative_bounds_need_opting_in() {
        let arcs = vec![Arc::new(0, 1, -1.0, 1.0), Arc::new(1, 2, 1.0, 2.0)];
        let graph = Graph::new(3, arcs).unwrap();
        let (s, t) = (NodeIndex(0), NodeIndex(2));
        let result = Benders::new(&graph, s, t, Config::default(), MicroLpOracle::new());
        assert!(matches!(result, Err(Error::InvalidInstance(_))));

        let config = Config {
            allow_negative_bounds: true,
            ..Config::default()
        };
        let report = solve(&graph, s, t, config, MicroLpOracle::new()).unwrap();
        assert!(report.status.is_optimal());
        assert!(report.objective().abs() < 1e-6);
    }

    #[test]
    fn negative_cycles_off_the_path_are_rejected() {
        // 2 <-> 3 is a negative cycle that 0 can not reach
        let graph = Graph::new(
            4,
            vec![
                Arc::new(0, 1, 1.0, 3.0),
                Arc::new(2, 3, -1.0, -1.0),
                Arc::new(3, 2, -1.0, -1.0),
            ],
        )
        .unwrap();
        let config = Config {
            allow_negative_bounds: true,
            ..Config::default()
        };
        let result = solve(&graph, NodeIndex(0), NodeIndex(1), config, MicroLpOracle::new());
        assert!(matches!(result, Err(Error::NegativeCycleDetected)));
    }

    #[test]
    fn time_limit_counts_from_solve() {
        let graph = diamond();
        let config = Config {
            time_limit: Some(0.5),
            ..Config::default()
        };
        let benders =
            Benders::new(&graph, NodeIndex(0), NodeIndex(3), config, MicroLpOracle::new()).unwrap();
        std::thread::sleep(Duration::from_millis(600));

        let report = benders.solve();
        assert!(report.status.is_optimal(), "{}", report.status);
    }

    #[test]
    fn diamond_regret() {
        let graph = diamond();
        let config = Config::default();
        let report =
            solve(&graph, NodeIndex(0), NodeIndex(3), config, MicroLpOracle::new()).unwrap();

        assert!(report.status.is_optimal());
        assert!((report.objective() - 7.0).abs() < 1e-6);
        let best = report.path.as_ref().unwrap();
        assert_eq!(best.path.nodes(), &[NodeIndex(0), NodeIndex(1), NodeIndex(3)]);
        assert_eq!(best.worst_case_cost, 10.0);
        assert_eq!(best.shortest_distance, 3.0);
        assert_eq!(report.trajectory.len() as u64, report.iterations);
        assert!(report.gap() <= 1e-6);
    }

    #[test]
    fn iteration_limit_keeps_the_incumbent() {
        let graph = diamond();
        let config = Config::default();
        let report = Benders::new(&graph, NodeIndex(0), NodeIndex(3), config, MicroLpOracle::new())
            .unwrap()
            .with_termination(Termination::Iterations(1))
            .solve();

        // One iteration can not close the gap: η starts at its bound
        assert!(matches!(report.status, Status::IterationLimitExceeded));
        assert_eq!(report.iterations, 1);
        assert!(report.path.is_some());
        assert!(report.upper_bound.is_finite());
        assert!(matches!(report.into_result(), Err(Error::IterationLimitExceeded(1))));
    }
}
