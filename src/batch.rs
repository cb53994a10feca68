use log::info;
use rayon::prelude::*;

use crate::{
    benders::{self, Config, Report},
    error::Result,
    graph::{Graph, NodeIndex},
    oracle::Oracle,
};

/// Solves independent `(source, target)` queries on a shared graph in parallel.
///
/// Every query gets its own oracle from `make_oracle`, its own cuts and its own bounds.
/// Results are returned in query order.
pub fn solve_all<O, F>(
    graph: &Graph,
    queries: &[(NodeIndex, NodeIndex)],
    config: &Config,
    make_oracle: F,
) -> Vec<Result<Report>>
where
    O: Oracle,
    F: Fn() -> O + Sync,
{
    info!("Solving {} queries in parallel", queries.len());
    queries
        .par_iter()
        .map(|&(source, target)| {
            benders::solve(graph, source, target, config.clone(), make_oracle())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, graph::Arc, oracle::MicroLpOracle};

    #[test]
    fn queries_are_independent() {
        let graph = Graph::new(
            4,
            vec![
                Arc::new(0, 1, 1.0, 5.0),
                Arc::new(1, 3, 1.0, 5.0),
                Arc::new(0, 2, 2.0, 2.0),
                Arc::new(2, 3, 1.0, 10.0),
            ],
        )
        .unwrap();
        let queries = [
            (NodeIndex(0), NodeIndex(3)),
            (NodeIndex(3), NodeIndex(0)),
            (NodeIndex(0), NodeIndex(1)),
        ];

        let results = solve_all(&graph, &queries, &Config::default(), MicroLpOracle::new);
        assert_eq!(results.len(), 3);

        let first = results[0].as_ref().unwrap();
        assert!((first.objective() - 7.0).abs() < 1e-6);
        assert!(matches!(results[1], Err(Error::NoPathExists { .. })));
        // A single path has no regret
        assert!(results[2].as_ref().unwrap().objective().abs() < 1e-6);
    }
}
