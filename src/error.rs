use derive_more::Display;

use crate::graph::NodeIndex;

/// Everything that can go wrong while building an instance or running the decomposition.
#[derive(Debug, Display)]
pub enum Error {
    /// Malformed bounds, out-of-range node indices, `source == target`, ...
    #[display(fmt = "invalid instance: {}", _0)]
    InvalidInstance(String),
    /// The queried arc does not exist in the graph
    #[display(fmt = "no arc from {} to {}", from, to)]
    NoSuchArc { from: NodeIndex, to: NodeIndex },
    /// The target can not be reached from the source using any arc
    #[display(fmt = "no path from {} to {}", source, target)]
    NoPathExists { source: NodeIndex, target: NodeIndex },
    /// The oracle reported the master problem to be infeasible
    #[display(fmt = "master problem is infeasible")]
    MasterInfeasible,
    /// The oracle reported the master problem to be unbounded
    #[display(fmt = "master problem is unbounded")]
    MasterUnbounded,
    /// Bellman-Ford relaxation did not settle after `N - 1` passes
    #[display(fmt = "negative cycle detected in the scenario cost graph")]
    NegativeCycleDetected,
    /// The oracle hit its time limit twice in a row
    #[display(fmt = "solver oracle timed out")]
    SolverTimeout,
    /// The oracle failed for some other reason
    #[display(fmt = "solver oracle failed: {}", _0)]
    SolverError(String),
    /// The configured number of iterations was used up before the bounds met
    #[display(fmt = "iteration limit of {} exceeded", _0)]
    IterationLimitExceeded(u64),
    /// The wall-clock limit was reached before the bounds met
    #[display(fmt = "time limit reached after {} iterations", _0)]
    TimeLimitReached(u64),
    #[display(fmt = "io error: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "json error: {}", _0)]
    Json(serde_json::Error),
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
