pub mod master;
pub mod monolithic;
pub mod utils;

pub use master::{MasterProblem, MasterSolution};
pub use monolithic::{Monolithic, MonolithicSolution};

use log::warn;
use typed_index_collections::TiVec;

use crate::{
    error::{Error, Result},
    oracle::{Oracle, OracleError, Outcome, Program, VarIndex},
};

/// Solves `program` with `oracle`, retrying once if the oracle times out or fails.
/// Returns the optimal objective and variable values.
pub(crate) fn solve_with_retry<O: Oracle>(
    oracle: &mut O,
    program: &Program,
) -> Result<(f64, TiVec<VarIndex, f64>)> {
    let outcome = match oracle.solve(program) {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            warn!("{} failed ({}), retrying once", oracle.name(), err);
            oracle.solve(program)
        }
    };

    match outcome {
        Ok(Outcome::Optimal { objective, values }) => Ok((objective, values)),
        Ok(Outcome::Infeasible) => Err(Error::MasterInfeasible),
        Ok(Outcome::Unbounded) => Err(Error::MasterUnbounded),
        Err(OracleError::Timeout) => Err(Error::SolverTimeout),
        Err(OracleError::Failed(reason)) => Err(Error::SolverError(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{LinExpr, Sense, VarKind};

    /// Fails a fixed number of times before delegating to microlp
    struct Flaky {
        failures: usize,
        inner: crate::oracle::MicroLpOracle,
    }

    impl Oracle for Flaky {
        fn solve(&mut self, program: &Program) -> std::result::Result<Outcome, OracleError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(OracleError::Timeout);
            }
            self.inner.solve(program)
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn program() -> Program {
        let mut program = Program::new();
        let x = program.add_var("x", VarKind::Binary, 1.0);
        let mut expr = LinExpr::new();
        expr.add(x, 1.0);
        program.add_constr("c", expr, Sense::Ge, 1.0);
        program
    }

    #[test]
    fn a_single_timeout_is_retried() {
        let mut oracle = Flaky {
            failures: 1,
            inner: Default::default(),
        };
        let (objective, _) = solve_with_retry(&mut oracle, &program()).unwrap();
        assert!((objective - 1.0).abs() < 1e-9);
    }

    #[test]
    fn repeated_timeouts_are_surfaced() {
        let mut oracle = Flaky {
            failures: 2,
            inner: Default::default(),
        };
        assert!(matches!(
            solve_with_retry(&mut oracle, &program()),
            Err(Error::SolverTimeout)
        ));
    }
}
