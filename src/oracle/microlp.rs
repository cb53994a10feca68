use ::microlp::{ComparisonOp, OptimizationDirection, Problem};
use log::trace;
use typed_index_collections::TiVec;

use super::{Oracle, OracleError, Outcome, Program, Sense, VarIndex, VarKind};

/// Solves programs with the pure Rust `microlp` branch-and-bound solver.
///
/// `microlp` has no time limit, so `set_time_limit` is a no-op.
#[derive(Debug, Default, Clone)]
pub struct MicroLpOracle {
    calls: usize,
}

impl MicroLpOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of programs solved so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Oracle for MicroLpOracle {
    fn solve(&mut self, program: &Program) -> Result<Outcome, OracleError> {
        self.calls += 1;

        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let vars: TiVec<VarIndex, _> = program
            .variables
            .iter()
            .map(|var| match var.kind {
                VarKind::Binary => problem.add_binary_var(var.objective),
                VarKind::Continuous { lower, upper } => {
                    problem.add_var(var.objective, (lower, upper))
                }
            })
            .collect();

        for constraint in &program.constraints {
            let op = match constraint.sense {
                Sense::Le => ComparisonOp::Le,
                Sense::Ge => ComparisonOp::Ge,
                Sense::Eq => ComparisonOp::Eq,
            };
            let expr = constraint
                .expr
                .terms()
                .iter()
                .map(|&(v, c)| (vars[v], c))
                .collect::<Vec<_>>();
            problem.add_constraint(expr, op, constraint.rhs);
        }

        trace!(
            "microlp call {}: {} variables, {} constraints",
            self.calls,
            program.var_count(),
            program.constraints.len()
        );

        match problem.solve() {
            Ok(solution) => {
                let values = vars.iter().map(|&v| *solution.var_value(v)).collect();
                Ok(Outcome::Optimal {
                    objective: solution.objective(),
                    values,
                })
            }
            Err(::microlp::Error::Infeasible) => Ok(Outcome::Infeasible),
            Err(::microlp::Error::Unbounded) => Ok(Outcome::Unbounded),
            Err(::microlp::Error::InternalError(reason)) => Err(OracleError::Failed(reason)),
            #[allow(unreachable_patterns)]
            Err(other) => Err(OracleError::Failed(other.to_string())),
        }
    }

    fn name(&self) -> &str {
        "microlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::LinExpr;

    #[test]
    fn solves_a_small_mip() {
        // min -2x - y  s.t.  x + y <= 1.5,  x binary,  0 <= y <= 1
        let mut program = Program::new();
        let x = program.add_var("x", VarKind::Binary, -2.0);
        let y = program.add_var("y", VarKind::Continuous { lower: 0.0, upper: 1.0 }, -1.0);
        program.add_constr("c", [(x, 1.0), (y, 1.0)].into_iter().collect(), Sense::Le, 1.5);

        let mut oracle = MicroLpOracle::new();
        match oracle.solve(&program).unwrap() {
            Outcome::Optimal { objective, values } => {
                assert!((objective + 2.5).abs() < 1e-6);
                assert!((values[x] - 1.0).abs() < 1e-6);
                assert!((values[y] - 0.5).abs() < 1e-6);
                assert!(program.is_satisfied(&values, 1e-6));
            }
            other => panic!("expected an optimum, got {:?}", other),
        }
        assert_eq!(oracle.calls(), 1);
    }

    #[test]
    fn reports_infeasibility() {
        let mut program = Program::new();
        let x = program.add_var("x", VarKind::Binary, 1.0);
        let mut expr = LinExpr::new();
        expr.add(x, 1.0);
        program.add_constr("c", expr, Sense::Ge, 2.0);

        assert_eq!(MicroLpOracle::new().solve(&program), Ok(Outcome::Infeasible));
    }
}
