use std::time::Duration;

use grb::prelude::*;
use log::{debug, trace};
use typed_index_collections::TiVec;

use super::{Oracle, OracleError, Outcome, Program, Sense, VarIndex, VarKind};

/// Solves programs with Gurobi. Every call builds a fresh model, single threaded and silent.
#[derive(Debug, Clone)]
pub struct GurobiOracle {
    time_limit: Duration,
}

impl GurobiOracle {
    pub fn new(time_limit: Duration) -> Self {
        GurobiOracle { time_limit }
    }

    fn build(&self, program: &Program) -> grb::Result<(Model, TiVec<VarIndex, Var>)> {
        let mut model = Model::new("robust_path")?;
        model.set_param(param::OutputFlag, 0)?;
        model.set_param(param::Threads, 1)?;
        model.set_param(param::TimeLimit, self.time_limit.as_secs_f64())?;
        // Tell infeasible and unbounded programs apart
        model.set_param(param::DualReductions, 0)?;

        let mut vars = TiVec::with_capacity(program.var_count());
        for var in &program.variables {
            let (vtype, lower, upper) = match var.kind {
                VarKind::Binary => (VarType::Binary, 0.0, 1.0),
                VarKind::Continuous { lower, upper } => (VarType::Continuous, lower, upper),
            };
            let empty = std::iter::empty();
            vars.push(model.add_var(&var.name, vtype, var.objective, lower, upper, empty)?);
        }

        for constraint in &program.constraints {
            let lhs = constraint
                .expr
                .terms()
                .iter()
                .map(|&(v, c)| c * vars[v])
                .grb_sum();
            let rhs = constraint.rhs;
            match constraint.sense {
                Sense::Le => model.add_constr(&constraint.name, c!(lhs <= rhs))?,
                Sense::Ge => model.add_constr(&constraint.name, c!(lhs >= rhs))?,
                Sense::Eq => model.add_constr(&constraint.name, c!(lhs == rhs))?,
            };
        }

        model.update()?;
        Ok((model, vars))
    }

    fn optimize(&self, program: &Program) -> grb::Result<Result<Outcome, OracleError>> {
        let (mut model, vars) = self.build(program)?;
        trace!(
            "Solving gurobi model with {} variables and {} constraints",
            vars.len(),
            program.constraints.len()
        );
        model.optimize()?;

        let status = model.status()?;
        debug!("Gurobi finished with status {:?}", status);
        let outcome = match status {
            Status::Optimal => {
                let objective = model.get_attr(attr::ObjVal)?;
                let values = model.get_obj_attr_batch(attr::X, vars.iter().copied())?;
                Ok(Outcome::Optimal {
                    objective,
                    values: values.into(),
                })
            }
            Status::Infeasible => Ok(Outcome::Infeasible),
            Status::Unbounded | Status::InfOrUnbd => Ok(Outcome::Unbounded),
            Status::TimeLimit => Err(OracleError::Timeout),
            other => Err(OracleError::Failed(format!("gurobi status {:?}", other))),
        };

        Ok(outcome)
    }
}

impl Default for GurobiOracle {
    fn default() -> Self {
        GurobiOracle::new(Duration::from_secs(1800))
    }
}

impl Oracle for GurobiOracle {
    fn solve(&mut self, program: &Program) -> Result<Outcome, OracleError> {
        self.optimize(program)
            .unwrap_or_else(|e| Err(OracleError::Failed(e.to_string())))
    }

    fn set_time_limit(&mut self, limit: Duration) {
        self.time_limit = limit;
    }

    fn name(&self) -> &str {
        "gurobi"
    }
}
