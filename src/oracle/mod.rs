//! A small, solver-independent description of mixed integer linear programs, and the
//! contract every solver backend fulfils.

use std::time::Duration;

use derive_more::{Deref, Display, From, Into};
use typed_index_collections::TiVec;

#[cfg(feature = "gurobi")]
pub mod gurobi;
pub mod microlp;

#[cfg(feature = "gurobi")]
pub use self::gurobi::GurobiOracle;
pub use self::microlp::MicroLpOracle;

/// Tolerance used when checking integrality and constraint satisfaction of oracle solutions
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

#[derive(Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct VarIndex(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    Binary,
    Continuous { lower: f64, upper: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    /// The objective coefficient
    pub objective: f64,
}

impl Variable {
    pub fn bounds(&self) -> (f64, f64) {
        match self.kind {
            VarKind::Binary => (0.0, 1.0),
            VarKind::Continuous { lower, upper } => (lower, upper),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.kind, VarKind::Binary)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    #[display(fmt = "<=")]
    Le,
    #[display(fmt = ">=")]
    Ge,
    #[display(fmt = "==")]
    Eq,
}

/// A linear expression `Σ c_i v_i`. Each variable occurs at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(VarIndex, f64)>,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `coef * var`, merging with an existing term for the same variable
    pub fn add(&mut self, var: VarIndex, coef: f64) -> &mut Self {
        match self.terms.iter_mut().find(|(v, _)| *v == var) {
            Some((_, c)) => *c += coef,
            None => self.terms.push((var, coef)),
        }
        self
    }

    pub fn terms(&self) -> &[(VarIndex, f64)] {
        &self.terms
    }

    pub fn evaluate(&self, values: &TiVec<VarIndex, f64>) -> f64 {
        self.terms.iter().map(|&(v, c)| c * values[v]).sum()
    }
}

impl FromIterator<(VarIndex, f64)> for LinExpr {
    fn from_iter<T: IntoIterator<Item = (VarIndex, f64)>>(iter: T) -> Self {
        let mut expr = LinExpr::new();
        for (var, coef) in iter {
            expr.add(var, coef);
        }
        expr
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn is_satisfied(&self, values: &TiVec<VarIndex, f64>, eps: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + eps,
            Sense::Ge => lhs >= self.rhs - eps,
            Sense::Eq => (lhs - self.rhs).abs() <= eps,
        }
    }
}

/// A minimisation program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub variables: TiVec<VarIndex, Variable>,
    pub constraints: Vec<Constraint>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, name: impl Into<String>, kind: VarKind, objective: f64) -> VarIndex {
        self.variables.push_and_get_key(Variable {
            name: name.into(),
            kind,
            objective,
        })
    }

    pub fn add_constr(&mut self, name: impl Into<String>, expr: LinExpr, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            expr,
            sense,
            rhs,
        });
    }

    pub fn var_count(&self) -> usize {
        self.variables.len()
    }

    pub fn objective_value(&self, values: &TiVec<VarIndex, f64>) -> f64 {
        self.variables
            .iter_enumerated()
            .map(|(v, var)| var.objective * values[v])
            .sum()
    }

    /// Whether `values` respects every bound, integrality requirement and constraint
    pub fn is_satisfied(&self, values: &TiVec<VarIndex, f64>, eps: f64) -> bool {
        let bounds = self.variables.iter_enumerated().all(|(v, var)| {
            let (lower, upper) = var.bounds();
            let x = values[v];
            let integral = !var.is_binary() || (x - x.round()).abs() <= eps;
            x >= lower - eps && x <= upper + eps && integral
        });

        bounds && self.constraints.iter().all(|c| c.is_satisfied(values, eps))
    }
}

/// The result of a completed oracle call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Optimal {
        objective: f64,
        values: TiVec<VarIndex, f64>,
    },
    Infeasible,
    Unbounded,
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum OracleError {
    #[display(fmt = "time limit reached")]
    Timeout,
    #[display(fmt = "{}", _0)]
    Failed(String),
}

impl std::error::Error for OracleError {}

/// A MILP solver that can take a complete `Program` and report its optimum.
///
/// Each call is independent: the oracle must not carry constraints over between calls.
pub trait Oracle {
    fn solve(&mut self, program: &Program) -> Result<Outcome, OracleError>;

    /// Bound the time spent in a single `solve` call. Backends without a time limit ignore this.
    fn set_time_limit(&mut self, _limit: Duration) {}

    fn name(&self) -> &str;
}

impl<O: Oracle + ?Sized> Oracle for &mut O {
    fn solve(&mut self, program: &Program) -> Result<Outcome, OracleError> {
        (**self).solve(program)
    }

    fn set_time_limit(&mut self, limit: Duration) {
        (**self).set_time_limit(limit)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn solve(&mut self, program: &Program) -> Result<Outcome, OracleError> {
        (**self).solve(program)
    }

    fn set_time_limit(&mut self, limit: Duration) {
        (**self).set_time_limit(limit)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expressions_merge_repeated_variables() {
        let mut program = Program::new();
        let x = program.add_var("x", VarKind::Binary, 1.0);
        let y = program.add_var("y", VarKind::Continuous { lower: -1.0, upper: 1.0 }, 0.0);

        let expr: LinExpr = [(x, 1.0), (y, 2.0), (x, 3.0)].into_iter().collect();
        assert_eq!(expr.terms(), &[(x, 4.0), (y, 2.0)]);

        let values: TiVec<VarIndex, f64> = vec![1.0, -0.5].into();
        assert_eq!(expr.evaluate(&values), 3.0);
        assert_eq!(program.objective_value(&values), 1.0);
    }

    #[test]
    fn satisfaction_checks_bounds_and_integrality() {
        let mut program = Program::new();
        let x = program.add_var("x", VarKind::Binary, 1.0);
        let y = program.add_var("y", VarKind::Continuous { lower: 0.0, upper: 2.0 }, 0.0);
        program.add_constr("c", [(x, 1.0), (y, 1.0)].into_iter().collect(), Sense::Ge, 1.5);

        assert!(program.is_satisfied(&vec![1.0, 0.5].into(), 1e-9));
        assert!(!program.is_satisfied(&vec![0.5, 1.0].into(), 1e-9));
        assert!(!program.is_satisfied(&vec![0.0, 1.0].into(), 1e-9));
        assert!(!program.is_satisfied(&vec![1.0, 3.0].into(), 1e-9));
    }
}
