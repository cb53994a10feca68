use typed_index_collections::TiVec;

use crate::{
    graph::{ArcIndex, Graph, NodeIndex},
    oracle::{LinExpr, Program, Sense, VarIndex, VarKind},
};

pub trait AddVars {
    type Out;

    /// Create a variable of any kind, with objective coefficient 0
    fn vars(&self, program: &mut Program, base_name: &str, kind: VarKind) -> Self::Out;

    /// Binary variables
    fn binary(&self, program: &mut Program, base_name: &str) -> Self::Out {
        self.vars(program, base_name, VarKind::Binary)
    }

    /// A free continuous variable
    fn free(&self, program: &mut Program, base_name: &str) -> Self::Out {
        self.vars(
            program,
            base_name,
            VarKind::Continuous {
                lower: f64::NEG_INFINITY,
                upper: f64::INFINITY,
            },
        )
    }
}

impl AddVars for usize {
    type Out = Vec<VarIndex>;

    fn vars(&self, program: &mut Program, base_name: &str, kind: VarKind) -> Self::Out {
        (0..*self)
            .map(|i| program.add_var(format!("{}_{}", base_name, i), kind, 0.0))
            .collect()
    }
}

/// Trait that reads variable values out of an oracle solution
pub trait ConvertVars {
    type Out;
    fn convert(&self, values: &TiVec<VarIndex, f64>) -> Self::Out;
}

impl<T: ConvertVars> ConvertVars for Vec<T> {
    type Out = Vec<T::Out>;

    fn convert(&self, values: &TiVec<VarIndex, f64>) -> Self::Out {
        self.iter().map(|e| e.convert(values)).collect()
    }
}

impl<K, T: ConvertVars> ConvertVars for TiVec<K, T> {
    type Out = TiVec<K, T::Out>;

    fn convert(&self, values: &TiVec<VarIndex, f64>) -> Self::Out {
        self.iter().map(|e| e.convert(values)).collect()
    }
}

impl ConvertVars for VarIndex {
    type Out = f64;

    fn convert(&self, values: &TiVec<VarIndex, f64>) -> Self::Out {
        values[*self]
    }
}

/// Adds `Σ_out y − Σ_in y = b_i` for every node, with `b = 1` at the source, `-1` at the target
/// and 0 elsewhere.
pub fn flow_conservation(
    program: &mut Program,
    graph: &Graph,
    y: &TiVec<ArcIndex, VarIndex>,
    source: NodeIndex,
    target: NodeIndex,
) {
    for node in graph.nodes() {
        let outflow = graph.out_arcs(node).iter().map(|&a| (y[a], 1.0));
        let inflow = graph.in_arcs(node).iter().map(|&a| (y[a], -1.0));
        let expr: LinExpr = outflow.chain(inflow).collect();

        let rhs = match node {
            n if n == source => 1.0,
            n if n == target => -1.0,
            _ => 0.0,
        };

        // Isolated nodes would give the empty constraint 0 == 0
        if expr.terms().is_empty() && rhs == 0.0 {
            continue;
        }

        program.add_constr(format!("flow_{}", node), expr, Sense::Eq, rhs);
    }
}
