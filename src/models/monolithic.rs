use log::{debug, trace};
use typed_index_collections::TiVec;

use crate::{
    error::Result,
    graph::{ArcIndex, Cost, Graph, NodeIndex},
    models::{
        solve_with_retry,
        utils::{flow_conservation, AddVars, ConvertVars},
    },
    oracle::{LinExpr, Oracle, Program, Sense, VarIndex, VarKind},
    scenario::{Path, Scenario, TieBreak},
};

pub struct Variables {
    pub y: TiVec<ArcIndex, VarIndex>,
    /// Node potentials, the shortest distance from the source under the scenario `y`
    pub x: TiVec<NodeIndex, VarIndex>,
}

#[derive(Debug, Clone)]
pub struct MonolithicSolution {
    pub objective: Cost,
    pub scenario: Scenario,
    pub path: Option<Path>,
}

/// The single-level formulation, with the shortest path subproblem replaced by its dual:
///
/// ```text
/// min  Σ u·Y − x_t
/// s.t. flow conservation on Y
///      x_j − x_i − (u_ij − l_ij)·Y_ij <= l_ij   for every arc (i, j)
///      x_s = 0
/// ```
pub struct Monolithic;

impl Monolithic {
    pub fn build(graph: &Graph, source: NodeIndex, target: NodeIndex) -> (Program, Variables) {
        trace!("Building single-level model");
        let mut program = Program::new();

        let y: TiVec<ArcIndex, VarIndex> = graph.arc_count().binary(&mut program, "y").into();
        for (a, arc) in graph.arcs() {
            program.variables[y[a]].objective = arc.upper;
        }

        let x: TiVec<NodeIndex, VarIndex> = graph.node_count().free(&mut program, "x").into();
        program.variables[x[source]].kind = VarKind::Continuous { lower: 0.0, upper: 0.0 };
        program.variables[x[target]].objective = -1.0;

        flow_conservation(&mut program, graph, &y, source, target);

        for (a, arc) in graph.arcs() {
            let mut expr = LinExpr::new();
            expr.add(x[arc.to], 1.0).add(x[arc.from], -1.0);
            if arc.spread() != 0.0 {
                expr.add(y[a], -arc.spread());
            }
            program.add_constr(format!("dual_{}_{}", arc.from, arc.to), expr, Sense::Le, arc.lower);
        }

        (program, Variables { y, x })
    }

    pub fn solve<O: Oracle>(
        graph: &Graph,
        source: NodeIndex,
        target: NodeIndex,
        tie_break: TieBreak,
        oracle: &mut O,
    ) -> Result<MonolithicSolution> {
        let (program, vars) = Monolithic::build(graph, source, target);
        let (objective, values) = solve_with_retry(oracle, &program)?;

        let y = vars.y.convert(&values);
        let scenario = Scenario::from_arcs(
            graph,
            y.iter_enumerated().filter(|(_, &v)| v > 0.5).map(|(a, _)| a),
        );
        let path = scenario.extract_path(graph, source, target, tie_break);
        debug!("Single-level objective {:.6}", objective);

        Ok(MonolithicSolution {
            objective,
            scenario,
            path,
        })
    }
}
