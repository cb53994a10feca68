use log::{debug, trace};
use typed_index_collections::TiVec;

use crate::{
    cuts::CutStore,
    error::Result,
    graph::{ArcIndex, Cost, Graph, NodeIndex},
    models::{
        solve_with_retry,
        utils::{flow_conservation, AddVars, ConvertVars},
    },
    oracle::{LinExpr, Oracle, Program, Sense, VarIndex, VarKind},
    scenario::Scenario,
};

pub struct Variables {
    /// `y[a] = 1` if arc `a` is put at its upper bound
    pub y: TiVec<ArcIndex, VarIndex>,
    /// Estimate of the shortest distance under the chosen scenario
    pub eta: VarIndex,
}

#[derive(Debug, Clone)]
pub struct MasterSolution {
    pub scenario: Scenario,
    /// `Σ u·Y − η`, a lower bound on the optimal regret
    pub objective: Cost,
    pub eta: Cost,
}

/// The relaxed master problem: choose a unit `s -> t` flow `Y` minimising its worst-case cost
/// minus the largest shortest-distance estimate `η` the cuts allow.
pub struct MasterProblem<'g, O> {
    graph: &'g Graph,
    source: NodeIndex,
    target: NodeIndex,
    oracle: O,
}

impl<'g, O: Oracle> MasterProblem<'g, O> {
    pub fn new(graph: &'g Graph, source: NodeIndex, target: NodeIndex, oracle: O) -> Self {
        MasterProblem {
            graph,
            source,
            target,
            oracle,
        }
    }

    /// Builds the full master program with every cut of the store.
    pub fn build(&self, cuts: &CutStore) -> (Program, Variables) {
        trace!("Building master problem with {} cuts", cuts.len());
        let graph = self.graph;
        let mut program = Program::new();

        let y: TiVec<ArcIndex, VarIndex> = graph.arc_count().binary(&mut program, "y").into();
        for (a, arc) in graph.arcs() {
            program.variables[y[a]].objective = arc.upper;
        }

        // |cost| <= B on every simple path, so η stays bounded before the first cut
        let bound = graph.cost_magnitude();
        let eta = program.add_var(
            "eta",
            VarKind::Continuous {
                lower: -bound,
                upper: bound,
            },
            -1.0,
        );

        flow_conservation(&mut program, graph, &y, self.source, self.target);

        // η − Σ_{a ∈ P} (u_a − l_a) Y_a <= Σ_{a ∈ P} l_a
        for (k, cut) in cuts.iter().enumerate() {
            let mut expr = LinExpr::new();
            expr.add(eta, 1.0);
            for &a in cut.arcs() {
                let spread = graph.arc(a).spread();
                if spread != 0.0 {
                    expr.add(y[a], -spread);
                }
            }
            program.add_constr(format!("cut_{}", k), expr, Sense::Le, cut.constant(graph));
        }

        (program, Variables { y, eta })
    }

    /// Solves the master problem with all cuts in `cuts`.
    pub fn resolve(&mut self, cuts: &CutStore) -> Result<MasterSolution> {
        let (program, vars) = self.build(cuts);
        let (objective, values) = solve_with_retry(&mut self.oracle, &program)?;

        let y = vars.y.convert(&values);
        let scenario = Scenario::from_arcs(
            self.graph,
            y.iter_enumerated().filter(|(_, &v)| v > 0.5).map(|(a, _)| a),
        );
        let eta = vars.eta.convert(&values);

        debug!(
            "Master: objective {:.6}, eta {:.6}, {} arcs selected",
            objective,
            eta,
            scenario.selected_count()
        );

        Ok(MasterSolution {
            scenario,
            objective,
            eta,
        })
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cuts::Cut,
        graph::Arc,
        oracle::{MicroLpOracle, FEASIBILITY_TOLERANCE},
        scenario::Path,
    };

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
    fn program_layout() {
        let graph = diamond();
        let master = MasterProblem::new(&graph, NodeIndex(0), NodeIndex(3), MicroLpOracle::new());

        let mut cuts = CutStore::new();
        let path = Path::from_nodes(&graph, &[NodeIndex(0), NodeIndex(1), NodeIndex(3)]).unwrap();
        cuts.push(Cut::from_path(&path));

        let (program, vars) = master.build(&cuts);
        assert_eq!(program.var_count(), 5);
        assert_eq!(program.variables[vars.eta].bounds(), (-22.0, 22.0));
        // 4 flow rows and one cut
        assert_eq!(program.constraints.len(), 5);
        let cut = &program.constraints[4];
        assert_eq!(cut.rhs, 2.0);
        assert_eq!(
            cut.expr.terms(),
            &[(vars.eta, 1.0), (vars.y[ArcIndex(0)], -4.0), (vars.y[ArcIndex(1)], -4.0)]
        );
    }

    #[test]
    fn without_cuts_the_cheapest_worst_case_wins() {
        let graph = diamond();
        let mut master =
            MasterProblem::new(&graph, NodeIndex(0), NodeIndex(3), MicroLpOracle::new());
        let solution = master.resolve(&CutStore::new()).unwrap();

        // Σ u·Y = 10 on 0 -> 1 -> 3 against 12 on 0 -> 2 -> 3, and η sits at its bound of 22
        assert!((solution.objective - (10.0 - 22.0)).abs() < FEASIBILITY_TOLERANCE);
        assert!((solution.eta - 22.0).abs() < FEASIBILITY_TOLERANCE);
        assert!(solution.scenario.is_selected(ArcIndex(0)));
        assert!(solution.scenario.is_selected(ArcIndex(1)));
        assert_eq!(solution.scenario.selected_count(), 2);
    }
}
