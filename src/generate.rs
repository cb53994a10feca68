use std::ops::Range;

use log::{debug, trace};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::{
    error::{Error, Result},
    graph::{Arc, Cost, Graph, Instance, NodeIndex},
};

/// Parameters for random interval-cost instances
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub nodes: usize,
    pub source: usize,
    pub target: usize,
    /// Integer lower bounds are drawn uniformly from this range
    pub lower: Range<Cost>,
    /// Integer upper bounds are drawn uniformly from this range and raised to the lower bound
    /// if below it
    pub upper: Range<Cost>,
    /// Probability of keeping each ordered pair `(i, j)` as an arc
    pub density: f64,
    /// Sentinel written for missing arcs
    pub no_arc: Cost,
    pub seed: u64,
    /// Add a `source -> target` chain through a few random intermediate nodes, so that a path
    /// always exists
    pub backbone: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            nodes: 100,
            source: 0,
            target: 4,
            lower: 1.0..10.0,
            upper: 20.0..30.0,
            density: 0.1,
            no_arc: 10000.0,
            seed: 1234,
            backbone: true,
        }
    }
}

fn draw(rng: &mut StdRng, range: &Range<Cost>) -> Cost {
    let (lo, hi) = (range.start.ceil() as i64, range.end.ceil() as i64);
    match lo < hi {
        true => rng.gen_range(lo..hi) as Cost,
        false => lo as Cost,
    }
}

fn interval(rng: &mut StdRng, config: &GeneratorConfig) -> (Cost, Cost) {
    let lower = draw(rng, &config.lower);
    let upper = draw(rng, &config.upper).max(lower);
    (lower, upper)
}

/// Generates a random instance. The same config always gives the same instance.
pub fn generate(config: &GeneratorConfig) -> Result<Instance> {
    let n = config.nodes;
    if config.source >= n || config.target >= n || config.source == config.target {
        return Err(Error::InvalidInstance(format!(
            "source {} and target {} must be distinct nodes of 0..{}",
            config.source, config.target, n
        )));
    }
    if !(0.0..=1.0).contains(&config.density) {
        return Err(Error::InvalidInstance(format!(
            "density {} is not a probability",
            config.density
        )));
    }
    if config.lower.end > config.no_arc || config.upper.end > config.no_arc {
        return Err(Error::InvalidInstance(format!(
            "cost ranges must stay below the no-arc sentinel {}",
            config.no_arc
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut keep = vec![vec![false; n]; n];
    for (i, row) in keep.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = i != j && rng.gen_bool(config.density);
        }
    }

    if config.backbone {
        let mut middle = (0..n)
            .filter(|&v| v != config.source && v != config.target)
            .collect::<Vec<_>>();
        middle.shuffle(&mut rng);
        let hops = middle.len().min(3);

        let chain = std::iter::once(config.source)
            .chain(middle.into_iter().take(hops))
            .chain(std::iter::once(config.target))
            .collect::<Vec<_>>();
        trace!("Backbone {:?}", chain);
        for pair in chain.windows(2) {
            keep[pair[0]][pair[1]] = true;
        }
    }

    let mut arcs = Vec::new();
    for i in 0..n {
        for j in 0..n {
            if keep[i][j] {
                let (lower, upper) = interval(&mut rng, config);
                arcs.push(Arc::new(i, j, lower, upper));
            }
        }
    }

    debug!("Generated {} arcs on {} nodes", arcs.len(), n);
    Ok(Instance {
        source: NodeIndex(config.source),
        target: NodeIndex(config.target),
        no_arc: config.no_arc,
        graph: Graph::new(n, arcs)?,
    })
}
