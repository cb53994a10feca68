use std::{ops::Range, path::PathBuf, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use robust_path::{
    batch,
    benders::{self, Benders, Config, Report},
    generate::{generate, GeneratorConfig},
    graph::{Cost, Instance, NodeIndex},
    models::Monolithic,
    oracle::{MicroLpOracle, Oracle},
    parse::parse_range,
    scenario::TieBreak,
    termination::Termination,
};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Min-max regret shortest paths with interval arc costs",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a random instance to a JSON file
    Generate {
        #[arg(short, long, default_value_t = 100)]
        nodes: usize,
        /// Integer lower bounds, drawn from lo..hi
        #[arg(long, default_value = "1..10", value_parser = parse_range)]
        lower: Range<Cost>,
        /// Integer upper bounds, drawn from lo..hi
        #[arg(long, default_value = "20..30", value_parser = parse_range)]
        upper: Range<Cost>,
        /// Probability of keeping each arc
        #[arg(short, long, default_value_t = 0.1)]
        density: f64,
        #[arg(long, default_value_t = 10000.0)]
        no_arc: Cost,
        #[arg(long, default_value_t = 1234)]
        seed: u64,
        #[arg(short, long, default_value_t = 0)]
        source: usize,
        #[arg(short, long, default_value_t = 4)]
        target: usize,
        /// Do not force a source -> target chain
        #[arg(long)]
        no_backbone: bool,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Solve an instance by Benders decomposition
    Solve {
        file: PathBuf,
        /// JSON file with solver settings; flags override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        max_iterations: Option<u64>,
        #[arg(long)]
        tolerance: Option<f64>,
        /// Wall-clock limit in seconds
        #[arg(long)]
        time_limit: Option<f64>,
        /// Termination criteria in RPN, e.g. "1000 iterations 60 timeout |"
        #[arg(long)]
        termination: Option<String>,
        #[arg(long)]
        tie_break: Option<TieBreak>,
        #[arg(long, value_enum, default_value_t = Backend::Microlp)]
        oracle: Backend,
        /// Additional `s:t` queries, solved in parallel with the instance's own
        #[arg(long, value_parser = parse_query)]
        query: Vec<(usize, usize)>,
        /// Also solve the single-level formulation and compare objectives
        #[arg(long)]
        crosscheck: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Microlp,
    Gurobi,
}

type OracleFactory = fn(Duration) -> Box<dyn Oracle>;

impl Backend {
    fn factory(self) -> Result<OracleFactory, String> {
        match self {
            Backend::Microlp => Ok(microlp_oracle),
            Backend::Gurobi => gurobi_factory(),
        }
    }
}

fn microlp_oracle(_: Duration) -> Box<dyn Oracle> {
    Box::new(MicroLpOracle::new())
}

#[cfg(feature = "gurobi")]
fn gurobi_factory() -> Result<OracleFactory, String> {
    fn gurobi_oracle(limit: Duration) -> Box<dyn Oracle> {
        Box::new(robust_path::oracle::GurobiOracle::new(limit))
    }
    Ok(gurobi_oracle)
}

#[cfg(not(feature = "gurobi"))]
fn gurobi_factory() -> Result<OracleFactory, String> {
    Err("built without the `gurobi` feature".to_string())
}

fn parse_query(s: &str) -> Result<(usize, usize), String> {
    let (source, target) = s
        .split_once(':')
        .ok_or_else(|| format!("expected `s:t`, got `{}`", s))?;
    let source = source.trim().parse().map_err(|e| format!("{}", e))?;
    let target = target.trim().parse().map_err(|e| format!("{}", e))?;
    Ok((source, target))
}

fn print_report(report: &Report) {
    println!("status: {}", report.status);
    println!("objective: {}", report.objective());
    match &report.path {
        Some(best) => {
            println!("path: {}", best.path);
            println!(
                "worst-case cost: {}, shortest distance: {}, regret: {}",
                best.worst_case_cost, best.shortest_distance, best.regret
            );
        }
        None => println!("path: none"),
    }
    println!(
        "bounds: [{}, {}], gap: {}",
        report.lower_bound,
        report.upper_bound,
        report.gap()
    );
    println!(
        "iterations: {}, cuts: {}, elapsed: {:.3}s",
        report.iterations,
        report.cuts,
        report.elapsed.as_secs_f64()
    );
    for record in &report.trajectory {
        println!(
            "{:>6}: LB = {:>12.4}  UB = {:>12.4}  master = {:>12.4}",
            record.iteration, record.lower, record.upper, record.master_objective
        );
    }
}

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Generate {
            nodes,
            lower,
            upper,
            density,
            no_arc,
            seed,
            source,
            target,
            no_backbone,
            output,
        } => {
            let config = GeneratorConfig {
                nodes,
                source,
                target,
                lower,
                upper,
                density,
                no_arc,
                seed,
                backbone: !no_backbone,
            };
            let instance = generate(&config)?;
            instance.write(&output)?;
            println!(
                "wrote {} nodes and {} arcs to {}",
                instance.graph.node_count(),
                instance.graph.arc_count(),
                output.display()
            );
        }
        Command::Solve {
            file,
            config,
            max_iterations,
            tolerance,
            time_limit,
            termination,
            tie_break,
            oracle: backend,
            query,
            crosscheck,
            json,
        } => {
            let instance = Instance::read(&file)?;
            let mut config = match config {
                Some(path) => Config::read(path)?,
                None => Config::default(),
            };
            config.max_iterations = max_iterations.unwrap_or(config.max_iterations);
            config.tolerance = tolerance.unwrap_or(config.tolerance);
            config.time_limit = time_limit.or(config.time_limit);
            config.tie_break = tie_break.unwrap_or(config.tie_break);
            info!("Using {:?}", config);

            let graph = &instance.graph;
            let make_oracle = backend.factory()?;
            let limit = benders::seconds(config.oracle_time_limit);
            let mut solver = Benders::new(
                graph,
                instance.source,
                instance.target,
                config.clone(),
                make_oracle(limit),
            )?;
            if let Some(rpn) = termination {
                solver = solver.with_termination(Termination::try_from(rpn.as_str())?);
            }
            let report = solver.solve();

            match json {
                true => println!("{}", serde_json::to_string_pretty(&report)?),
                false => print_report(&report),
            }

            if crosscheck {
                let single = Monolithic::solve(
                    graph,
                    instance.source,
                    instance.target,
                    config.tie_break,
                    &mut make_oracle(limit),
                )?;
                println!(
                    "decomposition: {}, single-level: {}",
                    report.objective(),
                    single.objective
                );
            }

            if !query.is_empty() {
                let queries = query
                    .into_iter()
                    .map(|(s, t)| (NodeIndex(s), NodeIndex(t)))
                    .collect::<Vec<_>>();
                let results = batch::solve_all(graph, &queries, &config, || make_oracle(limit));
                for ((s, t), result) in queries.iter().zip(results) {
                    match result {
                        Ok(report) => println!(
                            "{} -> {}: {} ({})",
                            s,
                            t,
                            report.objective(),
                            report.status
                        ),
                        Err(err) => println!("{} -> {}: {}", s, t, err),
                    }
                }
            }
        }
    }

    Ok(())
}
