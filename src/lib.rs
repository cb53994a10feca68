pub mod batch;
pub mod benders;
pub mod cuts;
pub mod error;
pub mod generate;
pub mod graph;
pub mod models;
pub mod oracle;
pub mod parse;
pub mod scenario;
pub mod subproblem;
pub mod termination;

pub use benders::{Benders, Config, Report, Status};
pub use error::{Error, Result};
pub use graph::{Arc, ArcIndex, Cost, Graph, Instance, NodeIndex};
pub use scenario::{Path, Scenario, TieBreak};
