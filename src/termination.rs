use std::time::{Duration, Instant};

/// Which kind of limit stopped the decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    Iterations,
    Time,
}

#[derive(Clone, Debug)]
pub enum Termination {
    /// Terminate after a given number of iterations
    Iterations(u64),
    /// Terminate if the optimality gap has not improved for the given amount of time
    NoImprovement(Instant, Duration, f64),
    /// Maximum running time from `Instant`
    Timeout(Instant, Duration),
    /// Run until the bounds meet
    Never,
    /// Terminate if either of the two termination criteria
    /// tells it to terminate
    Any(Box<Termination>, Box<Termination>),
    /// Terminate when both of the criteria tells it to terminate
    All(Box<Termination>, Box<Termination>),
}

impl Termination {
    /// The iteration limit combined with an optional wall-clock limit starting now
    pub fn from_limits(max_iterations: u64, time_limit: Option<Duration>) -> Self {
        let iterations = Termination::Iterations(max_iterations);
        match time_limit {
            Some(limit) => Termination::Any(
                Box::new(iterations),
                Box::new(Termination::Timeout(Instant::now(), limit)),
            ),
            None => iterations,
        }
    }

    /// Checks the criteria after `iteration` completed iterations with the current gap,
    /// returning the limit that fired.
    pub fn check(&mut self, iteration: u64, gap: f64) -> Option<Stop> {
        match self {
            Termination::Iterations(limit) => (iteration >= *limit).then(|| Stop::Iterations),
            Termination::Timeout(from, duration) => {
                (from.elapsed() > *duration).then(|| Stop::Time)
            }
            Termination::NoImprovement(last, duration, best) => {
                // Reset the clock whenever the gap shrinks
                if gap < *best {
                    *best = gap;
                    *last = Instant::now();
                }

                (last.elapsed() > *duration).then(|| Stop::Time)
            }
            Termination::Never => None,
            Termination::Any(one, two) => {
                let first = one.check(iteration, gap);
                let second = two.check(iteration, gap);
                first.or(second)
            }
            Termination::All(one, two) => {
                let first = one.check(iteration, gap);
                let second = two.check(iteration, gap);
                match (first, second) {
                    (Some(stop), Some(_)) => Some(stop),
                    _ => None,
                }
            }
        }
    }

    pub fn should_terminate(&mut self, iteration: u64, gap: f64) -> bool {
        self.check(iteration, gap).is_some()
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Iterations(i) => write!(f, "{i} iterations"),
            Termination::NoImprovement(_, dur, _) => write!(f, "{} no-improvement", dur.as_secs()),
            Termination::Timeout(_, dur) => write!(f, "{} timeout", dur.as_secs()),
            Termination::Never => write!(f, "never"),
            Termination::Any(lhs, rhs) => write!(f, "({lhs}) | ({rhs})"),
            Termination::All(lhs, rhs) => write!(f, "({lhs}) & ({rhs})"),
        }
    }
}
