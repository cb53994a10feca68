use std::{ops::Range, str::FromStr};

use derive_more::Display;

use crate::{graph::Cost, scenario::TieBreak, termination::Termination};

#[derive(Debug, Display)]
pub enum ParseTerminationError {
    ExpectedInt,
    ExpectedTerm,
    UnconsumedTokens,
    EmptyStack,
    UnrecognizedToken(String),
}

impl std::error::Error for ParseTerminationError {}

/// Parses termination criteria written in reverse polish notation, e.g.
/// `"1000 iterations 60 timeout |"`.
impl<'s> std::convert::TryFrom<&'s str> for Termination {
    type Error = ParseTerminationError;

    fn try_from(value: &'s str) -> Result<Self, Self::Error> {
        use ParseTerminationError::*;
        let tokens = value.split_ascii_whitespace();

        enum Arg {
            Int(u64),
            Term(Box<Termination>),
        }

        let mut stack = Vec::new();

        let int = |s: &mut Vec<Arg>| match s.pop() {
            Some(Arg::Int(x)) => Ok(x),
            Some(Arg::Term(_)) => Err(ExpectedInt),
            None => Err(EmptyStack),
        };

        let term = |s: &mut Vec<Arg>| match s.pop() {
            Some(Arg::Term(x)) => Ok(x),
            Some(Arg::Int(_)) => Err(ExpectedTerm),
            None => Err(EmptyStack),
        };

        for token in tokens {
            let new = match token {
                "never" => Arg::Term(Box::new(Termination::Never)),
                "iterations" => Arg::Term(Box::new(Termination::Iterations(int(&mut stack)?))),
                "timeout" => Arg::Term(Box::new(Termination::Timeout(
                    std::time::Instant::now(),
                    std::time::Duration::from_secs(int(&mut stack)?),
                ))),
                "no-improvement" => Arg::Term(Box::new(Termination::NoImprovement(
                    std::time::Instant::now(),
                    std::time::Duration::from_secs(int(&mut stack)?),
                    f64::INFINITY,
                ))),
                "|" => {
                    let rhs = term(&mut stack)?;
                    let lhs = term(&mut stack)?;
                    Arg::Term(Box::new(Termination::Any(lhs, rhs)))
                }
                "&" => {
                    let rhs = term(&mut stack)?;
                    let lhs = term(&mut stack)?;
                    Arg::Term(Box::new(Termination::All(lhs, rhs)))
                }
                x => match x.parse::<u64>() {
                    Ok(num) => Arg::Int(num),
                    Err(_) => return Err(UnrecognizedToken(x.to_string())),
                },
            };

            stack.push(new);
        }

        let result = term(&mut stack)?;
        match stack.is_empty() {
            true => Ok(*result),
            false => Err(UnconsumedTokens),
        }
    }
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lexicographic" => Ok(TieBreak::Lexicographic),
            "fewest-arcs" => Ok(TieBreak::FewestArcs),
            x => Err(format!(
                "unknown tie-break `{}`, expected `lexicographic` or `fewest-arcs`",
                x
            )),
        }
    }
}

/// Parses a half-open range `lo..hi` of integer costs
pub fn parse_range(s: &str) -> Result<Range<Cost>, String> {
    let (lo, hi) = s
        .split_once("..")
        .ok_or_else(|| format!("expected a range `lo..hi`, got `{}`", s))?;
    let lo = lo.trim().parse::<i64>().map_err(|e| e.to_string())?;
    let hi = hi.trim().parse::<i64>().map_err(|e| e.to_string())?;
    if lo >= hi {
        return Err(format!("empty range `{}`", s));
    }
    Ok(lo as Cost..hi as Cost)
}
