//! CLI argument definitions and the parsing of string-valued options.

use clap::Parser;
use std::path::PathBuf;

use cadence_core::Heuristic;

use crate::errors::CliError;
use crate::format::{DiscoDncFormatter, JsonFormatter, MatplotlibFormatter, OutputFormatter};

pub(crate) const CLI_LONG_ABOUT: &str =
    "Computes concave arrival curves bounding the traffic of periodic, \
    block-structured protocols described as Graphviz digraphs.\n\n\
    Heuristics:\n  \
    subadditive  exact bound up to a threshold, repeated beyond it\n  \
    loop         most efficient loop over merged consecutive blocks\n  \
    rescale      tightest loop over merged blocks rescaled to one period";

#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Arrival curves for block-structured protocols")]
#[command(long_about = CLI_LONG_ABOUT)]
#[command(version)]
pub(crate) struct Cli {
    /// Protocol model (Graphviz DOT)
    pub(crate) path: PathBuf,

    /// Output format: discodnc | matplotlib | json
    #[arg(short = 'f', long, default_value = "discodnc")]
    pub(crate) format: String,

    /// Also print the exact max-traffic function and the approximation
    #[arg(short, long, default_value_t = false)]
    pub(crate) verbose: bool,

    /// Heuristic: subadditive | loop | rescale
    #[arg(short = 'H', long, default_value = "subadditive")]
    pub(crate) heuristic: String,

    /// Subadditive threshold (0 picks four times the longest block period)
    #[arg(short = 'k', long, default_value_t = 0)]
    pub(crate) threshold: u64,

    /// Consecutive blocks merged by the loop heuristics (0 picks automatically)
    #[arg(short = 'n', long = "numblocks", default_value_t = 0)]
    pub(crate) num_blocks: usize,

    /// Repeat the analysis and report its average run time
    #[arg(short = 'b', long, default_value_t = false)]
    pub(crate) benchmark: bool,

    /// Number of benchmark iterations (at least 2)
    #[arg(short = 'B', long, default_value_t = 5)]
    pub(crate) bench_iters: usize,
}

pub(crate) fn parse_output_format(raw: &str) -> Result<Box<dyn OutputFormatter>, CliError> {
    match raw {
        "discodnc" => Ok(Box::new(DiscoDncFormatter)),
        "matplotlib" => Ok(Box::new(MatplotlibFormatter)),
        "json" => Ok(Box::new(JsonFormatter)),
        other => Err(CliError::UnknownFormat(other.to_owned())),
    }
}

pub(crate) fn parse_heuristic(raw: &str) -> Result<Heuristic, CliError> {
    raw.parse().map_err(CliError::UnknownHeuristic)
}

/// Iterations to run: one unless benchmarking.
pub(crate) fn iterations(cli: &Cli) -> Result<usize, CliError> {
    if !cli.benchmark {
        return Ok(1);
    }
    if cli.bench_iters < 2 {
        return Err(CliError::BenchIterations {
            iterations: cli.bench_iters,
        });
    }
    Ok(cli.bench_iters)
}
