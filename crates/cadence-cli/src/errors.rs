#![allow(unused_assignments)]

use cadence_core::BoundError;
use cadence_dot::ParseError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub(crate) enum CliError {
    #[error("{path}: No such path")]
    #[diagnostic(code(cadence::cli::no_such_path))]
    NoSuchPath { path: String },

    #[error("{path}: Not a file")]
    #[diagnostic(code(cadence::cli::not_a_file))]
    NotAFile { path: String },

    #[error("{iterations}: Invalid number of benchmark iterations (must be >= 2)")]
    #[diagnostic(code(cadence::cli::bench_iterations))]
    BenchIterations { iterations: usize },

    #[error("Unknown output format: {0}. Use 'discodnc', 'matplotlib' or 'json'.")]
    #[diagnostic(code(cadence::cli::format))]
    UnknownFormat(String),

    #[error("{0}")]
    #[diagnostic(code(cadence::cli::heuristic))]
    UnknownHeuristic(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error("Analysis failed: {0}")]
    #[diagnostic(code(cadence::cli::analysis))]
    Analysis(#[from] BoundError),

    #[error("Cannot write output: {0}")]
    #[diagnostic(code(cadence::cli::output))]
    Output(#[from] std::io::Error),

    #[error("Cannot encode JSON output: {0}")]
    #[diagnostic(code(cadence::cli::json))]
    Json(#[from] serde_json::Error),
}
