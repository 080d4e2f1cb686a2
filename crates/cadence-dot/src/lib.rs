#![doc = include_str!("../README.md")]
#![allow(clippy::result_large_err)]

pub mod document;
pub mod errors;
pub mod lowering;
pub mod parser;

use std::path::Path;

use cadence_core::ProtocolGraph;

pub use document::{DotEdge, DotGraph, DotNode, Span};
pub use errors::ParseError;
pub use parser::parse_document;

/// Parse a DOT protocol model into a queryable graph.
pub fn parse(source: &str, filename: &str) -> Result<ProtocolGraph, ParseError> {
    let doc = parse_document(source, filename)?;
    lowering::lower(&doc, source, filename)
}

/// Read and parse the DOT protocol model at `path`.
pub fn parse_file(path: impl AsRef<Path>) -> Result<ProtocolGraph, ParseError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&source, &path.display().to_string())
}
