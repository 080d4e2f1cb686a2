#![allow(unused_assignments)]

use cadence_core::BoundError;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::document::Span;

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("Syntax error: {message}")]
    #[diagnostic(code(cadence::dot::syntax))]
    Syntax {
        message: String,
        #[label("here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Attribute '{attribute}' not found in node '{node}'")]
    #[diagnostic(code(cadence::dot::missing_attribute))]
    MissingAttribute {
        node: String,
        attribute: String,
        #[label("declared here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Attribute '{attribute}' of node '{node}' must be {expected}, got '{value}'")]
    #[diagnostic(code(cadence::dot::malformed_attribute))]
    MalformedAttribute {
        node: String,
        attribute: String,
        value: String,
        expected: &'static str,
        #[label("declared here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Unsupported node type '{node_type}' for node '{node}'")]
    #[diagnostic(
        code(cadence::dot::unsupported_node_type),
        help("node types are `Block` and `TMsg`")
    )]
    UnsupportedNodeType {
        node: String,
        node_type: String,
        #[label("declared here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Invalid outgoing edge count for message '{node}' ({count})")]
    #[diagnostic(
        code(cadence::dot::message_successors),
        help("every message links to exactly one node: the next message of its block, or the block itself")
    )]
    MessageSuccessors {
        node: String,
        count: usize,
        #[label("message")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Message '{node}' never reaches a block")]
    #[diagnostic(code(cadence::dot::message_cycle))]
    MessageCycle {
        node: String,
        #[label("message chain starts here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Messages '{first}' and '{second}' both claim position {position} before block '{block}'")]
    #[diagnostic(
        code(cadence::dot::branching_chain),
        help("the messages of a block must form a single chain ending at the block")
    )]
    BranchingChain {
        block: String,
        position: usize,
        first: String,
        second: String,
        #[label("second message")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Invalid incoming edge count for block '{block}' ({count})")]
    #[diagnostic(
        code(cadence::dot::block_in_degree),
        help("a block is entered only from its last message")
    )]
    BlockInDegree {
        block: String,
        count: usize,
        #[label("block")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Block to block link: {from} -> {to}")]
    #[diagnostic(
        code(cadence::dot::block_to_block),
        help("link the block to the first message of '{to}' instead")
    )]
    BlockToBlock {
        from: String,
        to: String,
        #[label("link")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Block '{from}' points into middle of block '{block}' (-> '{message}')")]
    #[diagnostic(code(cadence::dot::into_middle))]
    IntoMiddleOfBlock {
        from: String,
        block: String,
        message: String,
        #[label("link")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Invalid node '{node}': {source}")]
    #[diagnostic(code(cadence::dot::model))]
    Node {
        node: String,
        source: BoundError,
        #[label("declared here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Invalid protocol model: {0}")]
    #[diagnostic(code(cadence::dot::model))]
    Model(#[from] BoundError),

    #[error("Cannot read '{path}': {source}")]
    #[diagnostic(code(cadence::dot::io))]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Source text and file name, attached to every located error.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    pub text: &'a str,
    pub name: &'a str,
}

impl<'a> SourceFile<'a> {
    pub fn new(text: &'a str, name: &'a str) -> Self {
        Self { text, name }
    }

    pub fn named(&self) -> NamedSource<String> {
        NamedSource::new(self.name, self.text.to_owned())
    }
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, span: Span, source: &str, filename: &str) -> Self {
        ParseError::Syntax {
            message: message.into(),
            span: span.into(),
            src: NamedSource::new(filename, source.to_owned()),
        }
    }

    /// The core error behind a model error, if any.
    pub fn bound_error(&self) -> Option<&BoundError> {
        match self {
            ParseError::Node { source, .. } | ParseError::Model(source) => Some(source),
            _ => None,
        }
    }
}
