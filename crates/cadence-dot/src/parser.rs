#![allow(clippy::result_large_err)]

use pest::Parser;
use pest_derive::Parser;
use tracing::debug;

use crate::document::{Attributes, DotEdge, DotGraph, Span};
use crate::errors::ParseError;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct DotParser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

fn span_from(pair: &Pair<'_>) -> Span {
    let s = pair.as_span();
    Span::new(s.start(), s.end())
}

/// Attribute defaults set by `node [...]` and `edge [...]` statements.
#[derive(Default)]
struct Defaults {
    node: Attributes,
    edge: Attributes,
}

/// Parse DOT text into its attribute-level document.
pub fn parse_document(source: &str, filename: &str) -> Result<DotGraph, ParseError> {
    let pairs = DotParser::parse(Rule::file, source).map_err(|e| {
        let (start, end) = match e.location {
            pest::error::InputLocation::Pos(p) => (p, p + 1),
            pest::error::InputLocation::Span((s, e)) => (s, e),
        };
        ParseError::syntax(format!("{e}"), Span::new(start, end), source, filename)
    })?;

    let mut graph = DotGraph::default();
    let mut defaults = Defaults::default();
    let digraph = pairs
        .flatten()
        .find(|p| p.as_rule() == Rule::digraph)
        .ok_or_else(|| ParseError::syntax("expected a digraph", Span::new(0, 0), source, filename))?;

    for item in digraph.into_inner() {
        match item.as_rule() {
            Rule::strict_kw => graph.strict = true,
            Rule::digraph_kw => {}
            Rule::id => graph.name = Some(id_text(item)),
            Rule::attr_stmt => parse_attr_stmt(item, &mut graph, &mut defaults),
            Rule::edge_stmt => parse_edge_stmt(item, &mut graph, &defaults),
            Rule::graph_attr => {
                let (key, value) = key_value(item);
                graph.attributes.insert(key, value);
            }
            Rule::node_stmt => parse_node_stmt(item, &mut graph, &defaults),
            _ => {}
        }
    }
    debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "dot document parsed"
    );
    Ok(graph)
}

fn parse_attr_stmt(pair: Pair<'_>, graph: &mut DotGraph, defaults: &mut Defaults) {
    let mut inner = pair.into_inner();
    let (Some(target), Some(list)) = (inner.next(), inner.next()) else {
        return;
    };
    let attributes = parse_attr_list(list);
    let target = match target.as_str().to_ascii_lowercase().as_str() {
        "node" => &mut defaults.node,
        "edge" => &mut defaults.edge,
        _ => &mut graph.attributes,
    };
    target.extend(attributes);
}

fn parse_node_stmt(pair: Pair<'_>, graph: &mut DotGraph, defaults: &Defaults) {
    let mut inner = pair.into_inner();
    let Some(id) = inner.next() else {
        return;
    };
    let span = span_from(&id);
    let index = graph.touch_node(&id_text(id), &defaults.node, span);
    if let Some(list) = inner.next() {
        let attributes = parse_attr_list(list);
        if let Some((_, node)) = graph.nodes.get_index_mut(index) {
            node.attributes.extend(attributes);
        }
    }
}

fn parse_edge_stmt(pair: Pair<'_>, graph: &mut DotGraph, defaults: &Defaults) {
    let mut previous: Option<(usize, Span)> = None;
    for item in pair.into_inner() {
        // Edge attributes carry no protocol meaning.
        if item.as_rule() != Rule::id {
            continue;
        }
        let span = span_from(&item);
        let index = graph.touch_node(&id_text(item), &defaults.node, span);
        if let Some((from, from_span)) = previous {
            graph.edges.push(DotEdge {
                from,
                to: index,
                span: Span::new(from_span.start, span.end),
            });
        }
        previous = Some((index, span));
    }
}

fn parse_attr_list(pair: Pair<'_>) -> Attributes {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::attr)
        .map(key_value)
        .collect()
}

fn key_value(pair: Pair<'_>) -> (String, String) {
    let mut inner = pair.into_inner();
    let key = inner.next().map(id_text).unwrap_or_default();
    let value = inner.next().map(id_text).unwrap_or_default();
    (key, value)
}

/// Text of an `id`, with quotes removed and escapes resolved.
fn id_text(pair: Pair<'_>) -> String {
    let Some(inner) = pair.into_inner().next() else {
        return String::new();
    };
    match inner.as_rule() {
        Rule::quoted => inner
            .into_inner()
            .next()
            .map(|text| unescape(text.as_str()))
            .unwrap_or_default(),
        _ => inner.as_str().to_owned(),
    }
}

/// `\"` becomes `"`, a backslash-newline is a line continuation, every
/// other escape is kept verbatim.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('"') => {
                out.push('"');
                chars.next();
            }
            Some('\n') => {
                chars.next();
            }
            Some('\r') => {
                chars.next();
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            _ => out.push('\\'),
        }
    }
    out
}
