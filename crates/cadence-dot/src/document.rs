//! Attribute-level view of a parsed `digraph`, before any protocol
//! semantics are applied.

use indexmap::IndexMap;

/// Byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.start, span.end.saturating_sub(span.start)).into()
    }
}

pub type Attributes = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotNode {
    pub id: String,
    /// Defaults in effect at the node's first mention, overridden by every
    /// attribute list given for it.
    pub attributes: Attributes,
    /// Where the node is first mentioned.
    pub span: Span,
}

impl DotNode {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// One `from -> to` link; a chain `a -> b -> c` yields two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotEdge {
    pub from: usize,
    pub to: usize,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DotGraph {
    pub strict: bool,
    pub name: Option<String>,
    /// Graph attributes from `key=value` and `graph [...]` statements.
    pub attributes: Attributes,
    /// Nodes in order of first mention, keyed by id.
    pub nodes: IndexMap<String, DotNode>,
    pub edges: Vec<DotEdge>,
}

impl DotGraph {
    pub fn node(&self, index: usize) -> Option<&DotNode> {
        self.nodes.get_index(index).map(|(_, node)| node)
    }

    /// Index of the node `id`, creating it with `defaults` on first mention.
    pub fn touch_node(&mut self, id: &str, defaults: &Attributes, span: Span) -> usize {
        if let Some(index) = self.nodes.get_index_of(id) {
            return index;
        }
        let node = DotNode {
            id: id.to_owned(),
            attributes: defaults.clone(),
            span,
        };
        self.nodes.insert_full(id.to_owned(), node).0
    }

    /// Edges leaving node `index`, in statement order.
    pub fn successors(&self, index: usize) -> impl Iterator<Item = &DotEdge> + '_ {
        self.edges.iter().filter(move |e| e.from == index)
    }

    /// Edges entering node `index`, in statement order.
    pub fn predecessors(&self, index: usize) -> impl Iterator<Item = &DotEdge> + '_ {
        self.edges.iter().filter(move |e| e.to == index)
    }
}
