//! Protocol semantics on top of a [`DotGraph`].
//!
//! A block node (`type=Block`, `tPeriod`) is preceded by the chain of its
//! messages (`type=TMsg`, `tOffs`, optional `size`): every message links to
//! the next message of the same block, the last one links to the block.
//! A block links to itself or to the first message of a following block.

#![allow(clippy::result_large_err)]

use cadence_core::{BlockId, BoundError, GraphBuilder, ProtocolGraph, Time, Traffic};
use indexmap::IndexMap;
use tracing::debug;

use crate::document::{DotEdge, DotGraph, DotNode, Span};
use crate::errors::{ParseError, SourceFile};

const TYPE: &str = "type";
const PERIOD: &str = "tPeriod";
const OFFSET: &str = "tOffs";
const SIZE: &str = "size";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Block,
    Message,
}

/// Messages found for one block node, by distance from the block.
#[derive(Debug, Default)]
struct Chain {
    /// `by_distance[0]` links to the block directly.
    by_distance: Vec<Option<usize>>,
}

struct Lowering<'a> {
    doc: &'a DotGraph,
    src: SourceFile<'a>,
    kinds: Vec<NodeKind>,
    /// Edges leaving each node.
    out: Vec<Vec<&'a DotEdge>>,
}

/// Build the protocol graph described by `doc`.
pub fn lower(doc: &DotGraph, source: &str, filename: &str) -> Result<ProtocolGraph, ParseError> {
    let src = SourceFile::new(source, filename);
    let kinds = doc
        .nodes
        .values()
        .map(|node| node_kind(node, src))
        .collect::<Result<Vec<_>, _>>()?;
    let mut out = vec![Vec::new(); doc.nodes.len()];
    for edge in &doc.edges {
        out[edge.from].push(edge);
    }
    let lowering = Lowering {
        doc,
        src,
        kinds,
        out,
    };

    // Blocks keep their declaration order.
    let mut chains: IndexMap<usize, Chain> = IndexMap::new();
    for (index, kind) in lowering.kinds.iter().enumerate() {
        if *kind == NodeKind::Block {
            lowering.check_in_degree(index)?;
            chains.insert(index, Chain::default());
        }
    }
    for (index, kind) in lowering.kinds.iter().enumerate() {
        if *kind == NodeKind::Message {
            let (block, distance) = lowering.owning_block(index)?;
            lowering.claim(chains.entry(block).or_default(), block, distance, index)?;
        }
    }

    let mut builder = GraphBuilder::new();
    let mut ids: IndexMap<usize, BlockId> = IndexMap::new();
    // Message node -> (block node, index in block).
    let mut positions: IndexMap<usize, (usize, usize)> = IndexMap::new();
    for (&block, chain) in &chains {
        let node = lowering.node(block);
        let period = lowering.time_attribute(node, PERIOD, None)?;
        let id = builder
            .add_block(node.id.clone(), period)
            .map_err(|e| lowering.node_error(node, e))?;
        for (position, message) in chain.by_distance.iter().rev().flatten().enumerate() {
            let msg = lowering.node(*message);
            let offset = lowering.time_attribute(msg, OFFSET, None)?;
            let size = lowering.size_attribute(msg)?;
            builder
                .add_message(id, msg.id.clone(), offset, size)
                .map_err(|e| lowering.node_error(msg, e))?;
            positions.insert(*message, (block, position));
        }
        ids.insert(block, id);
    }

    // Links only after every schedule is complete.
    for (&block, &id) in &ids {
        for edge in &lowering.out[block] {
            let target = if edge.to == block {
                id
            } else {
                lowering.linked_block(block, edge.to, &positions, &ids, edge.span)?
            };
            builder
                .add_edge(id, target)
                .map_err(|e| lowering.node_error(lowering.node(block), e))?;
        }
    }

    let graph = builder.build()?;
    debug!(blocks = graph.block_count(), "protocol graph lowered");
    Ok(graph)
}

fn node_kind(node: &DotNode, src: SourceFile<'_>) -> Result<NodeKind, ParseError> {
    match node.attribute(TYPE) {
        Some("Block") => Ok(NodeKind::Block),
        Some("TMsg") => Ok(NodeKind::Message),
        Some(other) => Err(ParseError::UnsupportedNodeType {
            node: node.id.clone(),
            node_type: other.to_owned(),
            span: node.span.into(),
            src: src.named(),
        }),
        None => Err(ParseError::MissingAttribute {
            node: node.id.clone(),
            attribute: TYPE.to_owned(),
            span: node.span.into(),
            src: src.named(),
        }),
    }
}

impl Lowering<'_> {
    fn node(&self, index: usize) -> &DotNode {
        &self.doc.nodes[index]
    }

    fn node_error(&self, node: &DotNode, source: BoundError) -> ParseError {
        ParseError::Node {
            node: node.id.clone(),
            source,
            span: node.span.into(),
            src: self.src.named(),
        }
    }

    /// A block is entered from exactly one node other than itself, and never
    /// from another block.
    fn check_in_degree(&self, block: usize) -> Result<(), ParseError> {
        let mut count = 0;
        for edge in self.doc.predecessors(block) {
            if edge.from == block {
                continue;
            }
            if self.kinds[edge.from] == NodeKind::Block {
                return Err(ParseError::BlockToBlock {
                    from: self.node(edge.from).id.clone(),
                    to: self.node(block).id.clone(),
                    span: edge.span.into(),
                    src: self.src.named(),
                });
            }
            count += 1;
        }
        if count != 1 {
            let node = self.node(block);
            return Err(ParseError::BlockInDegree {
                block: node.id.clone(),
                count,
                span: node.span.into(),
                src: self.src.named(),
            });
        }
        Ok(())
    }

    /// Follow the successor chain from `message` to its block.
    ///
    /// # Returns
    /// The block node and the number of messages between `message` and it.
    fn owning_block(&self, message: usize) -> Result<(usize, usize), ParseError> {
        let mut current = message;
        let mut distance = 0;
        loop {
            let [edge] = self.out[current].as_slice() else {
                let node = self.node(current);
                return Err(ParseError::MessageSuccessors {
                    node: node.id.clone(),
                    count: self.out[current].len(),
                    span: node.span.into(),
                    src: self.src.named(),
                });
            };
            if self.kinds[edge.to] == NodeKind::Block {
                return Ok((edge.to, distance));
            }
            distance += 1;
            current = edge.to;
            if distance >= self.doc.nodes.len() {
                let node = self.node(message);
                return Err(ParseError::MessageCycle {
                    node: node.id.clone(),
                    span: node.span.into(),
                    src: self.src.named(),
                });
            }
        }
    }

    fn claim(
        &self,
        chain: &mut Chain,
        block: usize,
        distance: usize,
        message: usize,
    ) -> Result<(), ParseError> {
        if chain.by_distance.len() <= distance {
            chain.by_distance.resize(distance + 1, None);
        }
        match chain.by_distance[distance] {
            Some(first) => {
                let node = self.node(message);
                Err(ParseError::BranchingChain {
                    block: self.node(block).id.clone(),
                    position: distance,
                    first: self.node(first).id.clone(),
                    second: node.id.clone(),
                    span: node.span.into(),
                    src: self.src.named(),
                })
            }
            None => {
                chain.by_distance[distance] = Some(message);
                Ok(())
            }
        }
    }

    /// Block reached by the link `from -> target`, which must enter that
    /// block at its first message.
    fn linked_block(
        &self,
        from: usize,
        target: usize,
        positions: &IndexMap<usize, (usize, usize)>,
        ids: &IndexMap<usize, BlockId>,
        span: Span,
    ) -> Result<BlockId, ParseError> {
        let from_id = self.node(from).id.clone();
        let Some(&(block, position)) = positions.get(&target) else {
            return Err(ParseError::BlockToBlock {
                from: from_id,
                to: self.node(target).id.clone(),
                span: span.into(),
                src: self.src.named(),
            });
        };
        if position != 0 {
            return Err(ParseError::IntoMiddleOfBlock {
                from: from_id,
                block: self.node(block).id.clone(),
                message: self.node(target).id.clone(),
                span: span.into(),
                src: self.src.named(),
            });
        }
        ids.get(&block).copied().ok_or_else(|| ParseError::BlockInDegree {
            block: self.node(block).id.clone(),
            count: 0,
            span: self.node(block).span.into(),
            src: self.src.named(),
        })
    }

    fn time_attribute(
        &self,
        node: &DotNode,
        key: &str,
        default: Option<Time>,
    ) -> Result<Time, ParseError> {
        let Some(raw) = node.attribute(key) else {
            return default.ok_or_else(|| ParseError::MissingAttribute {
                node: node.id.clone(),
                attribute: key.to_owned(),
                span: node.span.into(),
                src: self.src.named(),
            });
        };
        raw.trim().parse().map_err(|_| ParseError::MalformedAttribute {
            node: node.id.clone(),
            attribute: key.to_owned(),
            value: raw.to_owned(),
            expected: "a non-negative integer",
            span: node.span.into(),
            src: self.src.named(),
        })
    }

    /// Message size, 1 when absent.
    fn size_attribute(&self, node: &DotNode) -> Result<Traffic, ParseError> {
        match self.time_attribute(node, SIZE, Some(1))? {
            0 => Err(ParseError::MalformedAttribute {
                node: node.id.clone(),
                attribute: SIZE.to_owned(),
                value: "0".to_owned(),
                expected: "a positive integer",
                span: node.span.into(),
                src: self.src.named(),
            }),
            size => Ok(size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn lower_str(source: &str) -> Result<ProtocolGraph, ParseError> {
        let doc = parse_document(source, "test.dot")?;
        lower(&doc, source, "test.dot")
    }

    #[test]
    fn single_looping_block() {
        let mut g = lower_str(
            "digraph {
                m0 [type=TMsg, tOffs=1, size=4]
                m1 [type=TMsg, tOffs=2, size=6]
                B [type=Block, tPeriod=10]
                m0 -> m1 -> B
                B -> B
            }",
        )
        .unwrap();
        assert_eq!(g.block_count(), 1);
        let block = g.block_by_label("B").unwrap();
        let labels: Vec<&str> = block.messages().iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["m0", "m1"]);
        assert_eq!(block.total_traffic(), 10);
        assert_eq!(g.max_traffic(11).unwrap(), 16);
    }

    #[test]
    fn messages_may_be_declared_after_their_block() {
        let g = lower_str(
            "digraph {
                node [type=TMsg]
                B [type=Block, tPeriod=5]
                c [tOffs=4]; b [tOffs=2]; a [tOffs=0]
                a -> b -> c -> B
            }",
        )
        .unwrap();
        let block = g.block_by_label("B").unwrap();
        let offsets: Vec<Time> = block.messages().iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 2, 4]);
        assert!(block.messages().iter().all(|m| m.size == 1));
    }

    #[test]
    fn blocks_link_through_first_messages() {
        let g = lower_str(
            "digraph {
                a0 [type=TMsg, tOffs=0]; a1 [type=TMsg, tOffs=3, size=2]
                A [type=Block, tPeriod=5]
                c0 [type=TMsg, tOffs=2, size=5]
                C [type=Block, tPeriod=3]
                a0 -> a1 -> A
                c0 -> C
                A -> c0
                C -> a0
                C -> C
            }",
        )
        .unwrap();
        let a = g.block_id("A").unwrap();
        let c = g.block_id("C").unwrap();
        let a_next: Vec<BlockId> = g.block(a).unwrap().next_blocks().collect();
        let mut c_next: Vec<BlockId> = g.block(c).unwrap().next_blocks().collect();
        c_next.sort_by_key(|id| id.index());
        assert_eq!(a_next, vec![c]);
        assert_eq!(c_next, vec![a, c]);
    }

    #[test]
    fn missing_type_is_reported() {
        let err = lower_str("digraph { x }").unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingAttribute { ref node, ref attribute, .. } if node == "x" && attribute == "type"
        ));
    }

    #[test]
    fn unsupported_type_is_reported() {
        let err = lower_str("digraph { x [type=Queue] }").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedNodeType { ref node_type, .. } if node_type == "Queue"));
    }

    #[test]
    fn missing_period_is_reported() {
        let err = lower_str("digraph { m [type=TMsg, tOffs=0]; B [type=Block]; m -> B }").unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingAttribute { ref attribute, .. } if attribute == "tPeriod"
        ));
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = lower_str(
            "digraph { m [type=TMsg, tOffs=-1]; B [type=Block, tPeriod=4]; m -> B }",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedAttribute { ref value, .. } if value == "-1"
        ));
        let err = lower_str(
            "digraph { m [type=TMsg, tOffs=0, size=0]; B [type=Block, tPeriod=4]; m -> B }",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedAttribute { ref attribute, .. } if attribute == "size"
        ));
    }

    #[test]
    fn message_needs_single_successor() {
        let err = lower_str(
            "digraph {
                m [type=TMsg, tOffs=0]
                B [type=Block, tPeriod=4]
                D [type=Block, tPeriod=4]
                m -> B
                m -> D
            }",
        )
        .unwrap_err();
        // B is checked first: its only entry is m, which is fine. The chain
        // from m then forks.
        assert!(matches!(err, ParseError::MessageSuccessors { count: 2, .. }), "{err}");
    }

    #[test]
    fn dangling_message_is_reported() {
        let err = lower_str("digraph { m [type=TMsg, tOffs=0] }").unwrap_err();
        assert!(matches!(err, ParseError::MessageSuccessors { count: 0, .. }));
    }

    #[test]
    fn message_cycle_is_reported() {
        let err = lower_str(
            "digraph {
                node [type=TMsg, tOffs=0]
                a -> b -> a
            }",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::MessageCycle { ref node, .. } if node == "a"));
    }

    #[test]
    fn block_in_degree_is_checked() {
        let err = lower_str("digraph { B [type=Block, tPeriod=3]; B -> B }").unwrap_err();
        assert!(matches!(err, ParseError::BlockInDegree { count: 0, .. }), "{err}");

        let err = lower_str(
            "digraph {
                node [type=TMsg, tOffs=0]
                a; b
                B [type=Block, tPeriod=3]
                a -> B
                b -> B
            }",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::BlockInDegree { count: 2, .. }), "{err}");
    }

    #[test]
    fn block_to_block_link_is_rejected() {
        let err = lower_str(
            "digraph {
                a [type=TMsg, tOffs=0]; b [type=TMsg, tOffs=0]
                A [type=Block, tPeriod=2]; B [type=Block, tPeriod=2]
                a -> A; b -> B
                A -> B
            }",
        )
        .unwrap_err();
        assert!(
            matches!(err, ParseError::BlockToBlock { ref from, ref to, .. } if from == "A" && to == "B"),
            "{err}"
        );
    }

    #[test]
    fn link_into_middle_of_block_is_rejected() {
        let err = lower_str(
            "digraph {
                node [type=TMsg]
                a [tOffs=0]
                b0 [tOffs=0]; b1 [tOffs=1]
                A [type=Block, tPeriod=2]; B [type=Block, tPeriod=2]
                a -> A
                b0 -> b1 -> B
                A -> b1
            }",
        )
        .unwrap_err();
        assert!(
            matches!(err, ParseError::IntoMiddleOfBlock { ref message, .. } if message == "b1"),
            "{err}"
        );
    }

    #[test]
    fn schedule_errors_come_from_the_builder() {
        let err = lower_str(
            "digraph {
                node [type=TMsg]
                late [tOffs=3]; early [tOffs=1]
                B [type=Block, tPeriod=4]
                late -> early -> B
            }",
        )
        .unwrap_err();
        assert!(matches!(
            err.bound_error(),
            Some(BoundError::UnorderedOffset { offset: 1, previous: 3, .. })
        ));

        let err = lower_str(
            "digraph { m [type=TMsg, tOffs=4]; B [type=Block, tPeriod=4]; m -> B }",
        )
        .unwrap_err();
        assert!(matches!(
            err.bound_error(),
            Some(BoundError::OffsetOutOfRange { offset: 4, period: 4, .. })
        ));
    }
}
