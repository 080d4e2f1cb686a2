//! Proptest strategies for small, well-formed protocol graphs.

use proptest::prelude::*;

use crate::error::BoundError;
use crate::graph::{GraphBuilder, ProtocolGraph};
use crate::{Time, Traffic};

/// Plain description of a graph, kept around so failing cases shrink and
/// print readably.
#[derive(Debug, Clone)]
pub struct GraphShape {
    /// `(period, [(offset, size)])` per block, offsets sorted.
    pub blocks: Vec<(Time, Vec<(Time, Traffic)>)>,
    pub edges: Vec<(usize, usize)>,
}

impl GraphShape {
    pub fn build(&self) -> Result<ProtocolGraph, BoundError> {
        let mut builder = GraphBuilder::new();
        let mut ids = Vec::with_capacity(self.blocks.len());
        for (idx, (period, messages)) in self.blocks.iter().enumerate() {
            let id = builder.add_block(format!("B{idx}"), *period)?;
            for (m, &(offset, size)) in messages.iter().enumerate() {
                builder.add_message(id, format!("B{idx}_m{m}"), offset, size)?;
            }
            ids.push(id);
        }
        for &(from, to) in &self.edges {
            builder.add_edge(ids[from], ids[to])?;
        }
        builder.build()
    }
}

fn arb_block(max_period: Time) -> impl Strategy<Value = (Time, Vec<(Time, Traffic)>)> {
    (1..=max_period).prop_flat_map(|period| {
        proptest::collection::vec((0..period, 1..=9u64), 1..=3).prop_map(move |mut messages| {
            messages.sort_by_key(|&(offset, _)| offset);
            (period, messages)
        })
    })
}

/// Graphs with 1–4 blocks of period at most 12, each block carrying 1–3
/// messages of positive size, and random edges (self-loops and terminal
/// blocks included).
///
/// Every block carries traffic, so no cycle is degenerate.
pub fn arb_graph_shape() -> impl Strategy<Value = GraphShape> {
    (1..=4usize)
        .prop_flat_map(|nblocks| {
            (
                proptest::collection::vec(arb_block(12), nblocks..=nblocks),
                proptest::collection::vec((0..nblocks, 0..nblocks), 0..=nblocks * 2),
            )
        })
        .prop_map(|(blocks, edges)| GraphShape { blocks, edges })
}

/// Like [`arb_graph_shape`], but every block has at least one successor.
pub fn arb_cyclic_graph_shape() -> impl Strategy<Value = GraphShape> {
    (arb_graph_shape(), any::<u64>()).prop_map(|(mut shape, seed)| {
        let n = shape.blocks.len();
        for from in 0..n {
            if !shape.edges.iter().any(|&(f, _)| f == from) {
                let to = ((seed >> (from * 8)) as usize + from) % n;
                shape.edges.push((from, to));
            }
        }
        shape
    })
}

pub fn arb_graph() -> impl Strategy<Value = ProtocolGraph> {
    arb_graph_shape().prop_filter_map("graph must build", |shape| shape.build().ok())
}
