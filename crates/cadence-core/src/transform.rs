//! Graph transforms producing coarser, fully interconnected models.
//!
//! Every transform returns a new [`ProtocolGraph`] with fresh (empty) bound
//! caches; the input graph is only read.

use indexmap::IndexSet;
use tracing::debug;

use crate::block::BlockId;
use crate::error::BoundError;
use crate::graph::{GraphBuilder, ProtocolGraph};
use crate::Time;

/// Separator between block labels in a super-block label.
pub const SUPER_BLOCK_SEPARATOR: &str = "--";

/// All paths of `n` consecutive blocks, starting from every block.
///
/// A path stops early at a block without successors. Cycles are unrolled,
/// so a self-loop yields paths that repeat the same block.
pub fn successive_blocks(graph: &ProtocolGraph, n: usize) -> Result<Vec<Vec<BlockId>>, BoundError> {
    if n == 0 {
        return Err(BoundError::InvalidBlockCount { count: n });
    }
    let mut paths = IndexSet::new();
    for start in graph.block_ids() {
        for path in successive_blocks_from(graph, start, n)? {
            paths.insert(path);
        }
    }
    Ok(paths.into_iter().collect())
}

/// All paths of `n` consecutive blocks starting at `start`.
pub fn successive_blocks_from(
    graph: &ProtocolGraph,
    start: BlockId,
    n: usize,
) -> Result<Vec<Vec<BlockId>>, BoundError> {
    if n == 0 {
        return Err(BoundError::InvalidBlockCount { count: n });
    }
    graph.block(start)?;

    let mut paths = Vec::new();
    let mut stack = vec![vec![start]];
    while let Some(path) = stack.pop() {
        let Some(&last) = path.last() else {
            continue;
        };
        let successors: Vec<BlockId> = graph.block_at(last).next_blocks().collect();
        if path.len() == n || successors.is_empty() {
            paths.push(path);
            continue;
        }
        for next in successors.into_iter().rev() {
            let mut extended = path.clone();
            extended.push(next);
            stack.push(extended);
        }
    }
    Ok(paths)
}

/// Label of the super-block merging `path`.
pub fn super_block_label(graph: &ProtocolGraph, path: &[BlockId]) -> String {
    path.iter()
        .map(|&id| graph.block_at(id).label())
        .collect::<Vec<_>>()
        .join(SUPER_BLOCK_SEPARATOR)
}

/// Add the super-block for `path` to `builder`.
///
/// Its period is the sum of the path's periods and its schedule is the
/// concatenation of the blocks' schedules with cumulative offsets. Block
/// labels may contain the separator themselves, so a label already taken in
/// `builder` gets a `#2`, `#3`, ... suffix.
pub fn add_super_block(
    builder: &mut GraphBuilder,
    graph: &ProtocolGraph,
    path: &[BlockId],
) -> Result<BlockId, BoundError> {
    let joined = super_block_label(graph, path);
    let mut label = joined.clone();
    let mut suffix = 2;
    while builder.block_id(&label).is_ok() {
        label = format!("{joined}#{suffix}");
        suffix += 1;
    }
    let mut period: Time = 0;
    for &id in path {
        period = period
            .checked_add(graph.block(id)?.period())
            .ok_or_else(|| BoundError::PeriodOverflow {
                block: label.clone(),
            })?;
    }

    let merged = builder.add_block(label, period)?;
    let mut base: Time = 0;
    for &id in path {
        let block = graph.block_at(id);
        for msg in block.messages() {
            builder.add_message(merged, msg.label.clone(), base + msg.offset, msg.size)?;
        }
        base += block.period();
    }
    Ok(merged)
}

/// Merge every path of `n` consecutive blocks into a super-block and let
/// every super-block follow every other one.
///
/// The result over-approximates the traffic of `graph`: any run of the
/// original graph is a run of the merged graph.
pub fn fully_connect(graph: &ProtocolGraph, n: usize) -> Result<ProtocolGraph, BoundError> {
    let paths = successive_blocks(graph, n)?;
    let mut builder = GraphBuilder::new();
    let mut ids = Vec::with_capacity(paths.len());
    for path in &paths {
        ids.push(add_super_block(&mut builder, graph, path)?);
    }
    connect_all(&mut builder, &ids)?;
    debug!(paths = paths.len(), n, "fully connected model created");
    builder.build()
}

/// Map every block onto the shortest period of `graph`, scaling offsets
/// linearly, and connect all blocks to each other.
///
/// Offsets are rounded half up and clamped into the new period.
pub fn rescale(graph: &ProtocolGraph) -> Result<ProtocolGraph, BoundError> {
    if graph.is_empty() {
        return Err(BoundError::EmptyGraph);
    }
    let period = graph.shortest_block_period();
    let mut builder = GraphBuilder::new();
    let mut ids = Vec::with_capacity(graph.block_count());
    for block in graph.blocks() {
        let id = builder.add_block(block.label(), period)?;
        for msg in block.messages() {
            let offset = rescale_offset(msg.offset, block.period(), period);
            builder.add_message(id, msg.label.clone(), offset, msg.size)?;
        }
        ids.push(id);
    }
    connect_all(&mut builder, &ids)?;
    debug!(period, blocks = ids.len(), "rescaled model created");
    builder.build()
}

/// `round(offset * new_period / old_period)`, clamped below `new_period`.
fn rescale_offset(offset: Time, old_period: Time, new_period: Time) -> Time {
    let old = u128::from(old_period);
    let scaled = (u128::from(offset) * u128::from(new_period) + old / 2) / old;
    let clamped = scaled.min(u128::from(new_period) - 1);
    Time::try_from(clamped).unwrap_or(new_period - 1)
}

fn connect_all(builder: &mut GraphBuilder, ids: &[BlockId]) -> Result<(), BoundError> {
    for &from in ids {
        for &to in ids {
            builder.add_edge(from, to)?;
        }
    }
    Ok(())
}
