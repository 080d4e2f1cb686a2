//! Protocol graphs and their two-stage construction.
//!
//! A [`GraphBuilder`] collects blocks, messages and edges in any order and
//! hands out [`BlockId`] handles. [`GraphBuilder::build`] seals every block's
//! schedule and produces a [`ProtocolGraph`], whose structure never changes
//! afterwards: only the memoized bounds inside each block grow.

use indexmap::IndexMap;
use num::rational::BigRational;
use num::traits::Zero;
use num::BigInt;

use crate::block::{Block, BlockId, Direction};
use crate::error::BoundError;
use crate::{Time, Traffic};

/// Collects blocks, messages and edges before the graph becomes queryable.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    blocks: IndexMap<String, Block>,
    edges: Vec<(BlockId, BlockId)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block.
    ///
    /// # Returns
    /// The handle for later [`Self::add_message`] / [`Self::add_edge`] calls,
    /// or an error for a duplicate label or a zero period.
    pub fn add_block(&mut self, label: impl Into<String>, period: Time) -> Result<BlockId, BoundError> {
        let label = label.into();
        if self.blocks.contains_key(&label) {
            return Err(BoundError::DuplicateBlock { label });
        }
        let block = Block::new(label.clone(), period)?;
        let (index, _) = self.blocks.insert_full(label, block);
        Ok(BlockId(index))
    }

    /// Append a message to a block's schedule.
    ///
    /// Messages must be added in non-decreasing offset order.
    pub fn add_message(
        &mut self,
        block: BlockId,
        label: impl Into<String>,
        offset: Time,
        size: Traffic,
    ) -> Result<(), BoundError> {
        let (_, target) = self
            .blocks
            .get_index_mut(block.0)
            .ok_or(BoundError::UnknownBlockId { index: block.0 })?;
        target.push_message(block, label.into(), offset, size)
    }

    /// Allow `to` to follow `from`. Self-edges are permitted.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) -> Result<(), BoundError> {
        for id in [from, to] {
            if id.0 >= self.blocks.len() {
                return Err(BoundError::UnknownBlockId { index: id.0 });
            }
        }
        self.edges.push((from, to));
        Ok(())
    }

    /// Look up the handle of an already registered block.
    pub fn block_id(&self, label: &str) -> Result<BlockId, BoundError> {
        self.blocks
            .get_index_of(label)
            .map(BlockId)
            .ok_or_else(|| BoundError::NotFound {
                label: label.to_owned(),
            })
    }

    /// Seal all schedules, wire the edges and return the queryable graph.
    pub fn build(mut self) -> Result<ProtocolGraph, BoundError> {
        for (from, to) in self.edges.drain(..) {
            self.blocks[from.0].next.insert(to);
            self.blocks[to.0].previous.insert(from);
        }
        for block in self.blocks.values_mut() {
            block.seal_schedule()?;
        }
        Ok(ProtocolGraph {
            blocks: self.blocks,
            in_flight: Vec::new(),
        })
    }
}

/// A directed graph of periodic blocks.
///
/// Queries take `&mut self` because they extend the blocks' memoized bounds;
/// the exclusive borrow is what serializes those extensions.
#[derive(Debug, Clone)]
pub struct ProtocolGraph {
    pub(crate) blocks: IndexMap<String, Block>,
    /// Blocks whose next bound increment is currently being computed,
    /// outermost first.
    pub(crate) in_flight: Vec<(Direction, BlockId)>,
}

impl ProtocolGraph {
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks in insertion order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> + '_ {
        self.blocks.values()
    }

    /// Handles of all blocks in insertion order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len()).map(BlockId)
    }

    /// Handle of the block labeled `label`.
    ///
    /// # Returns
    /// [`BoundError::NotFound`] if no such block exists.
    pub fn block_id(&self, label: &str) -> Result<BlockId, BoundError> {
        self.blocks
            .get_index_of(label)
            .map(BlockId)
            .ok_or_else(|| BoundError::NotFound {
                label: label.to_owned(),
            })
    }

    pub fn block(&self, id: BlockId) -> Result<&Block, BoundError> {
        self.blocks
            .get_index(id.0)
            .map(|(_, block)| block)
            .ok_or(BoundError::UnknownBlockId { index: id.0 })
    }

    pub fn block_by_label(&self, label: &str) -> Result<&Block, BoundError> {
        self.blocks.get(label).ok_or_else(|| BoundError::NotFound {
            label: label.to_owned(),
        })
    }

    pub(crate) fn block_at(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub(crate) fn block_at_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    /// Longest block period, zero for an empty graph.
    pub fn longest_block_period(&self) -> Time {
        self.blocks().map(Block::period).max().unwrap_or(0)
    }

    /// Shortest block period, zero for an empty graph.
    pub fn shortest_block_period(&self) -> Time {
        self.blocks().map(Block::period).min().unwrap_or(0)
    }

    /// Largest per-period traffic of any block.
    pub fn highest_block_traffic(&self) -> Traffic {
        self.blocks().map(Block::total_traffic).max().unwrap_or(0)
    }

    /// Largest average traffic per time unit of any block.
    pub fn highest_average_block_traffic(&self) -> BigRational {
        self.blocks()
            .map(|b| {
                BigRational::new(
                    BigInt::from(b.total_traffic()),
                    BigInt::from(b.period()),
                )
            })
            .max()
            .unwrap_or_else(BigRational::zero)
    }

    // ---------------------------------------------------------------
    // Graph-wide bounds
    // ---------------------------------------------------------------

    /// Upper bound on the traffic in any interval of length `len`.
    pub fn max_traffic(&mut self, len: Time) -> Result<Traffic, BoundError> {
        let mut max = 0;
        for id in self.block_ids().collect::<Vec<_>>() {
            max = max.max(self.block_max_traffic(id, len)?);
        }
        Ok(max)
    }

    /// Shortest interval length over which the traffic bound exceeds `value`.
    ///
    /// `None` means no interval, however long, ever exceeds `value`.
    pub fn first_time_exceeding(&mut self, value: Traffic) -> Result<Option<Time>, BoundError> {
        let mut earliest: Option<Time> = None;
        for id in self.block_ids().collect::<Vec<_>>() {
            if let Some(t) = self.block_shortest_interval_exceeding(id, value)? {
                earliest = Some(earliest.map_or(t, |e| e.min(t)));
            }
        }
        Ok(earliest)
    }

    /// Earliest time any block's prefix bound exceeds `value`.
    pub fn first_time_exceeding_in_prefix(
        &mut self,
        value: Traffic,
    ) -> Result<Option<Time>, BoundError> {
        self.first_time_exceeding_in(Direction::Forward, value)
    }

    /// Earliest time any block's suffix bound exceeds `value`.
    pub fn first_time_exceeding_in_suffix(
        &mut self,
        value: Traffic,
    ) -> Result<Option<Time>, BoundError> {
        self.first_time_exceeding_in(Direction::Backward, value)
    }

    fn first_time_exceeding_in(
        &mut self,
        direction: Direction,
        value: Traffic,
    ) -> Result<Option<Time>, BoundError> {
        let mut earliest: Option<Time> = None;
        for id in self.block_ids().collect::<Vec<_>>() {
            if let Some(t) = self.earliest_exceeding(direction, id, value)? {
                earliest = Some(earliest.map_or(t, |e| e.min(t)));
            }
        }
        Ok(earliest)
    }

    /// Largest prefix bound of length `time` over all blocks.
    pub fn max_prefix(&mut self, time: Time) -> Result<Traffic, BoundError> {
        self.max_bound(Direction::Forward, time)
    }

    /// Largest suffix bound of length `time` over all blocks.
    pub fn max_suffix(&mut self, time: Time) -> Result<Traffic, BoundError> {
        self.max_bound(Direction::Backward, time)
    }

    fn max_bound(&mut self, direction: Direction, time: Time) -> Result<Traffic, BoundError> {
        let mut max = 0;
        for id in self.block_ids().collect::<Vec<_>>() {
            max = max.max(self.bound(direction, id, time)?);
        }
        Ok(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proptest_generators::arb_graph;
    use proptest::prelude::*;
    use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence, RngAlgorithm};

    #[test]
    fn builder_rejects_duplicate_labels() {
        let mut b = GraphBuilder::new();
        b.add_block("A", 10).unwrap();
        assert_eq!(
            b.add_block("A", 5).unwrap_err(),
            BoundError::DuplicateBlock { label: "A".into() }
        );
    }

    #[test]
    fn builder_rejects_foreign_handles() {
        let mut b = GraphBuilder::new();
        let a = b.add_block("A", 10).unwrap();
        assert!(matches!(
            b.add_edge(a, BlockId(3)),
            Err(BoundError::UnknownBlockId { index: 3 })
        ));
        assert!(matches!(
            b.add_message(BlockId(1), "m", 0, 1),
            Err(BoundError::UnknownBlockId { index: 1 })
        ));
    }

    #[test]
    fn edges_are_wired_in_both_directions() {
        let mut b = GraphBuilder::new();
        let a = b.add_block("A", 10).unwrap();
        let c = b.add_block("C", 20).unwrap();
        b.add_edge(a, c).unwrap();
        b.add_edge(c, c).unwrap();
        let g = b.build().unwrap();

        let a_block = g.block(a).unwrap();
        let c_block = g.block_by_label("C").unwrap();
        assert_eq!(a_block.next_blocks().collect::<Vec<_>>(), vec![c]);
        assert_eq!(c_block.previous_blocks().collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(c_block.next_blocks().collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn unknown_label_is_not_found() {
        let g = GraphBuilder::new().build().unwrap();
        assert_eq!(
            g.block_id("missing").unwrap_err(),
            BoundError::NotFound {
                label: "missing".into()
            }
        );
    }

    #[test]
    fn empty_graph_aggregates_to_zero() {
        let mut g = GraphBuilder::new().build().unwrap();
        assert_eq!(g.max_traffic(100).unwrap(), 0);
        assert_eq!(g.max_prefix(100).unwrap(), 0);
        assert_eq!(g.max_suffix(100).unwrap(), 0);
        assert_eq!(g.first_time_exceeding(0).unwrap(), None);
        assert_eq!(g.longest_block_period(), 0);
        assert_eq!(g.highest_average_block_traffic(), BigRational::zero());
    }

    #[test]
    fn block_statistics() {
        let mut b = GraphBuilder::new();
        let a = b.add_block("A", 10).unwrap();
        b.add_message(a, "a0", 0, 5).unwrap();
        let c = b.add_block("C", 4).unwrap();
        b.add_message(c, "c0", 1, 3).unwrap();
        let g = b.build().unwrap();

        assert_eq!(g.block_count(), 2);
        assert_eq!(g.longest_block_period(), 10);
        assert_eq!(g.shortest_block_period(), 4);
        assert_eq!(g.highest_block_traffic(), 5);
        assert_eq!(
            g.highest_average_block_traffic(),
            BigRational::new(3.into(), 4.into())
        );
    }

    // ---------------------------------------------------------------
    // Proptest: property-based / randomized tests
    // ---------------------------------------------------------------

    fn graph_proptest_config() -> ProptestConfig {
        ProptestConfig {
            cases: 64,
            source_file: Some(file!()),
            failure_persistence: Some(Box::new(FileFailurePersistence::WithSource(
                "proptest-regressions",
            ))),
            rng_algorithm: RngAlgorithm::ChaCha,
            ..ProptestConfig::default()
        }
    }

    proptest! {
        #![proptest_config(graph_proptest_config())]

        /// A window as long as the longest period covers a whole schedule.
        #[test]
        fn longest_period_window_holds_every_schedule(mut g in arb_graph()) {
            let highest = g.highest_block_traffic();
            for block in g.blocks() {
                prop_assert!(block.total_traffic() <= highest);
            }
            let longest = g.longest_block_period();
            prop_assert!(g.max_traffic(longest).unwrap() >= highest);
            prop_assert!(g.max_prefix(longest).unwrap() >= highest);
        }
    }
}
