//! Lazy prefix/suffix fixpoint over a possibly cyclic block graph.
//!
//! For `t > period(B)` the prefix bound satisfies
//!
//! ```text
//! MaxPrefix_B(t) = total(B) + max_{B' in next(B)} MaxPrefix_B'(t - period(B))
//! ```
//!
//! and the suffix bound the same recurrence over `previous(B)`. Instead of
//! evaluating that recurrence point by point, each block appends one
//! breakpoint at a time: the next breakpoint is the earliest instant at which
//! any neighbor's bound could push this block past its current maximum. All
//! results are memoized in the block's step functions, so every breakpoint is
//! computed once per graph.

use tracing::trace;

use crate::block::{BlockId, Direction};
use crate::error::BoundError;
use crate::graph::ProtocolGraph;
use crate::{Time, Traffic};

/// Outcome of looking for a block's next bound increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    At(Time),
    /// The bound never grows again.
    Never,
    /// Depends on the block at depth `waits_on` of the in-flight stack.
    /// `candidate` is the earliest increment found on the other paths and
    /// `informed` tells whether any path reached a block with a known future.
    Pending {
        candidate: Option<Time>,
        waits_on: usize,
        informed: bool,
    },
}

impl ProtocolGraph {
    /// Prefix (forward) or suffix (backward) bound of length `time` anchored
    /// at block `id`.
    pub(crate) fn bound(
        &mut self,
        direction: Direction,
        id: BlockId,
        time: Time,
    ) -> Result<Traffic, BoundError> {
        let block = self.block_at(id);
        if time == 0 {
            return Ok(0);
        }
        if time == block.period() {
            return Ok(block.total_traffic());
        }
        self.extend(direction, id, time)?;
        let block = self.block_at(id);
        block
            .bound(direction)
            .value_at(time)
            .map_err(|e| e.in_block(block.label()))
    }

    /// Make the cached bound valid up to at least `time`.
    pub(crate) fn extend(
        &mut self,
        direction: Direction,
        id: BlockId,
        time: Time,
    ) -> Result<(), BoundError> {
        while self.block_at(id).bound(direction).valid_up_to() < time {
            if !matches!(self.append_breakpoint(direction, id)?, Next::At(_)) {
                break;
            }
        }
        Ok(())
    }

    /// Append the next breakpoint of a block's bound.
    ///
    /// On [`Next::Never`] the bound is sealed as valid for all time. On
    /// [`Next::Pending`] nothing is recorded.
    fn append_breakpoint(&mut self, direction: Direction, id: BlockId) -> Result<Next, BoundError> {
        let next = match self.next_increment_time(direction, id)? {
            Next::At(next) => next,
            Next::Never => {
                let block = self.block_at_mut(id);
                let label = block.label().to_owned();
                block
                    .bound_mut(direction)
                    .extend_to(Time::MAX)
                    .map_err(|e| e.in_block(&label))?;
                trace!(block = %label, %direction, "bound sealed");
                return Ok(Next::Never);
            }
            pending => return Ok(pending),
        };

        // Nothing changes before `next`; neighbors reached again through an
        // empty cycle read the flat stretch from the cache.
        let block = self.block_at_mut(id);
        let label = block.label().to_owned();
        block
            .bound_mut(direction)
            .extend_to(next - 1)
            .map_err(|e| e.in_block(&label))?;

        let block = self.block_at(id);
        let period = block.period();
        let total = block.total_traffic();
        let neighbors: Vec<BlockId> = block.neighbors(direction).iter().copied().collect();

        let remaining = next - period;
        let mut traffic: Traffic = 0;
        for neighbor in neighbors {
            traffic = traffic.max(self.bound(direction, neighbor, remaining)?);
        }

        let block = self.block_at_mut(id);
        if block.bound(direction).valid_up_to() >= next {
            // Already appended while the neighbors were extended.
            return Ok(Next::At(next));
        }
        let value = traffic
            .checked_add(total)
            .ok_or_else(|| BoundError::TrafficOverflow {
                block: label.clone(),
            })?;
        block
            .bound_mut(direction)
            .set_value_at(next, value)
            .map_err(|e| e.in_block(&label))?;
        trace!(block = %label, %direction, time = next, value, "bound extended");
        Ok(Next::At(next))
    }

    /// Earliest time after the cached range at which the block's bound grows.
    ///
    /// A block re-entered while its own increment is being computed can only
    /// have been reached through a cycle of empty blocks. Going round that
    /// cycle again only delays the increase, so the caller gets
    /// [`Next::Pending`] and relies on its other neighbors.
    fn next_increment_time(&mut self, direction: Direction, id: BlockId) -> Result<Next, BoundError> {
        if let Some(depth) = self.in_flight.iter().position(|&e| e == (direction, id)) {
            return Ok(Next::Pending {
                candidate: None,
                waits_on: depth,
                informed: false,
            });
        }
        let depth = self.in_flight.len();
        self.in_flight.push((direction, id));
        let result = self.next_increment_time_inner(direction, id, depth);
        self.in_flight.truncate(depth);
        result
    }

    fn next_increment_time_inner(
        &mut self,
        direction: Direction,
        id: BlockId,
        depth: usize,
    ) -> Result<Next, BoundError> {
        let block = self.block_at(id);
        let period = block.period();
        let total = block.total_traffic();
        let remaining = block.bound(direction).maximum_value() - total;
        let neighbors: Vec<BlockId> = block.neighbors(direction).iter().copied().collect();

        let mut earliest: Option<Time> = None;
        let mut waits_on: Option<usize> = None;
        let mut informed = false;
        for neighbor in neighbors {
            match self.reach(direction, neighbor, remaining)? {
                Next::At(t) => {
                    earliest = Some(earliest.map_or(t, |e| e.min(t)));
                    informed = true;
                }
                Next::Never => informed = true,
                Next::Pending {
                    candidate,
                    waits_on: w,
                    informed: i,
                } => {
                    if let Some(t) = candidate {
                        earliest = Some(earliest.map_or(t, |e| e.min(t)));
                    }
                    waits_on = Some(waits_on.map_or(w, |x| x.min(w)));
                    informed |= i;
                }
            }
        }
        let earliest = earliest.and_then(|t| t.checked_add(period));

        match (waits_on, earliest) {
            (Some(w), candidate) if w < depth => Ok(Next::Pending {
                candidate,
                waits_on: w,
                informed,
            }),
            (_, Some(t)) => Ok(Next::At(t)),
            (Some(_), None) if !informed => Err(BoundError::DegenerateCycle {
                block: self.block_at(id).label().to_owned(),
            }),
            (_, None) => Ok(Next::Never),
        }
    }

    /// Earliest time at which the block's bound strictly exceeds `value`.
    pub(crate) fn earliest_exceeding(
        &mut self,
        direction: Direction,
        id: BlockId,
        value: Traffic,
    ) -> Result<Option<Time>, BoundError> {
        match self.reach(direction, id, value)? {
            Next::At(t) => Ok(Some(t)),
            Next::Never => Ok(None),
            Next::Pending { .. } => Err(BoundError::DegenerateCycle {
                block: self.block_at(id).label().to_owned(),
            }),
        }
    }

    fn reach(&mut self, direction: Direction, id: BlockId, value: Traffic) -> Result<Next, BoundError> {
        while value >= self.block_at(id).bound(direction).maximum_value() {
            match self.append_breakpoint(direction, id)? {
                Next::At(_) => {}
                other => return Ok(other),
            }
        }
        let block = self.block_at(id);
        block
            .bound(direction)
            .first_time_exceeding(&value)
            .map(Next::At)
            .map_err(|e| e.in_block(block.label()))
    }

    // ---------------------------------------------------------------
    // Per-block queries
    // ---------------------------------------------------------------

    fn check_id(&self, id: BlockId) -> Result<(), BoundError> {
        self.block(id).map(|_| ())
    }

    /// Traffic bound for `[0, time)` measured from entry into block `id`.
    pub fn block_max_prefix(&mut self, id: BlockId, time: Time) -> Result<Traffic, BoundError> {
        self.check_id(id)?;
        self.bound(Direction::Forward, id, time)
    }

    /// Traffic bound for the `time` units ending at exit from block `id`.
    pub fn block_max_suffix(&mut self, id: BlockId, time: Time) -> Result<Traffic, BoundError> {
        self.check_id(id)?;
        self.bound(Direction::Backward, id, time)
    }

    /// Earliest prefix length whose bound exceeds `value`.
    pub fn block_earliest_prefix_exceeding(
        &mut self,
        id: BlockId,
        value: Traffic,
    ) -> Result<Option<Time>, BoundError> {
        self.check_id(id)?;
        self.earliest_exceeding(Direction::Forward, id, value)
    }

    /// Earliest suffix length whose bound exceeds `value`.
    pub fn block_earliest_suffix_exceeding(
        &mut self,
        id: BlockId,
        value: Traffic,
    ) -> Result<Option<Time>, BoundError> {
        self.check_id(id)?;
        self.earliest_exceeding(Direction::Backward, id, value)
    }

    /// Traffic in the interval of length `len` starting just before message
    /// `message` of block `id`.
    ///
    /// Messages at the same offset with a lower index are included.
    pub fn block_max_traffic_from(
        &mut self,
        id: BlockId,
        message: usize,
        len: Time,
    ) -> Result<Traffic, BoundError> {
        let block = self.block(id)?;
        let offset = block
            .message(message)
            .ok_or_else(|| BoundError::NoSuchMessage {
                block: block.label().to_owned(),
                index: message,
                count: block.message_count(),
            })?
            .offset;
        let end = offset.saturating_add(len);
        let through_end = self.bound(Direction::Forward, id, end)?;
        let before = self.bound(Direction::Forward, id, offset)?;
        Ok(through_end - before)
    }

    /// Traffic bound for any interval of length `len` starting inside block `id`.
    pub fn block_max_traffic(&mut self, id: BlockId, len: Time) -> Result<Traffic, BoundError> {
        self.check_id(id)?;
        let period = self.block_at(id).period();
        self.extend(Direction::Forward, id, period.saturating_add(len))?;
        let block = self.block_at(id);
        block
            .prefix
            .maximum_interval(len, period)
            .map_err(|e| e.in_block(block.label()))
    }

    /// Shortest interval starting inside block `id` whose traffic bound
    /// exceeds `value`, minimized over all message start points.
    pub fn block_shortest_interval_exceeding(
        &mut self,
        id: BlockId,
        value: Traffic,
    ) -> Result<Option<Time>, BoundError> {
        self.check_id(id)?;
        let offsets: Vec<Time> = self
            .block_at(id)
            .messages()
            .iter()
            .map(|m| m.offset)
            .collect();

        let mut shortest: Option<Time> = None;
        for offset in offsets {
            let before = self.bound(Direction::Forward, id, offset)?;
            let Some(target) = value.checked_add(before) else {
                continue;
            };
            if let Some(reach) = self.earliest_exceeding(Direction::Forward, id, target)? {
                let interval = reach - offset;
                shortest = Some(shortest.map_or(interval, |s| s.min(interval)));
            }
        }
        Ok(shortest)
    }

    /// Query handle for the block labeled `label`.
    pub fn query(&mut self, label: &str) -> Result<BlockQuery<'_>, BoundError> {
        let id = self.block_id(label)?;
        Ok(BlockQuery { graph: self, id })
    }
}

/// Per-block view over a [`ProtocolGraph`], for label-based queries.
///
/// ```
/// # use cadence_core::GraphBuilder;
/// let mut builder = GraphBuilder::new();
/// let b = builder.add_block("B", 10).unwrap();
/// builder.add_message(b, "m0", 1, 4).unwrap();
/// builder.add_message(b, "m1", 2, 6).unwrap();
/// let mut graph = builder.build().unwrap();
///
/// let mut query = graph.query("B").unwrap();
/// assert_eq!(query.max_prefix(2).unwrap(), 4);
/// assert_eq!(query.max_prefix(3).unwrap(), 10);
/// ```
pub struct BlockQuery<'g> {
    graph: &'g mut ProtocolGraph,
    id: BlockId,
}

impl BlockQuery<'_> {
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn max_prefix(&mut self, time: Time) -> Result<Traffic, BoundError> {
        self.graph.block_max_prefix(self.id, time)
    }

    pub fn max_suffix(&mut self, time: Time) -> Result<Traffic, BoundError> {
        self.graph.block_max_suffix(self.id, time)
    }

    pub fn max_traffic(&mut self, len: Time) -> Result<Traffic, BoundError> {
        self.graph.block_max_traffic(self.id, len)
    }

    pub fn max_traffic_from(&mut self, message: usize, len: Time) -> Result<Traffic, BoundError> {
        self.graph.block_max_traffic_from(self.id, message, len)
    }

    pub fn earliest_prefix_exceeding(&mut self, value: Traffic) -> Result<Option<Time>, BoundError> {
        self.graph.block_earliest_prefix_exceeding(self.id, value)
    }

    pub fn earliest_suffix_exceeding(&mut self, value: Traffic) -> Result<Option<Time>, BoundError> {
        self.graph.block_earliest_suffix_exceeding(self.id, value)
    }

    pub fn shortest_interval_exceeding(
        &mut self,
        value: Traffic,
    ) -> Result<Option<Time>, BoundError> {
        self.graph.block_shortest_interval_exceeding(self.id, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::proptest_generators::{arb_cyclic_graph_shape, arb_graph_shape};
    use proptest::prelude::*;
    use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence, RngAlgorithm};

    /// Block of period 10 with 4 units at offset 1 and 6 units at offset 2.
    fn single_block(self_loop: bool) -> ProtocolGraph {
        let mut b = GraphBuilder::new();
        let id = b.add_block("B", 10).unwrap();
        b.add_message(id, "m0", 1, 4).unwrap();
        b.add_message(id, "m1", 2, 6).unwrap();
        if self_loop {
            b.add_edge(id, id).unwrap();
        }
        b.build().unwrap()
    }

    /// `A` (period 5, 1 unit at 0 and 2 units at 3) alternating with
    /// `C` (period 3, 5 units at 2).
    fn alternating() -> ProtocolGraph {
        let mut b = GraphBuilder::new();
        let a = b.add_block("A", 5).unwrap();
        b.add_message(a, "a0", 0, 1).unwrap();
        b.add_message(a, "a1", 3, 2).unwrap();
        let c = b.add_block("C", 3).unwrap();
        b.add_message(c, "c0", 2, 5).unwrap();
        b.add_edge(a, c).unwrap();
        b.add_edge(c, a).unwrap();
        b.build().unwrap()
    }

    // ---------------------------------------------------------------
    // Single block
    // ---------------------------------------------------------------

    #[test]
    fn prefix_within_one_period() {
        let mut g = single_block(false);
        let mut q = g.query("B").unwrap();
        assert_eq!(q.max_prefix(0).unwrap(), 0);
        assert_eq!(q.max_prefix(1).unwrap(), 0);
        assert_eq!(q.max_prefix(2).unwrap(), 4);
        assert_eq!(q.max_prefix(3).unwrap(), 10);
        assert_eq!(q.max_prefix(10).unwrap(), 10);
    }

    #[test]
    fn terminal_block_stops_growing() {
        let mut g = single_block(false);
        let mut q = g.query("B").unwrap();
        assert_eq!(q.max_prefix(1_000).unwrap(), 10);
        assert_eq!(q.max_suffix(1_000).unwrap(), 10);
        assert_eq!(q.earliest_prefix_exceeding(10).unwrap(), None);
        assert_eq!(q.earliest_prefix_exceeding(4).unwrap(), Some(3));
    }

    #[test]
    fn self_loop_repeats_the_schedule() {
        let mut g = single_block(true);
        let mut q = g.query("B").unwrap();
        assert_eq!(q.max_prefix(11).unwrap(), 10);
        assert_eq!(q.max_prefix(12).unwrap(), 14);
        assert_eq!(q.max_prefix(13).unwrap(), 20);
        assert_eq!(q.max_prefix(33).unwrap(), 40);
        assert_eq!(q.max_suffix(8).unwrap(), 6);
        assert_eq!(q.max_suffix(18).unwrap(), 16);
        assert_eq!(q.max_suffix(19).unwrap(), 20);
    }

    #[test]
    fn suffix_mirrors_prefix_within_one_period() {
        let mut g = alternating();
        for label in ["A", "C"] {
            let id = g.block_id(label).unwrap();
            let period = g.block(id).unwrap().period();
            let total = g.block(id).unwrap().total_traffic();
            for t in 0..=period {
                let prefix = g.block_max_prefix(id, period - t).unwrap();
                let suffix = g.block_max_suffix(id, t).unwrap();
                assert_eq!(suffix, total - prefix, "block {label}, t = {t}");
            }
        }
    }

    // ---------------------------------------------------------------
    // Crossing block boundaries
    // ---------------------------------------------------------------

    #[test]
    fn prefix_follows_successors() {
        let mut g = alternating();
        let mut a = g.query("A").unwrap();
        // A: 1 at [0], 2 at [3]; then C from 5: 5 at [7]; then A from 8: 1 at [8].
        assert_eq!(a.max_prefix(4).unwrap(), 3);
        assert_eq!(a.max_prefix(5).unwrap(), 3);
        assert_eq!(a.max_prefix(7).unwrap(), 3);
        assert_eq!(a.max_prefix(8).unwrap(), 8);
        assert_eq!(a.max_prefix(9).unwrap(), 9);
        assert_eq!(a.max_prefix(12).unwrap(), 11);
    }

    #[test]
    fn suffix_follows_predecessors() {
        let mut g = alternating();
        let mut c = g.query("C").unwrap();
        // Ending at the exit of C: 5 at -1, then A before it with 2 at -5
        // and 1 at -8, then C again with 5 at -9.
        assert_eq!(c.max_suffix(1).unwrap(), 5);
        assert_eq!(c.max_suffix(4).unwrap(), 5);
        assert_eq!(c.max_suffix(5).unwrap(), 7);
        assert_eq!(c.max_suffix(8).unwrap(), 8);
        assert_eq!(c.max_suffix(9).unwrap(), 13);
    }

    #[test]
    fn prefix_is_monotone_across_many_periods() {
        let mut g = alternating();
        let a = g.block_id("A").unwrap();
        let mut last = 0;
        for t in 0..200 {
            let v = g.block_max_prefix(a, t).unwrap();
            assert!(v >= last, "prefix dropped at {t}");
            last = v;
        }
        // 8 traffic per 8 time units.
        assert_eq!(g.block_max_prefix(a, 80).unwrap(), 80);
    }

    #[test]
    fn max_traffic_from_message() {
        let mut g = alternating();
        let mut a = g.query("A").unwrap();
        assert_eq!(a.max_traffic_from(0, 1).unwrap(), 1);
        assert_eq!(a.max_traffic_from(1, 1).unwrap(), 2);
        assert_eq!(a.max_traffic_from(1, 5).unwrap(), 7);
        assert!(matches!(
            a.max_traffic_from(2, 1),
            Err(BoundError::NoSuchMessage { index: 2, count: 2, .. })
        ));
    }

    #[test]
    fn max_traffic_over_windows_starting_inside_block() {
        let mut g = alternating();
        let mut a = g.query("A").unwrap();
        assert_eq!(a.max_traffic(0).unwrap(), 0);
        assert_eq!(a.max_traffic(1).unwrap(), 2);
        // Starting at offset 3: 2, then C's 5 at offset 7.
        assert_eq!(a.max_traffic(5).unwrap(), 7);
        let mut c = g.query("C").unwrap();
        // Starting at offset 2 of C: 5, then A: 1 at 3.
        assert_eq!(c.max_traffic(2).unwrap(), 6);
    }

    #[test]
    fn shortest_interval_exceeding() {
        let mut g = alternating();
        let mut a = g.query("A").unwrap();
        assert_eq!(a.shortest_interval_exceeding(0).unwrap(), Some(1));
        assert_eq!(a.shortest_interval_exceeding(1).unwrap(), Some(1));
        assert_eq!(a.shortest_interval_exceeding(2).unwrap(), Some(4));
        assert_eq!(a.shortest_interval_exceeding(3).unwrap(), Some(5));
        // A single message of C already exceeds 2.
        assert_eq!(g.first_time_exceeding(2).unwrap(), Some(1));
    }

    // ---------------------------------------------------------------
    // Degenerate cycles
    // ---------------------------------------------------------------

    #[test]
    fn empty_self_loop_is_degenerate() {
        let mut b = GraphBuilder::new();
        let idle = b.add_block("idle", 4).unwrap();
        b.add_edge(idle, idle).unwrap();
        let mut g = b.build().unwrap();
        assert_eq!(g.block_max_prefix(idle, 4).unwrap(), 0);
        assert_eq!(
            g.block_max_prefix(idle, 5).unwrap_err(),
            BoundError::DegenerateCycle {
                block: "idle".into()
            }
        );
    }

    #[test]
    fn empty_self_loop_with_exit_is_skipped() {
        let mut b = GraphBuilder::new();
        let idle = b.add_block("idle", 4).unwrap();
        let busy = b.add_block("busy", 2).unwrap();
        b.add_message(busy, "x", 0, 3).unwrap();
        b.add_edge(idle, idle).unwrap();
        b.add_edge(idle, busy).unwrap();
        let mut g = b.build().unwrap();
        assert_eq!(g.block_max_prefix(idle, 5).unwrap(), 3);
        assert_eq!(g.block_max_prefix(idle, 100).unwrap(), 3);
    }

    #[test]
    fn empty_cycle_of_two_blocks_is_degenerate() {
        let mut b = GraphBuilder::new();
        let x = b.add_block("x", 3).unwrap();
        let y = b.add_block("y", 5).unwrap();
        b.add_edge(x, y).unwrap();
        b.add_edge(y, x).unwrap();
        let mut g = b.build().unwrap();
        let err = g.block_max_prefix(x, 20).unwrap_err();
        assert!(matches!(err, BoundError::DegenerateCycle { .. }));
        // The guard is released after the failure.
        assert!(g.in_flight.is_empty());
    }

    #[test]
    fn empty_self_loop_with_exit_is_skipped_backwards() {
        let mut b = GraphBuilder::new();
        let busy = b.add_block("busy", 2).unwrap();
        b.add_message(busy, "x", 0, 3).unwrap();
        let idle = b.add_block("idle", 4).unwrap();
        b.add_edge(busy, idle).unwrap();
        b.add_edge(idle, idle).unwrap();
        let mut g = b.build().unwrap();
        // Ending at the exit of idle: nothing for 4 units, then busy's
        // message 2 units before its own exit.
        assert_eq!(g.block_max_suffix(idle, 5).unwrap(), 0);
        assert_eq!(g.block_max_suffix(idle, 6).unwrap(), 3);
        assert_eq!(g.block_max_suffix(idle, 100).unwrap(), 3);
    }

    #[test]
    fn empty_self_loop_alone_is_degenerate_backwards() {
        let mut b = GraphBuilder::new();
        let idle = b.add_block("idle", 4).unwrap();
        b.add_edge(idle, idle).unwrap();
        let mut g = b.build().unwrap();
        assert!(matches!(
            g.block_max_suffix(idle, 5),
            Err(BoundError::DegenerateCycle { .. })
        ));
    }

    #[test]
    fn empty_cycle_with_exit_reaches_traffic() {
        let mut b = GraphBuilder::new();
        let a = b.add_block("a", 2).unwrap();
        let c = b.add_block("c", 3).unwrap();
        let d = b.add_block("d", 4).unwrap();
        b.add_message(d, "d0", 0, 5).unwrap();
        b.add_edge(a, c).unwrap();
        b.add_edge(c, a).unwrap();
        b.add_edge(c, d).unwrap();
        let mut g = b.build().unwrap();

        assert_eq!(g.block_max_prefix(a, 5).unwrap(), 0);
        assert_eq!(g.block_max_prefix(a, 6).unwrap(), 5);
        assert_eq!(g.block_max_prefix(c, 4).unwrap(), 5);
        // d is terminal, so nothing follows its message.
        assert_eq!(g.block_max_prefix(a, 100).unwrap(), 5);
        assert_eq!(g.block_max_prefix(c, 100).unwrap(), 5);
        assert_eq!(g.max_traffic(3).unwrap(), 5);
        assert!(g.in_flight.is_empty());
    }

    #[test]
    fn empty_cycle_of_three_blocks_takes_the_nearest_exit() {
        let mut b = GraphBuilder::new();
        let x = b.add_block("x", 2).unwrap();
        let y = b.add_block("y", 3).unwrap();
        let z = b.add_block("z", 1).unwrap();
        let p = b.add_block("p", 4).unwrap();
        b.add_message(p, "p0", 3, 2).unwrap();
        let q = b.add_block("q", 2).unwrap();
        b.add_message(q, "q0", 0, 6).unwrap();
        b.add_edge(x, y).unwrap();
        b.add_edge(y, z).unwrap();
        b.add_edge(y, p).unwrap();
        b.add_edge(z, x).unwrap();
        b.add_edge(z, q).unwrap();
        let mut g = b.build().unwrap();

        // x -> y -> z -> q reaches q's message after 2 + 3 + 1 units.
        assert_eq!(g.block_max_prefix(x, 6).unwrap(), 0);
        assert_eq!(g.block_max_prefix(x, 7).unwrap(), 6);
        assert_eq!(g.block_max_prefix(y, 4).unwrap(), 0);
        assert_eq!(g.block_max_prefix(y, 5).unwrap(), 6);
        assert_eq!(g.block_max_prefix(z, 2).unwrap(), 6);
    }

    // ---------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------

    fn engine_proptest_config() -> ProptestConfig {
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
        #![proptest_config(engine_proptest_config())]

        #[test]
        fn max_traffic_is_monotone_and_subadditive(shape in arb_graph_shape()) {
            let mut g = shape.build().unwrap();
            let values: Vec<Traffic> = (0..=40).map(|t| g.max_traffic(t).unwrap()).collect();
            for t in 1..values.len() {
                prop_assert!(values[t - 1] <= values[t], "drop at {}", t);
            }
            for a in 0..=20 {
                for b in 0..=20 {
                    prop_assert!(values[a + b] <= values[a] + values[b], "f({}+{})", a, b);
                }
            }
        }

        #[test]
        fn suffix_is_complement_of_prefix_inside_a_block(shape in arb_cyclic_graph_shape()) {
            let mut g = shape.build().unwrap();
            let ids: Vec<BlockId> = g.block_ids().collect();
            for id in ids {
                let period = g.block(id).unwrap().period();
                let total = g.block(id).unwrap().total_traffic();
                for t in 0..=period {
                    let prefix = g.block_max_prefix(id, period - t).unwrap();
                    let suffix = g.block_max_suffix(id, t).unwrap();
                    prop_assert_eq!(suffix, total - prefix);
                }
            }
        }

        #[test]
        fn prefix_follows_its_recurrence(shape in arb_cyclic_graph_shape()) {
            let mut g = shape.build().unwrap();
            let ids: Vec<BlockId> = g.block_ids().collect();
            for id in ids {
                let period = g.block(id).unwrap().period();
                let total = g.block(id).unwrap().total_traffic();
                let next: Vec<BlockId> = g.block(id).unwrap().next_blocks().collect();
                for t in 1..=20 {
                    let mut best = 0;
                    for &n in &next {
                        best = best.max(g.block_max_prefix(n, t).unwrap());
                    }
                    prop_assert_eq!(g.block_max_prefix(id, t + period).unwrap(), total + best);
                }
            }
        }
    }
}
