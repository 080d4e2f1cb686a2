//! Blocks and messages: the leaves of a protocol graph.

use std::fmt;

use indexmap::IndexSet;

use crate::error::BoundError;
use crate::step_function::StepFunction;
use crate::{Time, Traffic};

/// Handle of a block inside one [`ProtocolGraph`](crate::ProtocolGraph).
///
/// Handles are plain indices; they are only meaningful for the graph (or
/// builder) that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single fixed-size transmission at a fixed offset within its block's period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub label: String,
    /// Owning block.
    pub block: BlockId,
    pub offset: Time,
    pub size: Traffic,
}

/// Which way a bound extends across graph edges.
///
/// Prefix bounds start at block entry and follow successors; suffix bounds
/// end at block exit and follow predecessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "prefix"),
            Direction::Backward => write!(f, "suffix"),
        }
    }
}

/// A periodic traffic source with a fixed message schedule.
///
/// Besides its schedule, a block owns the memoized prefix and suffix bounds.
/// Both are valid up to `period` right after construction and are only ever
/// extended forward by the graph's lazy fixpoint.
#[derive(Debug, Clone)]
pub struct Block {
    label: String,
    period: Time,
    messages: Vec<Message>,
    total_traffic: Traffic,
    pub(crate) next: IndexSet<BlockId>,
    pub(crate) previous: IndexSet<BlockId>,
    pub(crate) prefix: StepFunction<Traffic>,
    pub(crate) suffix: StepFunction<Traffic>,
}

impl Block {
    pub(crate) fn new(label: String, period: Time) -> Result<Self, BoundError> {
        if period == 0 {
            return Err(BoundError::ZeroPeriod { label });
        }
        Ok(Self {
            label,
            period,
            messages: Vec::new(),
            total_traffic: 0,
            next: IndexSet::new(),
            previous: IndexSet::new(),
            prefix: StepFunction::anchored(),
            suffix: StepFunction::anchored(),
        })
    }

    /// Append a message to the schedule.
    ///
    /// Offsets must lie in `[0, period)` and must not go backwards.
    pub(crate) fn push_message(
        &mut self,
        id: BlockId,
        label: String,
        offset: Time,
        size: Traffic,
    ) -> Result<(), BoundError> {
        if offset >= self.period {
            return Err(BoundError::OffsetOutOfRange {
                block: self.label.clone(),
                message: label,
                offset,
                period: self.period,
            });
        }
        if let Some(previous) = self.messages.last() {
            if offset < previous.offset {
                return Err(BoundError::UnorderedOffset {
                    block: self.label.clone(),
                    message: label,
                    offset,
                    previous: previous.offset,
                });
            }
        }
        self.total_traffic =
            self.total_traffic
                .checked_add(size)
                .ok_or_else(|| BoundError::TrafficOverflow {
                    block: self.label.clone(),
                })?;
        self.messages.push(Message {
            label,
            block: id,
            offset,
            size,
        });
        Ok(())
    }

    /// Rebuild both bounds from the schedule, valid for one period.
    ///
    /// A message at offset `o` is counted in prefixes of length `o + 1` and
    /// in suffixes of length `period - o`.
    pub(crate) fn seal_schedule(&mut self) -> Result<(), BoundError> {
        let mut prefix = StepFunction::anchored();
        let mut running: Traffic = 0;
        for msg in &self.messages {
            running += msg.size;
            prefix.set_value_at(msg.offset + 1, running)?;
        }
        prefix.extend_to(self.period)?;

        let mut suffix = StepFunction::anchored();
        running = 0;
        for msg in self.messages.iter().rev() {
            running += msg.size;
            suffix.set_value_at(self.period - msg.offset, running)?;
        }
        suffix.extend_to(self.period)?;

        self.prefix = prefix;
        self.suffix = suffix;
        Ok(())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn period(&self) -> Time {
        self.period
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, idx: usize) -> Option<&Message> {
        self.messages.get(idx)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Sum of all message sizes.
    pub fn total_traffic(&self) -> Traffic {
        self.total_traffic
    }

    pub fn next_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.next.iter().copied()
    }

    pub fn previous_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.previous.iter().copied()
    }

    /// Currently memoized prefix bound.
    pub fn prefix_bound(&self) -> &StepFunction<Traffic> {
        &self.prefix
    }

    /// Currently memoized suffix bound.
    pub fn suffix_bound(&self) -> &StepFunction<Traffic> {
        &self.suffix
    }

    pub(crate) fn bound(&self, direction: Direction) -> &StepFunction<Traffic> {
        match direction {
            Direction::Forward => &self.prefix,
            Direction::Backward => &self.suffix,
        }
    }

    pub(crate) fn bound_mut(&mut self, direction: Direction) -> &mut StepFunction<Traffic> {
        match direction {
            Direction::Forward => &mut self.prefix,
            Direction::Backward => &mut self.suffix,
        }
    }

    pub(crate) fn neighbors(&self, direction: Direction) -> &IndexSet<BlockId> {
        match direction {
            Direction::Forward => &self.next,
            Direction::Backward => &self.previous,
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (period {}, {} messages, {} traffic)",
            self.label,
            self.period,
            self.messages.len(),
            self.total_traffic
        )
    }
}
