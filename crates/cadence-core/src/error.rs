use thiserror::Error;

use crate::Time;

/// Errors raised while building a protocol graph or querying traffic bounds.
///
/// None of these are retried: each one terminates the current analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundError {
    #[error("Step function cannot go back in time: value set at {time}, but already valid up to {valid_up_to}")]
    OutOfOrder { time: Time, valid_up_to: Time },

    #[error("Step function must be monotonic: value {value} at {time} is below the current maximum {maximum}")]
    MonotonicityViolation {
        time: Time,
        value: String,
        maximum: String,
    },

    #[error("Function not defined at {time} (valid up to {valid_up_to})")]
    Undefined { time: Time, valid_up_to: Time },

    #[error("No value above {value} (function maximum is {maximum})")]
    NoSuchBound { value: String, maximum: String },

    #[error("No block labeled '{label}'")]
    NotFound { label: String },

    #[error("Block '{block}' has message index {index} out of range ({count} messages)")]
    NoSuchMessage {
        block: String,
        index: usize,
        count: usize,
    },

    #[error("Block '{block}': cannot compute the next bound increment, every path back to it carries no traffic")]
    DegenerateCycle { block: String },

    #[error("Duplicate block label '{label}'")]
    DuplicateBlock { label: String },

    #[error("Block '{label}' must have a positive period")]
    ZeroPeriod { label: String },

    #[error("Message offset invalid (below zero or exceeding period): {block}/{message} at {offset}, period {period}")]
    OffsetOutOfRange {
        block: String,
        message: String,
        offset: Time,
        period: Time,
    },

    #[error("Message {block}/{message} at offset {offset} is scheduled before the preceding message at {previous}")]
    UnorderedOffset {
        block: String,
        message: String,
        offset: Time,
        previous: Time,
    },

    #[error("Traffic of block '{block}' does not fit into 64 bits")]
    TrafficOverflow { block: String },

    #[error("Period of block '{block}' does not fit into 64 bits")]
    PeriodOverflow { block: String },

    #[error("Unknown block handle #{index}")]
    UnknownBlockId { index: usize },

    #[error("Pseudo-periodic function needs a positive period length")]
    ZeroPeriodLength,

    #[error("Pseudo-periodic function needs a non-negative period increment, got {increment}")]
    NegativeIncrement { increment: String },

    #[error("Protocol graph has no blocks")]
    EmptyGraph,

    #[error("Threshold must be positive")]
    InvalidThreshold,

    #[error("Number of successive blocks must be at least 1, got {count}")]
    InvalidBlockCount { count: usize },

    #[error("Block '{label}': {source}")]
    InBlock {
        label: String,
        #[source]
        source: Box<BoundError>,
    },
}

impl BoundError {
    /// Attach the label of the block whose cached bound raised this error.
    pub fn in_block(self, label: &str) -> Self {
        match self {
            err @ (BoundError::InBlock { .. }
            | BoundError::DegenerateCycle { .. }
            | BoundError::NotFound { .. }
            | BoundError::TrafficOverflow { .. }) => err,
            other => BoundError::InBlock {
                label: label.to_owned(),
                source: Box::new(other),
            },
        }
    }

    /// The error without any block context wrappers.
    pub fn root(&self) -> &BoundError {
        match self {
            BoundError::InBlock { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_context_wraps_step_function_errors_once() {
        let err = BoundError::Undefined {
            time: 12,
            valid_up_to: 10,
        }
        .in_block("B0")
        .in_block("B1");
        assert_eq!(
            err.to_string(),
            "Block 'B0': Function not defined at 12 (valid up to 10)"
        );
        assert!(matches!(err.root(), BoundError::Undefined { time: 12, .. }));
    }

    #[test]
    fn labelled_errors_are_not_wrapped() {
        let err = BoundError::DegenerateCycle {
            block: "idle".into(),
        }
        .in_block("idle");
        assert!(matches!(err, BoundError::DegenerateCycle { .. }));
    }
}
