#![doc = include_str!("../README.md")]

//! Traffic bounds for periodic block-structured protocols.
//!
//! Graphs are assembled with a [`GraphBuilder`] and queried through
//! [`ProtocolGraph`], whose blocks memoize their prefix and suffix bounds as
//! [`StepFunction`]s. The heuristics turn those bounds into a
//! [`PseudoPeriodicFunction`], and its concave hull is the resulting
//! [`ArrivalCurve`].

pub mod analysis;
pub mod block;
pub mod curve;
pub mod engine;
pub mod error;
pub mod graph;
pub mod heuristics;
pub mod hull;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod pseudo_periodic;
pub mod step_function;
pub mod transform;

/// Discrete time, in the protocol's time unit.
pub type Time = u64;
/// Amount of traffic, in the protocol's size unit.
pub type Traffic = u64;

pub use analysis::{analyze, Analysis, AnalysisOptions, Heuristic};
pub use block::{Block, BlockId, Direction, Message};
pub use curve::{ArrivalCurve, Decimal, LinearSegment};
pub use engine::BlockQuery;
pub use error::BoundError;
pub use graph::{GraphBuilder, ProtocolGraph};
pub use pseudo_periodic::PseudoPeriodicFunction;
pub use step_function::StepFunction;
pub use transform::{fully_connect, rescale, successive_blocks};
