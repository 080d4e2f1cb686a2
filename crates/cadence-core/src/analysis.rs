//! One analysis run: heuristic selection, automatic parameters and the
//! resulting arrival curve.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::curve::ArrivalCurve;
use crate::error::BoundError;
use crate::graph::ProtocolGraph;
use crate::pseudo_periodic::PseudoPeriodicFunction;
use crate::transform::{fully_connect, rescale};
use crate::Time;

/// Time budget shared by the automatic block-count choices.
const AUTO_BLOCK_BUDGET: Time = 20_000_000_000;
/// Upper limit for automatically chosen successive block counts.
const MAX_AUTO_BLOCKS: usize = 8;

/// Which approximation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Heuristic {
    /// Exact bound up to a threshold, repeated beyond it.
    #[default]
    Subadditive,
    /// Most efficient loop over a fully connected model.
    Loop,
    /// Tightest loop over a fully connected model rescaled to one period.
    Rescale,
}

impl Heuristic {
    pub const ALL: [Heuristic; 3] = [Heuristic::Subadditive, Heuristic::Loop, Heuristic::Rescale];

    pub fn as_str(self) -> &'static str {
        match self {
            Heuristic::Subadditive => "subadditive",
            Heuristic::Loop => "loop",
            Heuristic::Rescale => "rescale",
        }
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Heuristic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "subadditive" => Ok(Heuristic::Subadditive),
            "loop" => Ok(Heuristic::Loop),
            "rescale" => Ok(Heuristic::Rescale),
            other => Err(format!(
                "unknown heuristic '{other}' (expected one of: subadditive, loop, rescale)"
            )),
        }
    }
}

/// Parameters of an analysis run. Zero means "choose automatically".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub heuristic: Heuristic,
    /// Subadditive threshold; also fixes the display horizon when set.
    pub threshold: Time,
    /// Successive blocks merged by the loop heuristics.
    pub num_blocks: usize,
}

impl AnalysisOptions {
    pub fn new(heuristic: Heuristic) -> Self {
        Self {
            heuristic,
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: Time) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_num_blocks(mut self, num_blocks: usize) -> Self {
        self.num_blocks = num_blocks;
        self
    }
}

/// Outcome of [`analyze`].
#[derive(Debug, Clone)]
pub struct Analysis {
    pub heuristic: Heuristic,
    /// Threshold actually used by the subadditive heuristic.
    pub threshold: Option<Time>,
    /// Successive block count actually used by the loop heuristics.
    pub num_blocks: Option<usize>,
    pub function: PseudoPeriodicFunction,
    pub curve: ArrivalCurve,
    /// Interval length up to which results are worth printing.
    pub horizon: Time,
}

/// Run the heuristic selected in `options` and extract the arrival curve.
///
/// The subadditive heuristic queries `graph` directly and leaves its bound
/// caches filled; the loop heuristics work on derived graphs.
pub fn analyze(graph: &mut ProtocolGraph, options: &AnalysisOptions) -> Result<Analysis, BoundError> {
    let (function, threshold, num_blocks) = match options.heuristic {
        Heuristic::Subadditive => {
            let threshold = subadditive_threshold(graph, options.threshold)?;
            info!(threshold, "using threshold");
            let function = graph.approximate_subadditive(threshold)?;
            (function, Some(threshold), None)
        }
        Heuristic::Loop => {
            let n = loop_block_count(graph.longest_block_period(), options.num_blocks)?;
            info!(blocks = n, "using consecutive blocks");
            let mut model = fully_connect(graph, n)?;
            info!(blocks = model.block_count(), "fully connected model created");
            (model.approximate_most_efficient_loop()?, None, Some(n))
        }
        Heuristic::Rescale => {
            let n = loop_block_count(graph.shortest_block_period(), options.num_blocks)?;
            info!(blocks = n, "using consecutive blocks");
            let mut model = rescale(&fully_connect(graph, n)?)?;
            info!(
                blocks = model.block_count(),
                period = model.shortest_block_period(),
                "rescaled model created"
            );
            (model.approximate_tightest_loop()?, None, Some(n))
        }
    };
    info!(heuristic = %options.heuristic, "approximation created");

    let curve = function.concave_hull();
    let horizon = display_horizon(&function, options.threshold);
    Ok(Analysis {
        heuristic: options.heuristic,
        threshold,
        num_blocks,
        function,
        curve,
        horizon,
    })
}

/// Explicit threshold, or four times the longest block period.
pub fn subadditive_threshold(graph: &ProtocolGraph, requested: Time) -> Result<Time, BoundError> {
    if requested > 0 {
        return Ok(requested);
    }
    match graph.longest_block_period().saturating_mul(4) {
        0 => Err(BoundError::EmptyGraph),
        auto => Ok(auto),
    }
}

/// Explicit block count, or as many blocks of `period` as fit into the
/// automatic time budget, between 1 and 8.
pub fn loop_block_count(period: Time, requested: usize) -> Result<usize, BoundError> {
    if requested > 0 {
        return Ok(requested);
    }
    if period == 0 {
        return Err(BoundError::EmptyGraph);
    }
    let fit = AUTO_BLOCK_BUDGET / period;
    Ok(usize::try_from(fit)
        .unwrap_or(MAX_AUTO_BLOCKS)
        .clamp(1, MAX_AUTO_BLOCKS))
}

/// Twice an explicit threshold, otherwise three periods past the start of
/// the periodic part.
pub fn display_horizon(function: &PseudoPeriodicFunction, threshold: Time) -> Time {
    if threshold > 0 {
        return threshold.saturating_mul(2);
    }
    function
        .period_begin()
        .saturating_add(function.period_length().saturating_mul(3))
}
