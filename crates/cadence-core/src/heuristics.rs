//! Heuristics turning a protocol graph into a pseudo-periodic upper bound.
//!
//! All three walk the graph-wide max-traffic function from one increase to
//! the next instead of sampling it, so their cost depends on the number of
//! distinct bound values, not on the length of the horizon.

use num::rational::BigRational;
use num::traits::Zero;
use tracing::{debug, trace};

use crate::error::BoundError;
use crate::graph::ProtocolGraph;
use crate::pseudo_periodic::{traffic_to_rational, PseudoPeriodicFunction};
use crate::{Time, Traffic};

impl ProtocolGraph {
    /// Bound the max-traffic function exactly up to `threshold` and repeat it
    /// with period `threshold` beyond.
    ///
    /// Sound for every graph because the max-traffic function is
    /// sub-additive.
    pub fn approximate_subadditive(
        &mut self,
        threshold: Time,
    ) -> Result<PseudoPeriodicFunction, BoundError> {
        if threshold == 0 {
            return Err(BoundError::InvalidThreshold);
        }
        let increment = self.max_traffic(threshold)?;
        let mut function =
            PseudoPeriodicFunction::new(0, threshold, traffic_to_rational(increment))?;
        function.set_traffic_at(0, 0)?;

        let mut value = 0;
        while let Some(time) = self.first_time_exceeding(value)? {
            if time > threshold {
                break;
            }
            value = self.max_traffic(time)?;
            trace!(time, value, "subadditive breakpoint");
            function.set_traffic_at(time, value)?;
        }
        function.set_traffic_at(threshold, increment)?;

        debug!(
            threshold,
            breakpoints = function.increment_times().len(),
            "subadditive approximation done"
        );
        Ok(function)
    }

    /// Exact bound up to twice the longest period, then growth at the
    /// highest average block traffic.
    ///
    /// Meant for fully connected graphs, where any block may follow any
    /// other one.
    pub fn approximate_most_efficient_loop(
        &mut self,
    ) -> Result<PseudoPeriodicFunction, BoundError> {
        if self.is_empty() {
            return Err(BoundError::EmptyGraph);
        }
        let horizon = self.longest_block_period().saturating_mul(2);
        let average = self.highest_average_block_traffic();
        let mut function = PseudoPeriodicFunction::new(horizon, 1, average)?;

        self.record_exact_bound(&mut function, horizon)?;

        let split = self
            .split_traffic_between_prefix_and_suffix()?
            .max(function.initial_maximum());
        function.set_value_at(horizon, split)?;

        debug!(
            horizon,
            breakpoints = function.increment_times().len(),
            "most efficient loop approximation done"
        );
        Ok(function)
    }

    /// Exact bound up to twice the shortest period, one more period derived
    /// from prefix/suffix splits, then growth by the highest block traffic
    /// per period.
    ///
    /// Meant for rescaled graphs, where all blocks share one period and
    /// follow each other freely.
    pub fn approximate_tightest_loop(&mut self) -> Result<PseudoPeriodicFunction, BoundError> {
        if self.is_empty() {
            return Err(BoundError::EmptyGraph);
        }
        let period = self.shortest_block_period();
        let horizon = period.saturating_mul(2);
        let highest = self.highest_block_traffic();
        let mut function =
            PseudoPeriodicFunction::new(horizon, period, traffic_to_rational(highest))?;

        let mut running = self.record_exact_bound(&mut function, horizon)?;

        for time in period..horizon {
            let value = highest.saturating_add(self.divide_traffic_between_prefix_and_suffix(time)?);
            running = running.max(value);
            function.set_traffic_at(period + time, running)?;
        }

        debug!(
            period,
            breakpoints = function.increment_times().len(),
            "tightest loop approximation done"
        );
        Ok(function)
    }

    /// Record every increase of the max-traffic function before `horizon`.
    ///
    /// # Returns
    /// The last recorded value.
    fn record_exact_bound(
        &mut self,
        function: &mut PseudoPeriodicFunction,
        horizon: Time,
    ) -> Result<Traffic, BoundError> {
        let mut time = 0;
        let mut value = 0;
        let mut recorded = 0;
        while time < horizon {
            trace!(time, horizon, "exact bound step");
            function.set_traffic_at(time, value)?;
            recorded = value;
            let Some(next) = self.first_time_exceeding(value)? else {
                break;
            };
            time = next;
            value = self.max_traffic(time)?;
        }
        Ok(recorded)
    }

    /// Largest traffic over twice the longest period, split into a suffix of
    /// one block followed by a loop at average rate and a prefix.
    pub fn split_traffic_between_prefix_and_suffix(&mut self) -> Result<BigRational, BoundError> {
        let longest = self.longest_block_period();
        let horizon = longest.saturating_mul(2);

        let mut best = BigRational::zero();
        let mut in_suffix = 0;
        while in_suffix < longest {
            let traffic = self.max_suffix(in_suffix)?;
            let candidate = traffic_to_rational(traffic)
                + self.split_traffic_between_loop_and_prefix(horizon - in_suffix)?;
            if candidate > best {
                best = candidate;
            }
            match self.first_time_exceeding_in_suffix(traffic)? {
                Some(next) => in_suffix = next,
                None => break,
            }
        }
        Ok(best)
    }

    /// Largest traffic over `time` split into a loop at the highest average
    /// rate followed by a prefix.
    pub fn split_traffic_between_loop_and_prefix(
        &mut self,
        time: Time,
    ) -> Result<BigRational, BoundError> {
        let average = self.highest_average_block_traffic();

        let mut best = BigRational::zero();
        let mut in_prefix = 0;
        while in_prefix < time {
            let traffic = self.max_prefix(in_prefix)?;
            let candidate =
                traffic_to_rational(time - in_prefix) * &average + traffic_to_rational(traffic);
            if candidate > best {
                best = candidate;
            }
            match self.first_time_exceeding_in_prefix(traffic)? {
                Some(next) => in_prefix = next,
                None => break,
            }
        }
        Ok(best)
    }

    /// Largest traffic over `time` split into a suffix of one block and a
    /// prefix of the next.
    ///
    /// Only the split points where the prefix bound increases are tried; in
    /// between, moving the split left can only grow the suffix.
    pub fn divide_traffic_between_prefix_and_suffix(
        &mut self,
        time: Time,
    ) -> Result<Traffic, BoundError> {
        let mut best: Traffic = 0;
        let mut in_prefix = 0;
        loop {
            let prefix = self.max_prefix(in_prefix)?;
            let suffix = self.max_suffix(time - in_prefix)?;
            best = best.max(suffix.saturating_add(prefix));
            match self.first_time_exceeding_in_prefix(prefix)? {
                Some(next) if next <= time => in_prefix = next,
                _ => break,
            }
        }
        Ok(best)
    }
}
