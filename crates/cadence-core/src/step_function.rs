//! Sparse monotone step functions over discrete time.
//!
//! A [`StepFunction`] records the instants at which a cumulative quantity
//! increases. It only ever grows to the right: values may be appended or the
//! rightmost breakpoint refined, but nothing left of `valid_up_to` changes.

use std::fmt;
use std::ops::Sub;

use num::traits::Zero;

use crate::error::BoundError;
use crate::Time;

/// Value domain of a step function.
///
/// Implemented for every totally ordered numeric type with a zero, which
/// covers `u64` traffic counts and exact `BigRational` bounds.
pub trait StepValue: Clone + Ord + Zero + Sub<Output = Self> + fmt::Debug + fmt::Display {}

impl<T> StepValue for T where T: Clone + Ord + Zero + Sub<Output = T> + fmt::Debug + fmt::Display {}

/// Monotone non-decreasing step function.
///
/// `times` is strictly increasing and `values` is strictly increasing as
/// well, since consecutive equal values are never stored. Before the first
/// breakpoint the function is zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFunction<V = u64> {
    times: Vec<Time>,
    values: Vec<V>,
    valid_up_to: Time,
}

impl<V: StepValue> Default for StepFunction<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: StepValue> StepFunction<V> {
    pub fn new() -> Self {
        Self {
            times: Vec::new(),
            values: Vec::new(),
            valid_up_to: 0,
        }
    }

    /// Step function with a single `(0, 0)` breakpoint.
    pub fn anchored() -> Self {
        Self {
            times: vec![0],
            values: vec![V::zero()],
            valid_up_to: 0,
        }
    }

    /// Append or refine the rightmost breakpoint.
    ///
    /// # Parameters
    /// - `time`: breakpoint time, never before `valid_up_to`.
    /// - `value`: function value from `time` on, never below the current maximum.
    ///
    /// # Returns
    /// [`BoundError::OutOfOrder`] or [`BoundError::MonotonicityViolation`] when
    /// the step function contract would be broken.
    pub fn set_value_at(&mut self, time: Time, value: V) -> Result<(), BoundError> {
        let Some(&last_time) = self.times.last() else {
            self.times.push(time);
            self.values.push(value);
            self.valid_up_to = time;
            return Ok(());
        };

        if time < self.valid_up_to {
            return Err(BoundError::OutOfOrder {
                time,
                valid_up_to: self.valid_up_to,
            });
        }

        let maximum = self.maximum_value();
        if value < maximum {
            return Err(BoundError::MonotonicityViolation {
                time,
                value: value.to_string(),
                maximum: maximum.to_string(),
            });
        }

        if time == last_time {
            if let Some(last) = self.values.last_mut() {
                *last = value;
            }
            return Ok(());
        }

        self.valid_up_to = time;
        if value == maximum {
            return Ok(());
        }

        self.times.push(time);
        self.values.push(value);
        Ok(())
    }

    /// Extend the defined range to `time` without changing any value.
    pub fn extend_to(&mut self, time: Time) -> Result<(), BoundError> {
        if time <= self.valid_up_to && !self.times.is_empty() {
            return Ok(());
        }
        self.set_value_at(time, self.maximum_value())
    }

    /// Value at `time`.
    ///
    /// # Returns
    /// [`BoundError::Undefined`] if `time` lies beyond `valid_up_to`.
    pub fn value_at(&self, time: Time) -> Result<V, BoundError> {
        if time > self.valid_up_to {
            return Err(BoundError::Undefined {
                time,
                valid_up_to: self.valid_up_to,
            });
        }
        Ok(self.value_unchecked(time))
    }

    fn value_unchecked(&self, time: Time) -> V {
        match self.times.binary_search(&time) {
            Ok(idx) => self.values[idx].clone(),
            Err(0) => V::zero(),
            Err(idx) => self.values[idx - 1].clone(),
        }
    }

    /// Smallest time at which the function strictly exceeds `value`.
    ///
    /// # Returns
    /// [`BoundError::NoSuchBound`] if `value` is at or above [`Self::maximum_value`].
    pub fn first_time_exceeding(&self, value: &V) -> Result<Time, BoundError> {
        let maximum = self.maximum_value();
        if *value >= maximum {
            return Err(BoundError::NoSuchBound {
                value: value.to_string(),
                maximum: maximum.to_string(),
            });
        }

        let idx = match self.values.binary_search(value) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        Ok(self.times[idx])
    }

    /// Largest increment over any window of length `len` that starts at a
    /// breakpoint no later than `latest_start`.
    ///
    /// A maximal window of fixed length always starts exactly at a step, so
    /// only breakpoints need to be tried. The caller must have made the
    /// function valid up to `latest_start + len - 1`.
    pub fn maximum_interval(&self, len: Time, latest_start: Time) -> Result<V, BoundError> {
        let mut max = V::zero();
        if len == 0 {
            return Ok(max);
        }

        for (idx, &start) in self.times.iter().enumerate() {
            if start > latest_start {
                break;
            }
            let before = if idx == 0 {
                V::zero()
            } else {
                self.values[idx - 1].clone()
            };
            let end = start.saturating_add(len - 1);
            let traffic = self.value_at(end)? - before;
            if traffic > max {
                max = traffic;
            }
        }
        Ok(max)
    }

    /// First breakpoint strictly after `time`, if any.
    pub fn next_increment_time_after(&self, time: Time) -> Option<Time> {
        let idx = match self.times.binary_search(&time) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        self.times.get(idx).copied()
    }

    /// Time of the last value change.
    pub fn last_step_time(&self) -> Option<Time> {
        self.times.last().copied()
    }

    /// Largest value taken by the function, zero when empty.
    pub fn maximum_value(&self) -> V {
        self.values.last().cloned().unwrap_or_else(V::zero)
    }

    /// Rightmost time for which the function is defined.
    pub fn valid_up_to(&self) -> Time {
        self.valid_up_to
    }

    pub fn times(&self) -> &[Time] {
        &self.times
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Iterate over `(time, value)` breakpoints in time order.
    pub fn breakpoints(&self) -> impl Iterator<Item = (Time, &V)> + '_ {
        self.times.iter().copied().zip(self.values.iter())
    }
}

impl<V: StepValue> fmt::Display for StepFunction<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (time, value)) in self.breakpoints().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({time}, {value})")?;
        }
        write!(f, "] valid up to {}", self.valid_up_to)
    }
}
