//! Eventually periodic upper bounds.

use std::fmt;

use num::rational::BigRational;
use num::traits::Signed;
use num::BigInt;

use crate::error::BoundError;
use crate::step_function::StepFunction;
use crate::{Time, Traffic};

/// Non-decreasing function given explicitly on `[0, begin + length)` and
/// by `f(t) = f(t - r * length) + r * increment` from `begin` on, where
/// `r = (t - begin) / length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoPeriodicFunction {
    period_begin: Time,
    period_length: Time,
    period_increment: BigRational,
    initial: StepFunction<BigRational>,
}

impl PseudoPeriodicFunction {
    /// # Returns
    /// [`BoundError::ZeroPeriodLength`] or [`BoundError::NegativeIncrement`]
    /// when the periodic part would not be a non-decreasing repetition.
    pub fn new(
        period_begin: Time,
        period_length: Time,
        period_increment: BigRational,
    ) -> Result<Self, BoundError> {
        if period_length == 0 {
            return Err(BoundError::ZeroPeriodLength);
        }
        if period_increment.is_negative() {
            return Err(BoundError::NegativeIncrement {
                increment: period_increment.to_string(),
            });
        }
        Ok(Self {
            period_begin,
            period_length,
            period_increment,
            initial: StepFunction::new(),
        })
    }

    /// Record a breakpoint of the explicit part.
    pub fn set_value_at(&mut self, time: Time, value: BigRational) -> Result<(), BoundError> {
        self.initial.set_value_at(time, value)
    }

    /// Shorthand for [`Self::set_value_at`] with an integral traffic value.
    pub fn set_traffic_at(&mut self, time: Time, value: Traffic) -> Result<(), BoundError> {
        self.set_value_at(time, traffic_to_rational(value))
    }

    pub fn value_at(&self, time: Time) -> Result<BigRational, BoundError> {
        let periodic_from = self.period_begin.saturating_add(self.period_length);
        if time < periodic_from {
            return self.initial.value_at(time);
        }
        let elapsed = time - self.period_begin;
        let repetitions = elapsed / self.period_length;
        let leftover = self.period_begin + elapsed % self.period_length;
        let base = self.initial.value_at(leftover)?;
        Ok(base + &self.period_increment * BigRational::from_integer(BigInt::from(repetitions)))
    }

    pub fn period_begin(&self) -> Time {
        self.period_begin
    }

    pub fn period_length(&self) -> Time {
        self.period_length
    }

    pub fn period_increment(&self) -> &BigRational {
        &self.period_increment
    }

    /// Long-run slope `increment / length`.
    pub fn final_slope(&self) -> BigRational {
        &self.period_increment / BigRational::from_integer(BigInt::from(self.period_length))
    }

    pub fn initial_part(&self) -> &StepFunction<BigRational> {
        &self.initial
    }

    /// Breakpoint times of the explicit part.
    pub fn increment_times(&self) -> &[Time] {
        self.initial.times()
    }

    /// Breakpoint values of the explicit part.
    pub fn increment_values(&self) -> &[BigRational] {
        self.initial.values()
    }

    /// Largest value recorded in the explicit part.
    pub fn initial_maximum(&self) -> BigRational {
        self.initial.maximum_value()
    }
}

impl fmt::Display for PseudoPeriodicFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} then +{} every {} from {}",
            self.initial, self.period_increment, self.period_length, self.period_begin
        )
    }
}

pub fn traffic_to_rational(value: Traffic) -> BigRational {
    BigRational::from_integer(BigInt::from(value))
}
