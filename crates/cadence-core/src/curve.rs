//! Piecewise-linear arrival curves.
//!
//! Only what the hull extraction produces and formatters consume: an ordered
//! list of segments, point evaluation and the DiscoDNC textual notation.

use std::fmt;

use num::rational::BigRational;
use num::traits::{ToPrimitive, Zero};

/// A linear piece starting at `(x, y)` with the given slope.
///
/// A left-open segment does not define the value at `x` itself; there the
/// curve keeps the value of the preceding segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearSegment {
    pub x: BigRational,
    pub y: BigRational,
    pub slope: BigRational,
    pub left_open: bool,
}

impl LinearSegment {
    pub fn new(x: BigRational, y: BigRational, slope: BigRational, left_open: bool) -> Self {
        Self {
            x,
            y,
            slope,
            left_open,
        }
    }

    /// Flat segment at zero starting at the origin.
    pub fn horizontal_zero() -> Self {
        Self::new(
            BigRational::zero(),
            BigRational::zero(),
            BigRational::zero(),
            false,
        )
    }

    /// Value of the segment's line at `x`.
    pub fn value_at(&self, x: &BigRational) -> BigRational {
        &self.y + &self.slope * (x - &self.x)
    }

    fn covers(&self, x: &BigRational) -> bool {
        self.x < *x || (self.x == *x && !self.left_open)
    }
}

impl fmt::Display for LinearSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.left_open {
            write!(f, "!")?;
        }
        write!(
            f,
            "({},{}),{}",
            Decimal(&self.x),
            Decimal(&self.y),
            Decimal(&self.slope)
        )
    }
}

/// Concave piecewise-linear upper bound on traffic over interval length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArrivalCurve {
    segments: Vec<LinearSegment>,
}

impl ArrivalCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, segment: LinearSegment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[LinearSegment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Index of the segment defining the curve at `x`.
    pub fn segment_defining(&self, x: &BigRational) -> Option<usize> {
        self.segments.iter().rposition(|s| s.covers(x))
    }

    /// Curve value at `x`; zero left of the first segment.
    pub fn value_at(&self, x: &BigRational) -> BigRational {
        match self.segment_defining(x) {
            Some(idx) => self.segments[idx].value_at(x),
            None => BigRational::zero(),
        }
    }

    /// Whether slopes never increase from one segment to the next.
    pub fn is_concave(&self) -> bool {
        // The leading segment at the origin is flat by construction.
        self.segments
            .iter()
            .skip(1)
            .zip(self.segments.iter().skip(2))
            .all(|(a, b)| b.slope <= a.slope)
    }
}

impl fmt::Display for ArrivalCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "{segment}")?;
        }
        write!(f, "}}")
    }
}

/// Renders a rational the way the DiscoDNC notation expects: integers as
/// `N.0`, everything else as the nearest `f64`.
pub struct Decimal<'a>(pub &'a BigRational);

impl fmt::Display for Decimal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_integer() {
            return write!(f, "{}.0", self.0.to_integer());
        }
        match self.0.to_f64() {
            Some(v) => write!(f, "{v}"),
            None => write!(f, "{}", self.0),
        }
    }
}
