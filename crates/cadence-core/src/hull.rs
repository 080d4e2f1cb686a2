//! Concave majorant of a pseudo-periodic function.
//!
//! Traffic recorded at breakpoint `t` is treated as arriving at `t - 1 + ε`,
//! so every vertex sits at `x = max(t - 1, 0)` and every segment after the
//! origin is open on the left. All coordinates and slopes are exact.

use num::rational::BigRational;
use num::traits::Zero;
use num::BigInt;
use tracing::{debug, warn};

use crate::curve::{ArrivalCurve, LinearSegment};
use crate::pseudo_periodic::PseudoPeriodicFunction;

#[derive(Debug, Clone)]
struct Vertex {
    x: BigRational,
    y: BigRational,
}

/// Partial search for a segment ending at vertex `to`.
struct Frame {
    to: usize,
    min_slope: BigRational,
    start: usize,
    slope: BigRational,
    /// Smallest slope from any vertex strictly between `start` and `to`.
    max_slope: BigRational,
}

impl Frame {
    fn open(vertices: &[Vertex], to: usize, min_slope: BigRational) -> Self {
        let start = to - 1;
        let slope = slope(vertices, start, to);
        Self {
            to,
            min_slope,
            start,
            max_slope: slope.clone(),
            slope,
        }
    }

    /// Move the segment start one vertex further back.
    fn advance(&mut self, vertices: &[Vertex]) -> bool {
        if self.start == 0 {
            return false;
        }
        self.start -= 1;
        if self.slope <= self.max_slope {
            self.max_slope = self.slope.clone();
        }
        self.slope = slope(vertices, self.start, self.to);
        true
    }
}

impl PseudoPeriodicFunction {
    /// Concave piecewise-linear curve lying above the function everywhere.
    ///
    /// The curve starts with a closed flat segment at the origin, continues
    /// through a concave chain of breakpoints and ends with a segment of the
    /// long-run slope `increment / length`. The leading flat segment pins
    /// `f(0) = 0` for the left-open chain that follows; DiscoDNC curves spell
    /// it out the same way, and it is present on the rough fallback too.
    pub fn concave_hull(&self) -> ArrivalCurve {
        let vertices = shifted_vertices(self);
        let final_slope = self.final_slope();

        // Vertex maximizing y - x * final_slope; the earliest wins ties.
        let mut last = 0;
        let mut best_offset = BigRational::zero();
        for (idx, v) in vertices.iter().enumerate() {
            let offset = &v.y - &v.x * &final_slope;
            if offset > best_offset {
                best_offset = offset;
                last = idx;
            }
        }

        let mut curve = ArrivalCurve::new();
        curve.add_segment(LinearSegment::horizontal_zero());

        let Some(mut chain) = concave_chain(&vertices, last, final_slope.clone()) else {
            warn!("unable to find a concave hull, using a rough approximation");
            curve.add_segment(LinearSegment::new(
                BigRational::zero(),
                best_offset,
                final_slope,
                true,
            ));
            return curve;
        };

        chain.push(last);
        for pair in chain.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            curve.add_segment(LinearSegment::new(
                vertices[from].x.clone(),
                vertices[from].y.clone(),
                slope(&vertices, from, to),
                true,
            ));
        }
        let end = &vertices[last];
        curve.add_segment(LinearSegment::new(
            end.x.clone(),
            end.y.clone(),
            final_slope,
            true,
        ));
        debug!(segments = curve.segment_count(), "concave hull extracted");
        curve
    }
}

/// Breakpoints moved to `max(t - 1, 0)`, merged where they coincide and
/// anchored at `x = 0`.
fn shifted_vertices(function: &PseudoPeriodicFunction) -> Vec<Vertex> {
    let mut vertices: Vec<Vertex> = Vec::with_capacity(function.increment_times().len() + 1);
    for (&time, value) in function
        .increment_times()
        .iter()
        .zip(function.increment_values())
    {
        let x = BigRational::from_integer(BigInt::from(time.saturating_sub(1)));
        match vertices.last_mut() {
            Some(prev) if prev.x == x => {
                if *value > prev.y {
                    prev.y = value.clone();
                }
            }
            _ => vertices.push(Vertex {
                x,
                y: value.clone(),
            }),
        }
    }
    if vertices.first().map_or(true, |v| !v.x.is_zero()) {
        vertices.insert(
            0,
            Vertex {
                x: BigRational::zero(),
                y: BigRational::zero(),
            },
        );
    }
    vertices
}

fn slope(vertices: &[Vertex], from: usize, to: usize) -> BigRational {
    (&vertices[to].y - &vertices[from].y) / (&vertices[to].x - &vertices[from].x)
}

/// Vertex indices, ascending and starting at 0, of a concave chain ending
/// at `to` whose last slope is at least `min_slope`.
///
/// Each frame tries segment starts from `to - 1` backwards. A start is only
/// usable while its segment stays above every vertex it skips, and the chain
/// before it must end with a slope no smaller than the segment's own.
fn concave_chain(vertices: &[Vertex], to: usize, min_slope: BigRational) -> Option<Vec<usize>> {
    if to == 0 {
        return Some(Vec::new());
    }

    // A chain that fails for some minimum slope fails for every larger one.
    let mut failed_at: Vec<Option<BigRational>> = vec![None; vertices.len()];

    let mut chain = Vec::new();
    let mut stack = vec![Frame::open(vertices, to, min_slope)];
    let mut child: Option<bool> = None;

    while let Some(frame) = stack.last_mut() {
        match child.take() {
            Some(true) => {
                chain.push(frame.start);
                stack.pop();
                child = Some(true);
                continue;
            }
            Some(false) => {
                if !frame.advance(vertices) {
                    let done = stack.pop();
                    record_failure(&mut failed_at, done);
                    child = Some(false);
                    continue;
                }
            }
            None => {}
        }

        if frame.slope < frame.min_slope {
            let done = stack.pop();
            record_failure(&mut failed_at, done);
            child = Some(false);
            continue;
        }

        if frame.slope <= frame.max_slope {
            if frame.start == 0 {
                chain.push(0);
                stack.pop();
                child = Some(true);
                continue;
            }
            let known_failure = failed_at[frame.start]
                .as_ref()
                .is_some_and(|failed| frame.slope >= *failed);
            if !known_failure {
                let next = Frame::open(vertices, frame.start, frame.slope.clone());
                stack.push(next);
                continue;
            }
        }

        if !frame.advance(vertices) {
            let done = stack.pop();
            record_failure(&mut failed_at, done);
            child = Some(false);
        }
    }

    match child {
        Some(true) => Some(chain),
        _ => None,
    }
}

fn record_failure(failed_at: &mut [Option<BigRational>], frame: Option<Frame>) {
    let Some(frame) = frame else {
        return;
    };
    let entry = &mut failed_at[frame.to];
    if entry.as_ref().map_or(true, |known| frame.min_slope < *known) {
        *entry = Some(frame.min_slope);
    }
}
