//! Output formatters.
//!
//! Each formatter renders up to three artifacts: the exact max-traffic
//! function, the pseudo-periodic approximation and the arrival curve. The
//! first two are only requested in verbose mode.

use std::io::Write;

use cadence_core::{
    ArrivalCurve, Decimal, LinearSegment, ProtocolGraph, PseudoPeriodicFunction, Time,
};
use num::rational::BigRational;
use num::traits::ToPrimitive;
use serde::Serialize;

use crate::errors::CliError;

pub(crate) trait OutputFormatter {
    fn name(&self) -> &'static str;

    /// Exact max-traffic function of `graph` up to `horizon`.
    fn print_max_traffic(
        &self,
        out: &mut dyn Write,
        graph: &mut ProtocolGraph,
        horizon: Time,
    ) -> Result<(), CliError>;

    /// `function` evaluated at the breakpoints of the exact bound up to
    /// `horizon`.
    fn print_pseudo_periodic_function(
        &self,
        out: &mut dyn Write,
        graph: &mut ProtocolGraph,
        function: &PseudoPeriodicFunction,
        horizon: Time,
    ) -> Result<(), CliError>;

    /// `curve`, drawn up to `horizon` where the format needs an end point.
    fn print_arrival_curve(
        &self,
        out: &mut dyn Write,
        curve: &ArrivalCurve,
        horizon: Time,
    ) -> Result<(), CliError>;
}

/// Exact bound on `[0, horizon]` as a step function.
fn exact_bound(
    graph: &mut ProtocolGraph,
    horizon: Time,
) -> Result<PseudoPeriodicFunction, CliError> {
    Ok(graph.approximate_subadditive(horizon.max(1))?)
}

fn to_f64(value: &BigRational) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

fn join<T>(items: impl IntoIterator<Item = T>, render: impl Fn(T) -> String) -> String {
    items.into_iter().map(render).collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// discodnc
// ---------------------------------------------------------------------------

/// Only the arrival curve, in DiscoDNC curve notation.
pub(crate) struct DiscoDncFormatter;

impl OutputFormatter for DiscoDncFormatter {
    fn name(&self) -> &'static str {
        "discodnc"
    }

    fn print_max_traffic(
        &self,
        _out: &mut dyn Write,
        _graph: &mut ProtocolGraph,
        _horizon: Time,
    ) -> Result<(), CliError> {
        Ok(())
    }

    fn print_pseudo_periodic_function(
        &self,
        _out: &mut dyn Write,
        _graph: &mut ProtocolGraph,
        _function: &PseudoPeriodicFunction,
        _horizon: Time,
    ) -> Result<(), CliError> {
        Ok(())
    }

    fn print_arrival_curve(
        &self,
        out: &mut dyn Write,
        curve: &ArrivalCurve,
        _horizon: Time,
    ) -> Result<(), CliError> {
        writeln!(out, "{curve}")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// matplotlib
// ---------------------------------------------------------------------------

/// Python snippets plotting onto an existing `plt`.
pub(crate) struct MatplotlibFormatter;

impl OutputFormatter for MatplotlibFormatter {
    fn name(&self) -> &'static str {
        "matplotlib"
    }

    fn print_max_traffic(
        &self,
        out: &mut dyn Write,
        graph: &mut ProtocolGraph,
        horizon: Time,
    ) -> Result<(), CliError> {
        let exact = exact_bound(graph, horizon)?;
        let mut xs = join(exact.increment_times(), |t| t.to_string());
        let mut ys = join(exact.increment_values(), |v| Decimal(v).to_string());
        xs.push_str(&format!(", {horizon}"));
        ys.push_str(&format!(", {}", Decimal(&exact.value_at(horizon)?)));

        writeln!(out, "# Actual traffic up to {horizon}")?;
        writeln!(out, "x = [{xs}]")?;
        writeln!(out, "y = [{ys}]")?;
        writeln!(
            out,
            "legend_entry_mt, = plt.step(x, y, where='post', label='Max Traffic')"
        )?;
        writeln!(out)?;
        Ok(())
    }

    fn print_pseudo_periodic_function(
        &self,
        out: &mut dyn Write,
        graph: &mut ProtocolGraph,
        function: &PseudoPeriodicFunction,
        horizon: Time,
    ) -> Result<(), CliError> {
        let steps = exact_bound(graph, horizon)?.increment_times().to_vec();
        let mut ys = Vec::with_capacity(steps.len());
        for &t in &steps {
            ys.push(Decimal(&function.value_at(t)?).to_string());
        }
        let begin = function.period_begin();
        let end = begin.saturating_add(function.period_length());

        writeln!(out, "# Pseudo-periodic function up to {horizon}")?;
        writeln!(out, "plt.axvline({begin})")?;
        writeln!(out, "plt.axvline({end})")?;
        writeln!(out, "plt.axhline({})", Decimal(&function.value_at(begin)?))?;
        writeln!(out, "plt.axhline({})", Decimal(&function.value_at(end)?))?;
        writeln!(out, "x = [{}]", join(&steps, |t| t.to_string()))?;
        writeln!(out, "y = [{}]", ys.join(", "))?;
        writeln!(
            out,
            "legend_entry_pp, = plt.step(x, y, where='post', label='Pseudoperiodic Approximation')"
        )?;
        writeln!(out)?;
        Ok(())
    }

    fn print_arrival_curve(
        &self,
        out: &mut dyn Write,
        curve: &ArrivalCurve,
        horizon: Time,
    ) -> Result<(), CliError> {
        let end = BigRational::from_integer(horizon.into());
        let segments = curve.segments();
        let mut xs = Vec::with_capacity(segments.len() * 2);
        let mut ys = Vec::with_capacity(segments.len() * 2);
        for (i, segment) in segments.iter().enumerate() {
            // Each segment is drawn up to where the next one starts.
            let until = segments.get(i + 1).map_or(&end, |next| &next.x);
            xs.push(Decimal(&segment.x).to_string());
            ys.push(Decimal(&segment.y).to_string());
            xs.push(Decimal(until).to_string());
            ys.push(Decimal(&segment.value_at(until)).to_string());
        }

        writeln!(out, "# Concave hull up to {horizon}")?;
        writeln!(out, "x = [{}]", xs.join(", "))?;
        writeln!(out, "y = [{}]", ys.join(", "))?;
        writeln!(out, "legend_entry_ch, = plt.plot(x, y, label='Concave Hull')")?;
        writeln!(out)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// json
// ---------------------------------------------------------------------------

/// One JSON document per artifact, one document per line.
pub(crate) struct JsonFormatter;

#[derive(Serialize)]
struct Point {
    time: Time,
    value: f64,
    exact: String,
}

impl Point {
    fn new(time: Time, value: &BigRational) -> Self {
        Self {
            time,
            value: to_f64(value),
            exact: value.to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonDocument {
    MaxTraffic {
        horizon: Time,
        points: Vec<Point>,
    },
    PseudoPeriodicFunction {
        horizon: Time,
        period_begin: Time,
        period_length: Time,
        period_increment: String,
        points: Vec<Point>,
    },
    ArrivalCurve {
        horizon: Time,
        discodnc: String,
        segments: Vec<JsonSegment>,
    },
}

#[derive(Serialize)]
struct JsonSegment {
    x: f64,
    y: f64,
    slope: f64,
    left_open: bool,
    exact: [String; 3],
}

impl From<&LinearSegment> for JsonSegment {
    fn from(segment: &LinearSegment) -> Self {
        Self {
            x: to_f64(&segment.x),
            y: to_f64(&segment.y),
            slope: to_f64(&segment.slope),
            left_open: segment.left_open,
            exact: [
                segment.x.to_string(),
                segment.y.to_string(),
                segment.slope.to_string(),
            ],
        }
    }
}

fn write_document(out: &mut dyn Write, document: &JsonDocument) -> Result<(), CliError> {
    serde_json::to_writer(&mut *out, document)?;
    writeln!(out)?;
    Ok(())
}

impl OutputFormatter for JsonFormatter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn print_max_traffic(
        &self,
        out: &mut dyn Write,
        graph: &mut ProtocolGraph,
        horizon: Time,
    ) -> Result<(), CliError> {
        let exact = exact_bound(graph, horizon)?;
        let mut points: Vec<Point> = exact
            .initial_part()
            .breakpoints()
            .map(|(t, v)| Point::new(t, v))
            .collect();
        points.push(Point::new(horizon, &exact.value_at(horizon)?));
        write_document(out, &JsonDocument::MaxTraffic { horizon, points })
    }

    fn print_pseudo_periodic_function(
        &self,
        out: &mut dyn Write,
        graph: &mut ProtocolGraph,
        function: &PseudoPeriodicFunction,
        horizon: Time,
    ) -> Result<(), CliError> {
        let steps = exact_bound(graph, horizon)?.increment_times().to_vec();
        let mut points = Vec::with_capacity(steps.len());
        for t in steps {
            points.push(Point::new(t, &function.value_at(t)?));
        }
        write_document(
            out,
            &JsonDocument::PseudoPeriodicFunction {
                horizon,
                period_begin: function.period_begin(),
                period_length: function.period_length(),
                period_increment: function.period_increment().to_string(),
                points,
            },
        )
    }

    fn print_arrival_curve(
        &self,
        out: &mut dyn Write,
        curve: &ArrivalCurve,
        horizon: Time,
    ) -> Result<(), CliError> {
        write_document(
            out,
            &JsonDocument::ArrivalCurve {
                horizon,
                discodnc: curve.to_string(),
                segments: curve.segments().iter().map(JsonSegment::from).collect(),
            },
        )
    }
}
