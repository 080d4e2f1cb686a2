mod cli;
mod errors;
mod format;

use std::io::{self, Write};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cadence_core::{analyze, AnalysisOptions, ProtocolGraph};

use crate::cli::{iterations, parse_heuristic, parse_output_format, Cli};
use crate::errors::CliError;
use crate::format::OutputFormatter;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run(&cli)?;
    Ok(())
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let formatter = parse_output_format(&cli.format)?;
    let heuristic = parse_heuristic(&cli.heuristic)?;
    let iterations = iterations(cli)?;

    let path = cli.path.display().to_string();
    if !cli.path.exists() {
        return Err(CliError::NoSuchPath { path });
    }
    if !cli.path.is_file() {
        return Err(CliError::NotAFile { path });
    }

    info!(path = %path, "parsing graph");
    let graph = cadence_dot::parse_file(&cli.path)?;
    info!(blocks = graph.block_count(), "graph parsed");

    let options = AnalysisOptions::new(heuristic)
        .with_threshold(cli.threshold)
        .with_num_blocks(cli.num_blocks);

    let mut times = Vec::with_capacity(iterations);
    let mut last = None;
    for _ in 0..iterations {
        // Every run starts from cold bound caches.
        let mut working = graph.clone();
        let start = Instant::now();
        let analysis = analyze(&mut working, &options)?;
        let elapsed = start.elapsed();
        info!(elapsed = %format_hms(elapsed), "finished");
        times.push(elapsed);
        last = Some((working, analysis));
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Some((mut working, analysis)) = last {
        print_analysis(
            &mut out,
            formatter.as_ref(),
            cli.verbose,
            &mut working,
            &analysis,
        )?;
    }
    if cli.benchmark {
        let (average, std_dev) = timing_summary(&times);
        writeln!(out, "Average: {}", format_hms(average))?;
        writeln!(out, "StdDev: {}", format_hms(std_dev))?;
    }
    out.flush()?;
    Ok(())
}

fn print_analysis(
    out: &mut dyn Write,
    formatter: &dyn OutputFormatter,
    verbose: bool,
    graph: &mut ProtocolGraph,
    analysis: &cadence_core::Analysis,
) -> Result<(), CliError> {
    info!(format = formatter.name(), horizon = analysis.horizon, "printing results");
    if verbose {
        formatter.print_max_traffic(out, graph, analysis.horizon)?;
        formatter.print_pseudo_periodic_function(out, graph, &analysis.function, analysis.horizon)?;
    }
    formatter.print_arrival_curve(out, &analysis.curve, analysis.horizon)
}

/// Mean and sample standard deviation of the run times.
fn timing_summary(times: &[Duration]) -> (Duration, Duration) {
    if times.is_empty() {
        return (Duration::ZERO, Duration::ZERO);
    }
    let n = times.len() as f64;
    let secs: Vec<f64> = times.iter().map(Duration::as_secs_f64).collect();
    let mean = secs.iter().sum::<f64>() / n;
    let variance = if times.len() > 1 {
        secs.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    (
        Duration::from_secs_f64(mean),
        Duration::from_secs_f64(variance.sqrt()),
    )
}

/// `H:MM:SS.mmm`
fn format_hms(duration: Duration) -> String {
    let millis = duration.as_millis();
    let (hours, rest) = (millis / 3_600_000, millis % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (seconds, millis) = (rest / 1_000, rest % 1_000);
    format!("{hours}:{minutes:02}:{seconds:02}.{millis:03}")
}
