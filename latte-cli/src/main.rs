//! Command-line harness for the `latte` instrumentation library.
//!
//! This binary is an external collaborator of the core library, not part of
//! it: it exists to give `latte` a runnable entry point for ad-hoc
//! measurement (either the bundled matching-engine demo, via a path you've
//! built separately, or a plain `--sleep-micros` no-op loop useful for
//! sanity-checking the report format itself) and to drive
//! [`latte::DumpToStream`] against stdout or a file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use latte::prelude::*;

/// Run an instrumented no-op loop and print a `latte` report.
#[derive(Parser, Debug)]
#[command(name = "latte", version, about)]
struct Args {
    /// Number of Start/Stop iterations to record before reporting.
    #[arg(long, default_value_t = 100_000)]
    iterations: u64,

    /// Sleep this many microseconds inside each recorded region, to give the
    /// report something other than near-zero durations to show.
    #[arg(long, default_value_t = 0)]
    sleep_micros: u64,

    /// Destination for the rendered report. Defaults to stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Numeric unit for the report's columns.
    #[arg(long, value_enum, default_value_t = UnitArg::Time)]
    unit: UnitArg,

    /// Whether to subtract measured instrumentation overhead before
    /// aggregating.
    #[arg(long, value_enum, default_value_t = DataArg::Calibrated)]
    data: DataArg,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum UnitArg {
    Cycles,
    Time,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DataArg {
    Raw,
    Calibrated,
}

const HARNESS_LOOP: &str = "latte-cli::harness_loop";

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    log::info!("running self-calibration");
    Calibrate();

    log::info!(
        "recording {} iterations ({} us sleep per iteration)",
        args.iterations,
        args.sleep_micros
    );
    let sleep = Duration::from_micros(args.sleep_micros);
    let started = Instant::now();
    for _ in 0..args.iterations {
        Fast::start(id!(HARNESS_LOOP));
        if !sleep.is_zero() {
            busy_sleep(sleep);
        }
        Fast::stop(id!(HARNESS_LOOP));
    }
    log::info!("recording finished in {:?}", started.elapsed());

    let unit = match args.unit {
        UnitArg::Cycles => Unit::Cycles,
        UnitArg::Time => Unit::Time,
    };
    let data = match args.data {
        DataArg::Raw => DataMode::Raw,
        DataArg::Calibrated => DataMode::Calibrated,
    };

    match args.output {
        Some(path) => {
            let mut sink = BufWriter::new(File::create(&path)?);
            DumpToStream(&mut sink, unit, data)?;
            sink.flush()?;
        }
        None => {
            let mut sink = io::stdout().lock();
            DumpToStream(&mut sink, unit, data)?;
        }
    }

    Ok(())
}

/// A busy-wait sleep: `std::thread::sleep` undersleeps by tens of
/// microseconds on most schedulers, which would swamp a sub-millisecond
/// `--sleep-micros` request. Spinning on [`Instant::elapsed`] costs nothing
/// this harness cares about preserving (it is not instrumented itself).
fn busy_sleep(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}
