//! Tabular rendering of cleaned, aggregated samples.
//!
//! The Reporter is the only piece of this crate that runs under the
//! [`Manager`] lock against data another thread might be writing: calling
//! [`dump_to_stream`] while a thread is still actively recording is
//! undefined, not unsound — [`Manager::extract_raw`] holds the lock for the
//! whole scan, and every [`RingBuffer`](crate::ring::RingBuffer) slot it
//! reads is a plain relaxed atomic load.

use std::io::Write;

use crate::clean::clean;
use crate::ident::Id;
use crate::manager::Manager;
use crate::sink::Sink;
use crate::stats::Stats;
use crate::timestamp::PULSE_KEY;
use crate::Result;

/// Which unit a report's numeric columns are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Raw cycle counts, with metric suffixes (K/M/B/T) for large values.
    Cycles,
    /// Cycles converted to wall-clock time using the calibrated
    /// cycles-per-nanosecond constant, with adaptive units (ns/us/ms/s/min).
    /// Forces calibration to run first if it has not already, since the
    /// conversion needs `cycles_per_ns` regardless of [`DataMode`].
    Time,
}

/// Whether a report subtracts measured instrumentation overhead before
/// computing statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    /// Report the samples exactly as recorded.
    Raw,
    /// Subtract each site's calibration offset before cleaning, clamping at
    /// zero so a subtracted duration never goes negative. Forces calibration
    /// to run first if it has not already. Sites whose buffer mixes calibration
    /// keys (concurrent recording under more than one start/stop mode pair)
    /// report 0 offset, the same as an uncalibrated site.
    Calibrated,
}

/// Render a report table for every measurement site with at least one
/// recorded sample, in the requested unit and data mode, writing it to
/// `sink`.
///
/// Sites with zero samples after cleaning (which cannot happen unless the
/// site itself never recorded anything, per the cleaner's "never empty the
/// output" rule) are skipped. Returns the first I/O error the sink reports,
/// if any.
pub fn dump_to_stream<W: Sink>(sink: &mut W, unit: Unit, data: DataMode) -> Result<()> {
    let manager = Manager::global();
    if unit == Unit::Time || data == DataMode::Calibrated {
        manager.ensure_calibrated();
    }

    let cycles_per_ns = manager.cycles_per_ns().unwrap_or(1.0);
    let ids = manager.all_ids();
    log::debug!("dumping report for {} measurement sites", ids.len());

    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let mut raw = manager.extract_raw(id);
        if data == DataMode::Calibrated {
            let key = manager.calib_key_for(id);
            let offset = manager.calibration_offset(key);
            for v in raw.iter_mut() {
                *v = v.saturating_sub(offset);
            }
        }
        let cleaned = clean(&raw);
        match Stats::compute(&cleaned.values, cleaned.bypass) {
            Some(stats) => rows.push((label_for(id), stats)),
            None => log::warn!(
                "skipping {} in report: no samples survived cleaning",
                label_for(id)
            ),
        }
    }

    if data == DataMode::Calibrated {
        write_overhead_table(sink, manager, unit, cycles_per_ns)?;
    }
    write_main_table(sink, &rows, unit, cycles_per_ns)?;
    Ok(())
}

fn label_for(id: Id) -> String {
    match id.label() {
        Some(label) => label.to_string(),
        None => format!("{id:?}"),
    }
}

const COLUMNS: [&str; 9] = [
    "COMPONENT", "SAMPLES", "AVG", "MEDIAN", "STD DEV", "SKEW", "MIN", "MAX", "RANGE",
];

fn write_main_table<W: Write>(
    sink: &mut W,
    rows: &[(String, Stats)],
    unit: Unit,
    cycles_per_ns: f64,
) -> Result<()> {
    let header = format!(
        "{:<24} {:>10} {:>14} {:>14} {:>12} {:>8} {:>14} {:>14} {:>14} {:>8}",
        COLUMNS[0],
        COLUMNS[1],
        COLUMNS[2],
        COLUMNS[3],
        COLUMNS[4],
        COLUMNS[5],
        COLUMNS[6],
        COLUMNS[7],
        COLUMNS[8],
        "BYPASS",
    );
    let width = header.len();
    writeln!(sink, "{}", "#".repeat(width))?;
    writeln!(sink, "{header}")?;
    writeln!(sink, "{}", "=".repeat(width))?;
    for (label, s) in rows {
        writeln!(
            sink,
            "{:<24} {:>10} {:>14} {:>14} {:>12} {:>8.2} {:>14} {:>14} {:>14} {:>8}",
            label,
            s.samples,
            format_value(s.avg, unit, cycles_per_ns),
            format_value(s.median, unit, cycles_per_ns),
            format_value(s.std_dev, unit, cycles_per_ns),
            s.skew,
            format_value(s.min as f64, unit, cycles_per_ns),
            format_value(s.max as f64, unit, cycles_per_ns),
            format_value(s.range as f64, unit, cycles_per_ns),
            s.bypass,
        )?;
    }
    writeln!(sink, "{}", "#".repeat(width))?;
    Ok(())
}

/// The auxiliary overhead table emitted ahead of the main table in
/// [`DataMode::Calibrated`]: the nine (start, stop) mode permutations
/// arranged as a 3x3 grid, plus the Pulse slot.
fn write_overhead_table<W: Write>(
    sink: &mut W,
    manager: &Manager,
    unit: Unit,
    cycles_per_ns: f64,
) -> Result<()> {
    const MODE_NAMES: [&str; 3] = ["Fast", "Mid", "Hard"];

    writeln!(sink, "{}", "#".repeat(48))?;
    writeln!(sink, "# CALIBRATION OVERHEAD (start -> stop)")?;
    writeln!(sink, "{}", "=".repeat(48))?;
    for (s, start_name) in MODE_NAMES.iter().enumerate() {
        for (e, stop_name) in MODE_NAMES.iter().enumerate() {
            let key = (3 * s + e) as u8;
            let offset = manager.calibration_offset(key);
            writeln!(
                sink,
                "# {start_name:<4} -> {stop_name:<4} {:>14}",
                format_value(offset as f64, unit, cycles_per_ns)
            )?;
        }
    }
    let pulse_offset = manager.calibration_offset(PULSE_KEY);
    writeln!(
        sink,
        "# {:<13} {:>14}",
        "Pulse",
        format_value(pulse_offset as f64, unit, cycles_per_ns)
    )?;
    writeln!(sink, "{}", "#".repeat(48))?;
    Ok(())
}

fn format_value(value: f64, unit: Unit, cycles_per_ns: f64) -> String {
    match unit {
        Unit::Cycles => format_cycles(value),
        Unit::Time => format_time(value / cycles_per_ns),
    }
}

/// Metric-suffixed cycle count: no suffix below 1000, then K/M/B/T, two
/// decimals beyond the leading digits once a suffix is in play.
fn format_cycles(cycles: f64) -> String {
    const UNITS: [&str; 5] = ["", " K", " M", " B", " T"];
    let mut value = cycles;
    let mut idx = 0;
    while value.abs() >= 1000.0 && idx < UNITS.len() - 1 {
        value /= 1000.0;
        idx += 1;
    }
    if idx == 0 {
        format!("{cycles:.2}")
    } else {
        format!("{value:.2}{}", UNITS[idx])
    }
}

/// Adaptive-unit nanosecond duration: ns/us/ms/s/min, two decimals.
fn format_time(ns: f64) -> String {
    const MINUTE_NS: f64 = 60_000_000_000.0;
    const SECOND_NS: f64 = 1_000_000_000.0;
    const MILLIS_NS: f64 = 1_000_000.0;
    const MICROS_NS: f64 = 1_000.0;

    if ns.abs() >= MINUTE_NS {
        format!("{:.2} min", ns / MINUTE_NS)
    } else if ns.abs() >= SECOND_NS {
        format!("{:.2} s", ns / SECOND_NS)
    } else if ns.abs() >= MILLIS_NS {
        format!("{:.2} ms", ns / MILLIS_NS)
    } else if ns.abs() >= MICROS_NS {
        format!("{:.2} us", ns / MICROS_NS)
    } else {
        format!("{ns:.2} ns")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_formatting_adds_metric_suffix_past_a_thousand() {
        assert_eq!(format_cycles(42.0), "42.00");
        assert_eq!(format_cycles(4_200.0), "4.20 K");
        assert_eq!(format_cycles(4_200_000.0), "4.20 M");
    }

    #[test]
    fn time_formatting_picks_the_adaptive_unit() {
        assert_eq!(format_time(500.0), "500.00 ns");
        assert_eq!(format_time(5_000.0), "5.00 us");
        assert_eq!(format_time(5_000_000.0), "5.00 ms");
        assert_eq!(format_time(5_000_000_000.0), "5.00 s");
        assert_eq!(format_time(120_000_000_000.0), "2.00 min");
    }

    #[test]
    fn dump_with_no_samples_produces_an_empty_table() {
        let mut out = Vec::new();
        dump_to_stream(&mut out, Unit::Cycles, DataMode::Raw).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("COMPONENT"));
        assert!(text.contains("BYPASS"));
    }

    #[test]
    fn dump_reports_a_recorded_site() {
        use crate::recorder::Recorder;
        use crate::timestamp::Fast;

        static SITE: &str = "report::dump_reports_a_recorded_site";
        let id = crate::Id::with_label(SITE);
        Recorder::<Fast>::start(id);
        Recorder::<Fast>::stop(id);

        let mut out = Vec::new();
        dump_to_stream(&mut out, Unit::Cycles, DataMode::Raw).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(SITE));
    }
}
