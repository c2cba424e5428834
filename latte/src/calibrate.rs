//! The one-shot self-calibration procedure.
//!
//! Instrumentation overhead is not noise to be averaged away — it is a floor
//! every raw sample sits above, and the calibrator's whole job is to measure
//! that floor precisely enough to subtract it back out later. Two things
//! make this hard: the floor itself is only tens of cycles, comparable to an
//! OS preemption landing mid-measurement, and a process-wide timer (the wall
//! clock) disagrees with the TSC by a drifting ratio that also has to be
//! pinned down.

use std::time::Instant;

use crate::config::{CALIBRATION_SAMPLES, CALIBRATION_WALL_SLEEP_MS, CALIBRATION_WARMUP};
use crate::ident::Id;
use crate::manager::{with_current, CalibrationTable, Manager};
use crate::pulse::pulse;
use crate::recorder::Recorder;
use crate::timestamp::{
    mode_pair_key, serialize_barrier, Fast, Hard, Mid, TimestampSource, CALIBRATION_SLOTS,
    PULSE_KEY,
};

/// Run calibration once and return the filled-in table.
///
/// Called from [`Manager::ensure_calibrated`] inside a [`std::sync::OnceLock`],
/// so this function itself never needs to worry about concurrent callers: the
/// `OnceLock` serializes them and hands every caller after the first the same
/// already-computed [`CalibrationTable`].
pub(crate) fn run(_manager: &Manager) -> CalibrationTable {
    let cycles_per_ns = measure_cycles_per_ns();

    let mut offsets = [0u64; CALIBRATION_SLOTS];
    let mut valid = [false; CALIBRATION_SLOTS];

    measure_mode_permutations(&mut offsets, &mut valid);
    measure_pulse(&mut offsets, &mut valid);

    Manager::finish_calibration(cycles_per_ns, offsets, valid)
}

/// Sample the wall clock and the [`Fast`] TSC, sleep at least
/// [`CALIBRATION_WALL_SLEEP_MS`], resample, and derive cycles-per-nanosecond
/// from the ratio of elapsed cycles to elapsed wall time.
fn measure_cycles_per_ns() -> f64 {
    let wall_begin = Instant::now();
    let tsc_begin = Fast::read();

    std::thread::sleep(std::time::Duration::from_millis(
        CALIBRATION_WALL_SLEEP_MS,
    ));

    let tsc_end = Fast::read();
    let wall_elapsed_ns = wall_begin.elapsed().as_nanos();

    if wall_elapsed_ns == 0 {
        // Unmeasurable wall clock: fall back rather than divide by zero, and
        // never panic — this runs once at startup, not on the hot path.
        return 1.0;
    }

    (tsc_end.saturating_sub(tsc_begin)) as f64 / wall_elapsed_ns as f64
}

/// A distinct `'static` telemetry id per calibration slot, so each
/// permutation's no-op loop writes into its own ring buffer rather than
/// contaminating a real call site's samples.
static CALIBRATION_SITE_NAMES: [&str; CALIBRATION_SLOTS] = [
    "__latte_calibration::fast_fast",
    "__latte_calibration::fast_mid",
    "__latte_calibration::fast_hard",
    "__latte_calibration::mid_fast",
    "__latte_calibration::mid_mid",
    "__latte_calibration::mid_hard",
    "__latte_calibration::hard_fast",
    "__latte_calibration::hard_mid",
    "__latte_calibration::hard_hard",
    "__latte_calibration::pulse_wrapper",
];

/// A second telemetry id, distinct from every [`CALIBRATION_SITE_NAMES`]
/// entry, that the Pulse calibration loop actually pulses (as opposed to the
/// Start/Stop scope that wraps it).
static PULSE_TARGET_SITE: &str = "__latte_calibration::pulse_target";

fn calibration_id(slot: usize) -> Id {
    Id::new(CALIBRATION_SITE_NAMES[slot])
}

/// Run the no-op instrumented loop for every (start, stop) mode permutation
/// and fill in `offsets`/`valid` for slots `0..MODE_PERMUTATIONS`.
fn measure_mode_permutations(offsets: &mut [u64; CALIBRATION_SLOTS], valid: &mut [bool; CALIBRATION_SLOTS]) {
    measure_pair::<Fast, Fast>(offsets, valid);
    measure_pair::<Fast, Mid>(offsets, valid);
    measure_pair::<Fast, Hard>(offsets, valid);
    measure_pair::<Mid, Fast>(offsets, valid);
    measure_pair::<Mid, Mid>(offsets, valid);
    measure_pair::<Mid, Hard>(offsets, valid);
    measure_pair::<Hard, Fast>(offsets, valid);
    measure_pair::<Hard, Mid>(offsets, valid);
    measure_pair::<Hard, Hard>(offsets, valid);
}

fn measure_pair<S: TimestampSource, E: TimestampSource>(
    offsets: &mut [u64; CALIBRATION_SLOTS],
    valid: &mut [bool; CALIBRATION_SLOTS],
) {
    let key = mode_pair_key(S::MODE, E::MODE);
    let id = calibration_id(key as usize);

    for _ in 0..CALIBRATION_WARMUP {
        serialize_barrier();
        Recorder::<S>::start(id);
        Recorder::<E>::stop(id);
    }
    for _ in 0..CALIBRATION_SAMPLES {
        serialize_barrier();
        Recorder::<S>::start(id);
        Recorder::<E>::stop(id);
        serialize_barrier();
    }

    let samples = Manager::global().extract_raw(id);
    offsets[key as usize] = bumed::bumed(&samples);
    valid[key as usize] = true;

    with_current(|storage| storage.remove(id));
}

/// Measure Pulse's own overhead: a Start/Stop pair (always [`Fast`], since
/// that is what [`Pulse`](crate::pulse::pulse) itself uses) wrapping a single
/// `Pulse` call on an unrelated telemetry id.
fn measure_pulse(offsets: &mut [u64; CALIBRATION_SLOTS], valid: &mut [bool; CALIBRATION_SLOTS]) {
    let wrapper_id = calibration_id(PULSE_KEY as usize);
    let target_id = Id::new(PULSE_TARGET_SITE);

    for _ in 0..CALIBRATION_WARMUP {
        serialize_barrier();
        Recorder::<Fast>::start(wrapper_id);
        pulse(target_id);
        Recorder::<Fast>::stop(wrapper_id);
    }
    for _ in 0..CALIBRATION_SAMPLES {
        serialize_barrier();
        Recorder::<Fast>::start(wrapper_id);
        pulse(target_id);
        Recorder::<Fast>::stop(wrapper_id);
        serialize_barrier();
    }

    let samples = Manager::global().extract_raw(wrapper_id);
    offsets[PULSE_KEY as usize] = bumed::bumed(&samples);
    valid[PULSE_KEY as usize] = true;

    with_current(|storage| {
        storage.remove(wrapper_id);
        storage.remove(target_id);
    });
}

/// The bucketed-minimum-median estimator used to extract a robust
/// instrumentation floor from a noisy sample set.
pub(crate) mod bumed {
    use crate::config::BUCKET_SIZE;

    /// Compute the bucketed minimum median (BUMED) of `samples`.
    ///
    /// Partitions `samples` into fixed-size buckets of [`BUCKET_SIZE`],
    /// drops a short trailing bucket, takes each full bucket's minimum
    /// (ignoring zeros — a zero can only appear here if a sample was
    /// somehow never recorded, which should not happen for a successfully
    /// completed Start/Stop pair, but the filter is defensive), and returns
    /// the median of those minima. Falls back to the global minimum when no
    /// full bucket is available.
    pub(crate) fn bumed(samples: &[u64]) -> u64 {
        let mut minima = Vec::with_capacity(samples.len() / BUCKET_SIZE + 1);
        for chunk in samples.chunks(BUCKET_SIZE) {
            if chunk.len() < BUCKET_SIZE {
                continue;
            }
            if let Some(&m) = chunk.iter().filter(|&&v| v != 0).min() {
                minima.push(m);
            }
        }

        if minima.is_empty() {
            return samples.iter().copied().filter(|&v| v != 0).min().unwrap_or(0);
        }

        minima.sort_unstable();
        let n = minima.len();
        if n % 2 == 1 {
            minima[n / 2]
        } else {
            let a = minima[n / 2 - 1];
            let b = minima[n / 2];
            // Overflow-safe average of two `u64`s.
            a / 2 + b / 2 + (a % 2 + b % 2) / 2
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn falls_back_to_global_minimum_with_no_full_bucket() {
            let samples = vec![5u64, 3, 9, 1, 7];
            assert_eq!(bumed(&samples), 1);
        }

        #[test]
        fn single_full_bucket_returns_its_minimum() {
            let mut samples = vec![100u64; 1000];
            samples[42] = 7;
            assert_eq!(bumed(&samples), 7);
        }

        #[test]
        fn median_of_bucket_minima_rejects_one_noisy_bucket() {
            let mut samples = Vec::new();
            for _ in 0..3 {
                let mut bucket = vec![10u64; 1000];
                bucket[0] = 8;
                samples.extend(bucket);
            }
            // A fourth bucket with a much higher floor (e.g. contended with
            // other load) should not move the median off the typical floor.
            samples.extend(vec![500u64; 1000]);
            assert_eq!(bumed(&samples), 8);
        }

        #[test]
        fn even_bucket_count_rounds_the_two_middle_minima() {
            let mut samples = Vec::new();
            for floor in [10u64, 20, 30, 41] {
                samples.extend(vec![floor; 1000]);
            }
            // Minima = [10, 20, 30, 41]; median of two middles = (20+30)/2 = 25.
            assert_eq!(bumed(&samples), 25);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_per_ns_is_positive() {
        let v = measure_cycles_per_ns();
        assert!(v > 0.0);
    }
}
