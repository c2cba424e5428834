//! The `Pulse` primitive: delta-between-events recording for tight loops.

use std::num::NonZeroU64;

use crate::manager::with_current;
use crate::timestamp::{Fast, TimestampSource, PULSE_KEY};
use crate::Id;

/// Record the time elapsed since the previous `Pulse(id)` call on this
/// thread.
///
/// Unlike [`crate::Recorder`], there is no paired Start/Stop: a call site
/// inside a tight loop calls `Pulse(id)` once per iteration and gets back one
/// sample per call after the first. The first call per (thread, id) only
/// establishes the baseline timestamp — it records nothing, since there is no
/// prior event yet to measure a delta against.
///
/// Always uses [`Fast`], the cheapest timestamp source: a loop tight enough to
/// want `Pulse` instead of `Start`/`Stop` is also tight enough that `Mid` or
/// `Hard`'s serialization cost would dominate the measurement.
#[inline]
pub fn pulse(id: Id) {
    let now = Fast::read();
    with_current(|storage| {
        let (entry, first_use) = storage.pulse_entry(id);
        if first_use {
            entry.last = now;
            return;
        }
        let delta = now.saturating_sub(entry.last);
        entry.last = now;
        if let Some(value) = NonZeroU64::new(delta) {
            // SAFETY: `entry.ring` was set from `storage.ring_for(id)` in
            // `pulse_entry`'s cold first-use path and this thread is the sole
            // owner of `storage`, so the pointee is still alive and the
            // pointed-to `RingBuffer` belongs to this same thread storage for
            // as long as the thread lives.
            let ring = unsafe { &*entry.ring };
            ring.push(value, PULSE_KEY);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::snapshot;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn first_pulse_records_nothing_subsequent_pulses_record_deltas() {
        static SITE: &str = "pulse::first_pulse_records_nothing";
        let id = Id::new(SITE);
        let before = snapshot(id).len();

        pulse(id);
        assert_eq!(snapshot(id).len(), before);

        thread::sleep(Duration::from_micros(20));
        pulse(id);
        let samples = snapshot(id);
        assert_eq!(samples.len(), before + 1);
        assert!(samples[samples.len() - 1] > 0);
    }

    #[test]
    fn pulse_loop_records_n_minus_one_samples() {
        static SITE: &str = "pulse::pulse_loop_records_n_minus_one_samples";
        let id = Id::new(SITE);
        let before = snapshot(id).len();
        for _ in 0..1001 {
            thread::sleep(Duration::from_micros(10));
            pulse(id);
        }
        assert_eq!(snapshot(id).len(), before + 1000);
    }
}
