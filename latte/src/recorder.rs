//! The `Start`/`Stop` recording primitive.

use std::num::NonZeroU64;

use crate::manager::{with_current, Manager};
use crate::timestamp::{mode_pair_key, TimestampSource};
use crate::timestamp::{Fast, Hard, Mid};
use crate::Id;

/// A Start/Stop recorder over one [`TimestampSource`].
///
/// `Recorder<Fast>`, `Recorder<Mid>`, and `Recorder<Hard>` are the three
/// concrete flavors; the generic is monomorphized at every call site so
/// `Start`/`Stop` compile down to a direct counter read, a stack push/pop,
/// and a ring-buffer write with no dynamic dispatch anywhere on the hot path.
pub struct Recorder<S: TimestampSource> {
    _source: std::marker::PhantomData<S>,
}

impl<S: TimestampSource> Recorder<S> {
    /// Open a scope for `id` on the calling thread.
    ///
    /// Reads the timestamp first, then pushes onto the scope stack; the
    /// thread-local lookup that creates a thread's [`ThreadStorage`] on first
    /// use is the only part of this call that can be anything but a handful
    /// of instructions, and it is marked cold.
    #[inline]
    pub fn start(id: Id) {
        with_current(|storage| {
            let t = S::read();
            storage.push_scope(id, t, S::MODE);
        });
    }

    /// Close the most recently opened scope and record its duration against
    /// `id`.
    ///
    /// `id` is advisory only: it is not checked against the
    /// top-of-stack id, so a `Stop` always closes whatever scope is actually
    /// on top, and the sample is recorded against *that* scope's id, not the
    /// id passed here. The timestamp is read before touching thread storage
    /// at all, so the pop and ring-buffer bookkeeping never inflate the
    /// measured duration.
    #[inline]
    pub fn stop(_id: Id) {
        let t = S::read();
        with_current(|storage| {
            let Some((open_id, start_ts, start_mode)) = storage.pop_scope() else {
                // Stop on an empty stack is a documented no-op.
                return;
            };
            let delta = t.saturating_sub(start_ts);
            let Some(value) = NonZeroU64::new(delta) else {
                // `t < start_ts` (non-invariant TSC / core migration) coerces
                // to zero, which the ring buffer's non-zero invariant then
                // discards.
                return;
            };
            let key = mode_pair_key(start_mode, S::MODE);
            storage.ring_for(open_id).push(value, key);
        });
    }
}

/// Convenience inherent methods so call sites can write `Fast::start(id)` /
/// `Fast::stop(id)` directly, without spelling out
/// `Recorder::<Fast>::start(id)` everywhere.
/// Each just forwards to the matching [`Recorder`] monomorphization, so there
/// is no cost beyond what `Recorder` itself already compiles down to.
macro_rules! impl_start_stop {
    ($source:ty) => {
        impl $source {
            /// Open a scope for `id` on the calling thread. See
            /// [`Recorder::start`].
            #[inline]
            pub fn start(id: Id) {
                Recorder::<$source>::start(id)
            }

            /// Close the most recently opened scope and record its duration.
            /// See [`Recorder::stop`].
            #[inline]
            pub fn stop(id: Id) {
                Recorder::<$source>::stop(id)
            }
        }
    };
}

impl_start_stop!(Fast);
impl_start_stop!(Mid);
impl_start_stop!(Hard);

/// Force the process-wide calibration to run if it has not already.
///
/// Idempotent: subsequent calls after the first successful calibration are
/// no-ops. Not part of the hot path — call this once at startup, typically
/// before the first `Start`/`Stop`/`Pulse`.
pub fn calibrate() {
    Manager::global().ensure_calibrated();
}

/// Collect every non-zero raw sample recorded for `id`, across every thread
/// that has ever recorded against it.
pub fn snapshot(id: Id) -> Vec<u64> {
    Manager::global().extract_raw(id)
}
