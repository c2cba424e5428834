//! Per-thread state: the scope stack and the id -> ring buffer map.

use std::cell::UnsafeCell;
use std::collections::BTreeMap;

use crate::config::MAX_SCOPE_DEPTH;
use crate::ident::Id;
use crate::macros::cold_path;
use crate::ring::RingBuffer;

/// The LIFO of currently-open `Start` calls for one thread.
///
/// Backed by three parallel fixed-size arrays rather than a
/// `Vec<(Id, u64, u8)>` of structs so that a push/pop touches only the
/// cache lines it needs instead of one interleaved record per slot.
struct ScopeStack {
    ids: [Option<Id>; MAX_SCOPE_DEPTH],
    starts: [u64; MAX_SCOPE_DEPTH],
    modes: [u8; MAX_SCOPE_DEPTH],
    top: usize,
}

impl ScopeStack {
    fn new() -> Self {
        Self {
            ids: [None; MAX_SCOPE_DEPTH],
            starts: [0; MAX_SCOPE_DEPTH],
            modes: [0; MAX_SCOPE_DEPTH],
            top: 0,
        }
    }

    /// Push a new open scope. Silently dropped if the stack is already at
    /// `D_max` — the matching `Stop` will then simply find nothing to pop
    /// for one extra level, which is the documented overflow behavior.
    #[inline]
    fn push(&mut self, id: Id, start_ts: u64, mode: u8) {
        if self.top < MAX_SCOPE_DEPTH {
            self.ids[self.top] = Some(id);
            self.starts[self.top] = start_ts;
            self.modes[self.top] = mode;
            self.top += 1;
        } else {
            cold_path!({});
        }
    }

    /// Pop the top scope, or do nothing if the stack is empty.
    #[inline]
    fn pop(&mut self) -> Option<(Id, u64, u8)> {
        if self.top == 0 {
            return None;
        }
        self.top -= 1;
        let id = self.ids[self.top].take()?;
        Some((id, self.starts[self.top], self.modes[self.top]))
    }

    #[inline]
    fn depth(&self) -> usize {
        self.top
    }
}

/// Cached state for one [`Pulse`](crate::pulse) call site: the ring buffer
/// this site writes to (looked up once) and the timestamp of the previous
/// call.
pub(crate) struct PulseEntry {
    pub(crate) ring: *const RingBuffer,
    pub(crate) last: u64,
}

/// All state owned by a single thread: its scope stack and its
/// Start/Stop ring buffers, plus the small side table [`Pulse`] uses to
/// avoid repeating its ring-buffer lookup.
///
/// A `ThreadStorage` is created once per thread (lazily, on that thread's
/// first instrumentation call) and lives until process exit; the [`Manager`]
/// registry holds a non-owning [`Arc`](std::sync::Arc) to it so the Reporter
/// can walk every thread's buffers at dump time.
pub struct ThreadStorage {
    scope_stack: UnsafeCell<ScopeStack>,
    buffers: UnsafeCell<BTreeMap<Id, Box<RingBuffer>>>,
    pulse_cache: UnsafeCell<BTreeMap<Id, PulseEntry>>,
}

// SAFETY: `scope_stack`, `buffers`, and `pulse_cache` are mutated only by the
// thread that owns this `ThreadStorage` (reached through its thread-local
// slot in `manager::LOCAL`). The `Manager`'s registry holds `Arc<ThreadStorage>`
// so the Reporter thread can read `buffers` through [`RingBuffer`]'s `Sync`
// atomics while holding the Manager lock; doing so while the owning thread
// is actively recording is undefined, not unsound — `RingBuffer::push`
// never reallocates or moves
// anything the Reporter dereferences. `scope_stack` and `pulse_cache` are
// never touched by any thread other than the owner, so no race is possible
// there regardless of what the Reporter is doing concurrently.
unsafe impl Sync for ThreadStorage {}

impl ThreadStorage {
    pub(crate) fn new() -> Self {
        Self {
            scope_stack: UnsafeCell::new(ScopeStack::new()),
            buffers: UnsafeCell::new(BTreeMap::new()),
            pulse_cache: UnsafeCell::new(BTreeMap::new()),
        }
    }

    /// Push an open scope for `id` onto this thread's scope stack.
    #[inline]
    pub(crate) fn push_scope(&self, id: Id, start_ts: u64, mode: u8) {
        // SAFETY: only the owning thread ever reaches this method.
        unsafe { (*self.scope_stack.get()).push(id, start_ts, mode) };
    }

    /// Pop the top open scope, if any.
    #[inline]
    pub(crate) fn pop_scope(&self) -> Option<(Id, u64, u8)> {
        // SAFETY: only the owning thread ever reaches this method.
        unsafe { (*self.scope_stack.get()).pop() }
    }

    /// Current scope-stack depth. Exposed for tests exercising the overflow
    /// invariant.
    #[cfg(test)]
    pub(crate) fn scope_depth(&self) -> usize {
        unsafe { (*self.scope_stack.get()).depth() }
    }

    /// Fetch (inserting on first use) the ring buffer for `id`.
    ///
    /// The insert path is cold: after a site's first Start/Stop/Pulse call
    /// on this thread, every subsequent call finds the entry already
    /// present and this degrades to a `BTreeMap` lookup.
    #[inline]
    pub(crate) fn ring_for(&self, id: Id) -> &RingBuffer {
        let ptr = self.buffers.get();
        // SAFETY: only the owning thread mutates `*ptr`; the borrow below is
        // dropped before we take the raw-pointer path below it.
        let already_present = unsafe { (*ptr).contains_key(&id) };
        if !already_present {
            cold_path!({
                // SAFETY: single mutator, see above.
                unsafe { (*ptr).insert(id, Box::new(RingBuffer::new())) };
            });
        }
        // SAFETY: we just ensured the entry exists; the `Box` gives the
        // `RingBuffer` a stable heap address that survives further
        // insertions into the surrounding `BTreeMap`.
        unsafe { (*ptr).get(&id).unwrap() }
    }

    /// Look up the cached [`PulseEntry`] for `id`, creating it (and this
    /// site's ring buffer, via [`ThreadStorage::ring_for`]) on first use.
    /// Returns `true` alongside a freshly-created entry so [`Pulse`] knows
    /// not to record a sample on this call.
    #[inline]
    pub(crate) fn pulse_entry(&self, id: Id) -> (&mut PulseEntry, bool) {
        let ptr = self.pulse_cache.get();
        // SAFETY: only the owning thread mutates `*ptr`.
        let already_present = unsafe { (*ptr).contains_key(&id) };
        let first_use = !already_present;
        if first_use {
            cold_path!({
                let ring: *const RingBuffer = self.ring_for(id);
                // SAFETY: single mutator, see above.
                unsafe {
                    (*ptr).insert(id, PulseEntry { ring, last: 0 });
                }
            });
        }
        // SAFETY: we just ensured the entry exists.
        (unsafe { (*ptr).get_mut(&id).unwrap() }, first_use)
    }

    /// Collect every non-zero sample for `id` from this thread's buffer,
    /// if it has one, appending to `out`.
    pub(crate) fn snapshot_into(&self, id: Id, out: &mut Vec<u64>) {
        // SAFETY: called by the Reporter under the Manager lock; see the
        // `Sync` impl's safety comment for the cross-thread read contract.
        let map = unsafe { &*self.buffers.get() };
        if let Some(rb) = map.get(&id) {
            rb.read_into(out);
        }
    }

    /// This thread's calibration tag for `id`, if it has recorded anything.
    pub(crate) fn calib_key_for(&self, id: Id) -> Option<u8> {
        let map = unsafe { &*self.buffers.get() };
        map.get(&id).map(|rb| rb.calib_key())
    }

    /// Append every id this thread has a buffer for, for the Reporter to
    /// discover the full set of measurement sites to report on.
    pub(crate) fn ids_into(&self, out: &mut Vec<Id>) {
        let map = unsafe { &*self.buffers.get() };
        out.extend(map.keys().copied());
    }

    /// Remove `id`'s buffer entirely, along with any cached [`PulseEntry`]
    /// pointing at it. Used once, by the calibrating thread, to erase the
    /// calibration telemetry ids it generated so they never show up in a
    /// user-facing report.
    ///
    /// Dropping both together matters: a `PulseEntry` caches a raw pointer
    /// into the `Box<RingBuffer>` held by `buffers`, so removing only the
    /// buffer would leave `pulse_cache` holding a dangling pointer into
    /// freed memory for this id.
    pub(crate) fn remove(&self, id: Id) {
        let buffers_ptr = self.buffers.get();
        let pulse_ptr = self.pulse_cache.get();
        // SAFETY: only called by the owning thread, immediately after it
        // finished using `id` for calibration on itself.
        unsafe {
            (*pulse_ptr).remove(&id);
            (*buffers_ptr).remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifo_order_is_preserved() {
        static A: &str = "a";
        static B: &str = "b";
        let ts = ThreadStorage::new();
        ts.push_scope(Id::new(A), 100, 0);
        ts.push_scope(Id::new(B), 110, 1);
        assert_eq!(ts.pop_scope(), Some((Id::new(B), 110, 1)));
        assert_eq!(ts.pop_scope(), Some((Id::new(A), 100, 0)));
        assert_eq!(ts.pop_scope(), None);
    }

    #[test]
    fn overflow_then_matching_stops_leaves_depth_d_max_minus_m() {
        static SITE: &str = "deep";
        let ts = ThreadStorage::new();
        let id = Id::new(SITE);
        for i in 0..(MAX_SCOPE_DEPTH + 10) {
            ts.push_scope(id, i as u64, 0);
        }
        assert_eq!(ts.scope_depth(), MAX_SCOPE_DEPTH);
        for _ in 0..5 {
            ts.pop_scope();
        }
        assert_eq!(ts.scope_depth(), MAX_SCOPE_DEPTH - 5);
    }

    #[test]
    fn stop_before_start_does_not_touch_any_buffer() {
        let ts = ThreadStorage::new();
        assert_eq!(ts.pop_scope(), None);
    }
}
