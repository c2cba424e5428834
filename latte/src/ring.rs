//! The per-(thread, id) sample log.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crate::config::{RING_CAPACITY, RING_MASK};
use crate::timestamp::{CALIB_KEY_MIXED, CALIB_KEY_UNSET};

/// A fixed-capacity circular log of samples for one measurement site on one
/// thread.
///
/// `push` is lock-free and wait-free: the only writer is the thread that
/// owns the enclosing [`ThreadStorage`](crate::thread_storage::ThreadStorage),
/// so there is no contention to resolve. Slots use `Relaxed` atomics purely
/// so the type is `Sync` — the Reporter may read a `RingBuffer` from another
/// thread while holding the Manager lock, and the caller contract ("do not
/// dump while recording") is what makes that read well-defined, not the
/// atomic ordering. Capacity is always a power of two so the head index wraps
/// with a bitmask instead of a division.
#[repr(align(64))]
pub struct RingBuffer {
    slots: Box<[AtomicU64]>,
    mask: usize,
    head: AtomicUsize,
    calib_key: AtomicU8,
}

impl RingBuffer {
    /// Build an empty ring buffer at the crate's default capacity
    /// (`2^16` by default; see [`crate::config::RING_CAPACITY`]).
    pub fn new() -> Self {
        Self::with_capacity(RING_CAPACITY)
    }

    /// Build an empty ring buffer with a caller-chosen power-of-two capacity.
    ///
    /// Exposed mainly for tests that want a small ring to exercise wraparound
    /// without pushing tens of thousands of samples.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");
        let slots = (0..capacity).map(|_| AtomicU64::new(0)).collect();
        Self {
            slots,
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            calib_key: AtomicU8::new(CALIB_KEY_UNSET),
        }
    }

    /// Append one sample, overwriting the oldest slot on wraparound.
    ///
    /// `value` must be non-zero: zero is the sentinel for "empty slot" and is
    /// never a valid sample. Callers get this for free since a duration is
    /// always at least one counter tick once the counter has incremented
    /// between the two reads that produced it.
    #[inline]
    pub fn push(&self, value: NonZeroU64, calib_key: u8) {
        let head = self.head.fetch_add(1, Ordering::Relaxed);
        let idx = head & self.mask;
        self.slots[idx].store(value.get(), Ordering::Relaxed);
        self.update_calib_key(calib_key);
    }

    #[inline]
    fn update_calib_key(&self, key: u8) {
        let current = self.calib_key.load(Ordering::Relaxed);
        if current == CALIB_KEY_UNSET {
            self.calib_key.store(key, Ordering::Relaxed);
        } else if current != key && current != CALIB_KEY_MIXED {
            self.calib_key.store(CALIB_KEY_MIXED, Ordering::Relaxed);
        }
    }

    /// Current head index (monotonically increasing; wraps only in the
    /// sense that `head & mask` addresses a slot — `head` itself is never
    /// reduced modulo capacity).
    pub fn head(&self) -> usize {
        self.head.load(Ordering::Relaxed)
    }

    /// This buffer's capacity.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// This buffer's calibration tag: [`CALIB_KEY_UNSET`] if nothing has been
    /// pushed yet, [`CALIB_KEY_MIXED`] if samples were pushed under more than
    /// one calibration key, or the single key all samples share.
    pub fn calib_key(&self) -> u8 {
        self.calib_key.load(Ordering::Relaxed)
    }

    /// Collect every non-zero slot into `out`, in storage order (not
    /// chronological order — see [`RingBuffer::push`]'s wraparound
    /// behavior). Intended to be called by the Reporter while holding the
    /// Manager lock and no writer is active.
    pub fn read_into(&self, out: &mut Vec<u64>) {
        out.reserve(self.slots.len());
        for slot in self.slots.iter() {
            let value = slot.load(Ordering::Relaxed);
            if value != 0 {
                out.push(value);
            }
        }
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_read_round_trips() {
        let rb = RingBuffer::with_capacity(8);
        for v in 1..=5u64 {
            rb.push(NonZeroU64::new(v).unwrap(), 0);
        }
        let mut out = Vec::new();
        rb.read_into(&mut out);
        out.sort_unstable();
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn overflow_overwrites_oldest_and_keeps_capacity_many_samples() {
        let rb = RingBuffer::with_capacity(4);
        for v in 1..=10u64 {
            rb.push(NonZeroU64::new(v).unwrap(), 0);
        }
        let mut out = Vec::new();
        rb.read_into(&mut out);
        assert_eq!(out.len(), 4);
        assert_eq!(rb.head(), 10);
        assert_eq!(rb.head() % rb.capacity(), 2);
    }

    #[test]
    fn calib_key_unset_then_mixed() {
        let rb = RingBuffer::with_capacity(4);
        assert_eq!(rb.calib_key(), CALIB_KEY_UNSET);
        rb.push(NonZeroU64::new(1).unwrap(), 5);
        assert_eq!(rb.calib_key(), 5);
        rb.push(NonZeroU64::new(2).unwrap(), 5);
        assert_eq!(rb.calib_key(), 5);
        rb.push(NonZeroU64::new(3).unwrap(), 6);
        assert_eq!(rb.calib_key(), CALIB_KEY_MIXED);
        rb.push(NonZeroU64::new(4).unwrap(), 5);
        assert_eq!(rb.calib_key(), CALIB_KEY_MIXED);
    }
}
