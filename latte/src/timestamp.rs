//! Timestamp sources of increasing serialization strength.
//!
//! All three readers return the same thing — a 64-bit cycle count — but
//! differ in how much they constrain the CPU's out-of-order execution around
//! the read. [`Fast`] is the cheapest and gives the CPU the most freedom to
//! reorder; [`Hard`] is the most expensive and gives it the least. Callers
//! pick the strength that matches how much they trust the region they are
//! timing not to be reordered across the measurement boundary.

mod sealed {
    pub trait Sealed {}
}

/// A readable cycle counter with a declared serialization strength.
///
/// This trait is sealed: [`Fast`], [`Mid`], and [`Hard`] are the only
/// implementors, so call sites are always one of exactly three
/// monomorphizations and the compiler can inline `read` down to a handful
/// of instructions.
pub trait TimestampSource: sealed::Sealed + Copy + 'static {
    /// This source's mode tag, used to build calibration keys
    /// (`key(start, stop) = 3 * start.MODE + stop.MODE`).
    const MODE: u8;

    /// Read the counter.
    fn read() -> u64;
}

/// Unordered TSC read.
///
/// Lowest overhead of the three sources. The CPU may freely reorder
/// instructions around this read, so code timed with `Fast` on both ends can
/// see durations slightly shorter or longer than reality if the timed region
/// is small enough for out-of-order execution to reach across it.
#[derive(Copy, Clone, Debug)]
pub struct Fast;

/// Serializing-TSC read.
///
/// Drains retirement on at least one side of the read, giving a tighter
/// bound than [`Fast`] at somewhat higher cost.
#[derive(Copy, Clone, Debug)]
pub struct Mid;

/// Load-fenced, serializing-TSC read.
///
/// An explicit load-serializing barrier precedes the counter read, which
/// prevents speculative execution from crossing the measurement boundary at
/// all. Highest overhead of the three; use this when timing regions short
/// enough that `Fast`/`Mid` skew is itself comparable to the thing being
/// measured.
#[derive(Copy, Clone, Debug)]
pub struct Hard;

impl sealed::Sealed for Fast {}
impl sealed::Sealed for Mid {}
impl sealed::Sealed for Hard {}

#[cfg(target_arch = "x86_64")]
mod arch {
    use std::arch::x86_64::{__rdtscp, _mm_lfence, _rdtsc};

    #[inline(always)]
    pub fn fast() -> u64 {
        // SAFETY: `_rdtsc` is available on every x86_64 CPU; it is a plain
        // counter read with no side effects.
        unsafe { _rdtsc() }
    }

    #[inline(always)]
    pub fn mid() -> u64 {
        let mut aux = 0u32;
        // SAFETY: `__rdtscp` is available wherever the `RDTSCP` CPUID leaf is
        // set, which is true for all CPUs this crate targets; `aux` is a
        // plain output we discard.
        unsafe { __rdtscp(&mut aux) }
    }

    #[inline(always)]
    pub fn hard() -> u64 {
        // SAFETY: `_mm_lfence` only orders loads against later loads; it has
        // no memory-safety preconditions of its own.
        unsafe { _mm_lfence() };
        fast()
    }

    /// A bare load-serializing barrier, with no counter read attached.
    #[inline(always)]
    pub fn barrier() {
        // SAFETY: see `hard` above.
        unsafe { _mm_lfence() };
    }
}

#[cfg(target_arch = "aarch64")]
mod arch {
    use std::arch::asm;

    #[inline(always)]
    pub fn fast() -> u64 {
        let value: u64;
        // SAFETY: `cntvct_el0` is readable from EL0 on every target this
        // crate supports; the read has no side effects.
        unsafe { asm!("mrs {0}, cntvct_el0", out(reg) value, options(nomem, nostack)) };
        value
    }

    #[inline(always)]
    pub fn mid() -> u64 {
        // `isb` drains the pipeline before the counter read, which is the
        // closest aarch64 equivalent to a serializing TSC read: there is no
        // dedicated serializing counter-read instruction to synthesize from.
        // SAFETY: `isb` has no memory-safety preconditions.
        unsafe { asm!("isb", options(nomem, nostack)) };
        fast()
    }

    #[inline(always)]
    pub fn hard() -> u64 {
        // `dsb sy` is a full system barrier, stronger than the `isb` used by
        // `mid`, matching the "explicit load-serializing barrier" the x86_64
        // `Hard` source uses ahead of its counter read.
        // SAFETY: `dsb sy` has no memory-safety preconditions.
        unsafe { asm!("dsb sy", options(nomem, nostack)) };
        mid()
    }

    /// A bare load-serializing barrier, with no counter read attached.
    #[inline(always)]
    pub fn barrier() {
        // SAFETY: see `hard` above.
        unsafe { asm!("dsb sy", options(nomem, nostack)) };
    }
}

impl TimestampSource for Fast {
    const MODE: u8 = 0;

    #[inline(always)]
    fn read() -> u64 {
        arch::fast()
    }
}

impl TimestampSource for Mid {
    const MODE: u8 = 1;

    #[inline(always)]
    fn read() -> u64 {
        arch::mid()
    }
}

impl TimestampSource for Hard {
    const MODE: u8 = 2;

    #[inline(always)]
    fn read() -> u64 {
        arch::hard()
    }
}

/// A bare load-serializing barrier with no associated counter read.
///
/// Used by the calibrator to bracket each measured no-op iteration so that
/// out-of-order execution cannot smear one iteration's instructions into the
/// next one's measurement window.
#[inline(always)]
pub(crate) fn serialize_barrier() {
    arch::barrier()
}

/// Encode a (start mode, stop mode) pair into a calibration-table index.
///
/// `key(s, e) = 3*s + e`, valid for `s, e < 3`; this yields the nine
/// permutations of {Fast, Mid, Hard} as the contiguous range `0..=8`.
#[inline]
pub const fn mode_pair_key(start_mode: u8, stop_mode: u8) -> u8 {
    3 * start_mode + stop_mode
}

/// Number of (start, stop) timestamp-source permutations: `3 * 3`.
pub const MODE_PERMUTATIONS: usize = 9;

/// Calibration-table slot reserved for the [`Pulse`](crate::pulse) primitive,
/// which always uses [`Fast`] but is calibrated separately since it measures
/// a delta between two otherwise-unrelated calls rather than a single
/// Start/Stop pair.
pub const PULSE_KEY: u8 = MODE_PERMUTATIONS as u8;

/// Total number of calibration-table slots: the nine mode permutations plus
/// the Pulse slot.
pub const CALIBRATION_SLOTS: usize = MODE_PERMUTATIONS + 1;

/// Ring-buffer calibration tag meaning "no sample has been pushed yet".
pub const CALIB_KEY_UNSET: u8 = 0xFF;

/// Ring-buffer calibration tag meaning "samples pushed under more than one
/// distinct calibration key", i.e. the buffer mixes modes.
pub const CALIB_KEY_MIXED: u8 = 0xFE;
