//! Compile-time tunables.
//!
//! Everything here is a `const`, not a runtime-configurable value: the hot
//! path (`Start`/`Stop`/`Pulse`) must never branch on configuration loaded
//! from a file or environment variable, so there is nothing to parse.

/// `log2` of the ring buffer capacity. Default capacity is `2^16` samples
/// per (thread, id), as specified.
pub const RING_CAPACITY_LOG2: u32 = 16;

/// Fixed capacity of a [`RingBuffer`](crate::ring::RingBuffer): `2^RING_CAPACITY_LOG2`.
pub const RING_CAPACITY: usize = 1 << RING_CAPACITY_LOG2;

/// Bitmask used to wrap the ring buffer head index (`capacity - 1`, since
/// capacity is a power of two).
pub const RING_MASK: usize = RING_CAPACITY - 1;

/// Maximum depth of a thread's scope stack (`D_max`).
pub const MAX_SCOPE_DEPTH: usize = 64;

/// Minimum wall-clock sleep used by the calibrator when estimating
/// cycles-per-nanosecond.
pub const CALIBRATION_WALL_SLEEP_MS: u64 = 100;

/// Number of instrumented no-op samples collected per (start, stop)
/// permutation during calibration, not counting warmup.
pub const CALIBRATION_SAMPLES: usize = 4000;

/// Number of warmup iterations discarded before measurement begins for each
/// calibration permutation.
pub const CALIBRATION_WARMUP: usize = 200;

/// Bucket size used by both the calibrator's BUMED estimator and the
/// cold-path cleaner's bucketed-IQR filter.
pub const BUCKET_SIZE: usize = 1000;

/// Minimum size a trailing partial bucket must reach to be kept by the
/// cleaner; shorter tail buckets are dropped.
pub const MIN_TAIL_BUCKET: usize = 500;
