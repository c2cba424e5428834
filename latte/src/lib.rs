//! Ultra-low-latency in-process telemetry for instrumenting hot paths.
//!
//! `latte` measures the wall-clock duration of code regions using the CPU
//! timestamp counter, aggregates per-thread samples in fixed-capacity ring
//! buffers, corrects for its own observational overhead, and renders a
//! statistical report. It targets soft-real-time code — matching engines,
//! game loops, trading systems — where the regions being measured can be as
//! short as tens of CPU cycles, so the instrumentation itself has to be
//! (and is) accounted for rather than assumed negligible.
//!
//! # Quick start
//!
//! ```
//! use latte::prelude::*;
//!
//! Fast::start(id!("order.match"));
//! // ... the region being timed ...
//! Fast::stop(id!("order.match"));
//!
//! Calibrate();
//! let mut out = Vec::new();
//! DumpToStream(&mut out, Unit::Time, DataMode::Calibrated).unwrap();
//! ```
//!
//! # What this crate does not do
//!
//! No cross-process aggregation, no persistence across runs, no remote
//! transport, no clock-skew correction between cores, and no defined
//! behavior for calling [`DumpToStream`] while another thread is actively
//! recording — quiesce recording first. See the module docs below for the
//! per-component design.

mod calibrate;
mod clean;
pub mod config;
mod error;
mod ident;
mod macros;
mod manager;
mod pulse;
mod recorder;
mod report;
mod sink;
mod stats;
mod thread_storage;
mod timestamp;

pub use error::{Error, Result};
pub use ident::Id;
pub use pulse::pulse as Pulse;
/// Force the process-wide self-calibration to run, if it has not already.
///
/// Idempotent — safe to call from multiple threads or more than once; only
/// the first call does any work.
pub use recorder::calibrate as Calibrate;
/// Collect every non-zero raw sample recorded for `id`, across every thread
/// that has recorded against it.
pub use recorder::snapshot as Snapshot;
/// Render a report table for every measurement site that has recorded at
/// least one sample, writing it to the given sink in the requested unit and
/// data mode.
pub use report::dump_to_stream as DumpToStream;
pub use report::{DataMode, Unit};
pub use sink::Sink;
pub use stats::Stats;
pub use timestamp::{Fast, Hard, Mid};

/// Re-exports for the common instrumentation call sites: `use
/// latte::prelude::*;` pulls in the three recorder flavors, `Pulse`, the
/// `id!` macro, and the dump-time types, without reaching for raw pointer
/// construction or the module paths underneath.
pub mod prelude {
    pub use crate::id;
    pub use crate::{Calibrate, DataMode, DumpToStream, Fast, Hard, Id, Mid, Pulse, Snapshot, Unit};
}
