//! Byte-sink adapter the Reporter writes tables through.

use std::io::Write;

/// Anything a rendered report can be written to.
///
/// This is deliberately just [`std::io::Write`] under another name: a file, a
/// `Vec<u8>` (useful in tests), or `stdout`/`stderr` all already implement it.
/// The trait exists so [`crate::dump_to_stream`] has a name to talk about
/// instead of spelling out the bound everywhere — file and console sinks
/// live outside this crate and plug in through this trait.
pub trait Sink: Write {}

impl<T: Write> Sink for T {}
