//! Error type for the crate's few fallible cold-path operations.

/// Errors surfaced by cold-path calls.
///
/// Nothing on the hot path (`Start`, `Stop`, `Pulse`) returns a `Result` — the
/// library must never fail a hot-path call in a way the caller can observe.
/// The only place failure is genuinely possible is writing a report out
/// through a caller-supplied [`Write`](std::io::Write) sink.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The report could not be written to the destination sink.
    #[error("failed to write report: {0}")]
    Sink(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
