//! # Decode Session Contract
//!
//! Every backend hands out [`DecodeSession`]s. A session owns all native
//! resources for exactly one file and releases them when dropped, whether
//! `open()` succeeded, failed halfway, or was never called.
//!
//! ## Lifecycle
//!
//! ```text
//! make_session(path) -> open() -> duration() -> seek(start) -> read(buf) -> drop
//! ```
//!
//! Sessions are synchronous: every call runs its work on the calling thread
//! and blocks until done. Sessions share no mutable state, so independent
//! sessions may run on different threads at the same time.

use crate::error::Result;

/// Stateful handle to one audio file mid-decode.
///
/// All output is mono, 32-bit float, at
/// [`TARGET_SAMPLE_RATE`](crate::config::TARGET_SAMPLE_RATE).
#[cfg_attr(test, mockall::automock)]
pub trait DecodeSession: Send {
    /// Establish all native resources for the file.
    ///
    /// On failure the partially acquired resources are released before
    /// returning, and the session stays closed. Calling `open()` on an open
    /// session reopens the file from the start.
    fn open(&mut self) -> Result<()>;

    /// Total duration in seconds. Only meaningful after a successful `open()`;
    /// returns `0.0` before.
    fn duration(&self) -> f32;

    /// Move the read cursor to (approximately) `position` seconds.
    ///
    /// Backends may land on a coarser boundary at or before `position`.
    fn seek(&mut self, position: f32) -> Result<()>;

    /// Fill `buffer` with up to `buffer.len()` samples and return how many
    /// were written.
    ///
    /// Fewer than requested means end of stream or a recoverable stall.
    /// Zero while [`duration`](Self::duration) says more data remains means
    /// the file cannot be decoded any further.
    fn read(&mut self, buffer: &mut [f32]) -> usize;
}
