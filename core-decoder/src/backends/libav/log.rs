//! Routes libav's log output into `tracing`.
//!
//! A callback is installed once when the libraries are bound. Lines above
//! the threshold set through [`LibavApi::set_log_level`](super::LibavApi::set_log_level)
//! are dropped before formatting; the rest are emitted as trace events.

use super::ffi::{LogCallback, VaList, AV_LOG_PANIC};
use super::symbols::LibavFunctions;
use std::ffi::{c_char, c_int, c_void, CStr};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::OnceLock;
use tracing::trace;

type FormatLine =
    unsafe extern "C" fn(*mut c_void, c_int, *const c_char, VaList, *mut c_char, c_int, *mut c_int) -> c_int;

/// Longest line forwarded; libav truncates beyond it.
const LINE_CAPACITY: usize = 1024;

static THRESHOLD: AtomicI32 = AtomicI32::new(AV_LOG_PANIC);
static FORMAT_LINE: OnceLock<FormatLine> = OnceLock::new();

pub(super) fn install(functions: &LibavFunctions) {
    if FORMAT_LINE.set(functions.av_log_format_line2).is_err() {
        return;
    }
    // SAFETY: `forward` matches the callback signature and only touches
    // state that outlives the libraries.
    unsafe { (functions.av_log_set_callback)(Some(forward as LogCallback)) }
}

pub(super) fn set_threshold(level: c_int) {
    THRESHOLD.store(level, Ordering::Relaxed);
}

/// Whether a message at `level` passes `threshold`. Lower is more severe.
fn passes(level: c_int, threshold: c_int) -> bool {
    level <= threshold
}

/// Text of a formatted line without libav's trailing newline.
fn line_text(line: &CStr) -> Option<String> {
    let text = line.to_string_lossy();
    let text = text.trim_end();
    (!text.is_empty()).then(|| text.to_string())
}

unsafe extern "C" fn forward(avcl: *mut c_void, level: c_int, fmt: *const c_char, vl: VaList) {
    if !passes(level, THRESHOLD.load(Ordering::Relaxed)) || fmt.is_null() {
        return;
    }
    let Some(format_line) = FORMAT_LINE.get() else {
        return;
    };

    let mut line = [0 as c_char; LINE_CAPACITY];
    let mut print_prefix: c_int = 1;
    format_line(
        avcl,
        level,
        fmt,
        vl,
        line.as_mut_ptr(),
        LINE_CAPACITY as c_int,
        &mut print_prefix,
    );
    line[LINE_CAPACITY - 1] = 0;

    if let Some(text) = line_text(CStr::from_ptr(line.as_ptr())) {
        trace!(libav_level = level, "{}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::libav::ffi::AV_LOG_VERBOSE;

    #[test]
    fn test_threshold_filters_levels() {
        assert!(passes(AV_LOG_PANIC, AV_LOG_PANIC));
        // AV_LOG_ERROR
        assert!(!passes(16, AV_LOG_PANIC));

        assert!(passes(16, AV_LOG_VERBOSE));
        assert!(passes(AV_LOG_VERBOSE, AV_LOG_VERBOSE));
        // AV_LOG_DEBUG
        assert!(!passes(48, AV_LOG_VERBOSE));
    }

    #[test]
    fn test_line_text_trims_newline() {
        assert_eq!(
            line_text(c"[mp3 @ 0x1] Header missing\n").as_deref(),
            Some("[mp3 @ 0x1] Header missing")
        );
        assert_eq!(line_text(c"\n"), None);
        assert_eq!(line_text(c""), None);
    }
}
