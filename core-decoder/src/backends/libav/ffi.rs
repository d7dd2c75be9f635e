//! Raw libav types, constants and struct-prefix accessors.
//!
//! Only opaque handles cross the boundary. The handful of struct fields the
//! decode loop reads are accessed by byte offset; offsets listed here are
//! stable on 64-bit targets across every whitelisted release, while the
//! ones that move between releases live in [`StreamLayout`](super::releases::StreamLayout).

use std::ffi::{c_char, c_int, c_void};
use std::ptr;

#[repr(C)]
pub struct AVFormatContext {
    _private: [u8; 0],
}

#[repr(C)]
pub struct AVCodecContext {
    _private: [u8; 0],
}

#[repr(C)]
pub struct AVCodec {
    _private: [u8; 0],
}

#[repr(C)]
pub struct AVCodecParameters {
    _private: [u8; 0],
}

#[repr(C)]
pub struct AVStream {
    _private: [u8; 0],
}

#[repr(C)]
pub struct AVPacket {
    _private: [u8; 0],
}

#[repr(C)]
pub struct AVFrame {
    _private: [u8; 0],
}

#[repr(C)]
pub struct SwrContext {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AVRational {
    pub num: c_int,
    pub den: c_int,
}

impl AVRational {
    /// `value` ticks of this time base in seconds, or `None` for a
    /// degenerate base.
    pub fn ticks_to_seconds(self, value: i64) -> Option<f64> {
        (self.den != 0).then(|| value as f64 * f64::from(self.num) / f64::from(self.den))
    }

    /// `seconds` expressed in ticks of this time base.
    pub fn seconds_to_ticks(self, seconds: f64) -> Option<i64> {
        (self.num != 0).then(|| (seconds * f64::from(self.den) / f64::from(self.num)) as i64)
    }
}

// ============================================================================
// Constants
// ============================================================================

pub const AVMEDIA_TYPE_AUDIO: c_int = 1;

pub const AV_SAMPLE_FMT_NONE: c_int = -1;
pub const AV_SAMPLE_FMT_FLT: c_int = 3;

pub const AV_NOPTS_VALUE: i64 = i64::MIN;

pub const AVSEEK_FLAG_BACKWARD: c_int = 1;
pub const AVSEEK_FLAG_ANY: c_int = 4;

pub const AV_LOG_PANIC: c_int = 0;
pub const AV_LOG_VERBOSE: c_int = 40;

/// A `va_list` parameter. Every supported 64-bit ABI passes it as one
/// pointer-sized value, so it is forwarded without being inspected.
pub type VaList = *mut c_void;

/// `void (*)(void *avcl, int level, const char *fmt, va_list vl)`
pub type LogCallback = unsafe extern "C" fn(*mut c_void, c_int, *const c_char, VaList);

pub const AV_CH_LAYOUT_MONO: i64 = 0x4;

/// `FFERRTAG('E','O','F',' ')`
pub const AVERROR_EOF: c_int = -0x2046_4F45;

/// `AVERROR(EAGAIN)`; errno values differ between platforms.
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub const AVERROR_EAGAIN: c_int = -35;
#[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "freebsd")))]
pub const AVERROR_EAGAIN: c_int = -11;

// ============================================================================
// Stable struct prefixes (64-bit)
// ============================================================================

/// `AVFormatContext.nb_streams`
pub const FORMAT_NB_STREAMS: usize = 44;
/// `AVFormatContext.streams`
pub const FORMAT_STREAMS: usize = 48;

/// `AVPacket.stream_index`
pub const PACKET_STREAM_INDEX: usize = 36;

/// `AVFrame.extended_data`
pub const FRAME_EXTENDED_DATA: usize = 96;
/// `AVFrame.nb_samples`
pub const FRAME_NB_SAMPLES: usize = 112;
/// `AVFrame.format`
pub const FRAME_FORMAT: usize = 116;

/// `AVCodec.id`
pub const CODEC_ID: usize = 20;

/// `AVCodecParameters.codec_type`
pub const CODECPAR_CODEC_TYPE: usize = 0;
/// `AVCodecParameters.codec_id`
pub const CODECPAR_CODEC_ID: usize = 4;

/// Read a `T` at `offset` bytes into the struct behind `base`.
///
/// # Safety
///
/// `base` must point to a live struct at least `offset + size_of::<T>()`
/// bytes long whose bytes at `offset` hold a valid `T`.
pub unsafe fn read_field<S, T: Copy>(base: *const S, offset: usize) -> T {
    ptr::read_unaligned(base.cast::<u8>().add(offset).cast::<T>())
}

/// Whether a pointer read from a struct looks like a real heap address.
pub fn is_plausible_pointer<T>(p: *const T) -> bool {
    let addr = p as usize;
    addr >= 0x1000 && addr % std::mem::align_of::<usize>() == 0
}
