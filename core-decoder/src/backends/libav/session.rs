//! # libav Decode Session
//!
//! Demuxes with avformat, decodes with avcodec and converts to mono f32 at
//! 22050 Hz with swresample.
//!
//! Every native handle lives in its own guard, so a failure at any point of
//! `open()` releases exactly what was acquired so far. [`OpenFile`] declares
//! its guards in release order: resampler, frame, packet, codec, container.
//!
//! ## Decode Loop
//!
//! ```text
//! DecodingPacket ──EAGAIN──> ReadingContainer ──packet──> DecodingPacket
//!       │ frame                    │ end of input: send flush packet
//!       v                          v
//!   Resampling ──buffer full──> Done <── codec drained: flush resampler
//! ```
//!
//! A read starts in `DecodingPacket` so frames the codec still holds from
//! the previous call are delivered first. A packet the codec rejects is
//! dropped and reading continues, up to `max_consecutive_decode_errors` in
//! a row.

use super::ffi::*;
use super::releases::{ChannelApi, StreamLayout};
use super::symbols::{LibavApi, LibavFunctions};
use crate::config::{DecoderConfig, TARGET_SAMPLE_RATE};
use crate::error::{DecoderError, Result};
use crate::error_budget::ErrorBudget;
use crate::session::DecodeSession;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr;
use tracing::{debug, error, info, instrument, trace, warn};

// ============================================================================
// Resource Guards
// ============================================================================

struct FormatInput {
    api: &'static LibavFunctions,
    ptr: *mut AVFormatContext,
}

impl Drop for FormatInput {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: opened by avformat_open_input; close nulls the pointer.
            unsafe { (self.api.avformat_close_input)(&mut self.ptr) }
        }
    }
}

struct CodecContext {
    api: &'static LibavFunctions,
    ptr: *mut AVCodecContext,
}

impl Drop for CodecContext {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: allocated by avcodec_alloc_context3.
            unsafe { (self.api.avcodec_free_context)(&mut self.ptr) }
        }
    }
}

struct PacketBuffer {
    api: &'static LibavFunctions,
    ptr: *mut AVPacket,
}

impl Drop for PacketBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: allocated by av_packet_alloc; free also unrefs.
            unsafe { (self.api.av_packet_free)(&mut self.ptr) }
        }
    }
}

struct FrameBuffer {
    api: &'static LibavFunctions,
    ptr: *mut AVFrame,
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: allocated by av_frame_alloc; free also unrefs.
            unsafe { (self.api.av_frame_free)(&mut self.ptr) }
        }
    }
}

struct Resampler {
    api: &'static LibavFunctions,
    ptr: *mut SwrContext,
}

impl Drop for Resampler {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: allocated by swr_alloc.
            unsafe { (self.api.swr_free)(&mut self.ptr) }
        }
    }
}

/// All native state of an open file. Field order is drop order.
struct OpenFile {
    resampler: Resampler,
    frame: FrameBuffer,
    packet: PacketBuffer,
    codec: CodecContext,
    format: FormatInput,
    stream_index: c_int,
    time_base: AVRational,
    input_format: c_int,
    duration: f32,
    /// A packet was read but the codec refused it; resend before reading.
    packet_pending: bool,
    /// The flush packet has been sent.
    input_ended: bool,
    /// Codec and resampler are fully drained.
    finished: bool,
    errors: ErrorBudget,
}

enum LoopState {
    ReadingContainer,
    DecodingPacket,
    Resampling,
    Done,
}

// ============================================================================
// Session
// ============================================================================

/// Decode session backed by the dynamically loaded FFmpeg libraries.
pub struct LibavSession {
    api: &'static LibavApi,
    path: PathBuf,
    config: DecoderConfig,
    file: Option<OpenFile>,
}

// SAFETY: the raw handles are owned exclusively by this session and are only
// touched through `&mut self`; libav contexts are not tied to a thread.
unsafe impl Send for LibavSession {}

impl LibavSession {
    pub fn new(api: &'static LibavApi, path: impl Into<PathBuf>, config: DecoderConfig) -> Self {
        Self {
            api,
            path: path.into(),
            config,
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn open_file(&self) -> Result<OpenFile> {
        let f = self.api.functions();
        let release = self.api.release();

        if !self.path.exists() {
            return Err(DecoderError::FileNotFound(self.path.clone()));
        }

        let c_path = path_to_cstring(&self.path)?;

        let mut format = FormatInput {
            api: f,
            ptr: ptr::null_mut(),
        };
        // SAFETY: format.ptr is null, so avformat allocates the context.
        let ret = unsafe {
            (f.avformat_open_input)(&mut format.ptr, c_path.as_ptr(), ptr::null(), ptr::null_mut())
        };
        if ret < 0 {
            return Err(DecoderError::Unopenable(format!(
                "avformat_open_input failed ({})",
                ret
            )));
        }

        // SAFETY: format.ptr is a live context.
        if unsafe { (f.avformat_find_stream_info)(format.ptr, ptr::null_mut()) } < 0 {
            return Err(DecoderError::UnsupportedFormat(
                "Could not read stream information".to_string(),
            ));
        }

        let mut decoder: *const AVCodec = ptr::null();
        // SAFETY: format.ptr is live; decoder receives a static codec descriptor.
        let stream_index = unsafe {
            (f.av_find_best_stream)(format.ptr, AVMEDIA_TYPE_AUDIO, -1, -1, &mut decoder, 0)
        };
        if stream_index < 0 {
            return Err(DecoderError::UnsupportedFormat("No audio stream".to_string()));
        }
        if decoder.is_null() {
            return Err(DecoderError::UnsupportedCodec(
                "No decoder for the audio stream".to_string(),
            ));
        }

        // SAFETY: stream_index was returned by av_find_best_stream for this
        // context and decoder is a live codec descriptor.
        let (stream, layout) = unsafe {
            locate_stream(format.ptr, stream_index, decoder, release.stream_layouts)?
        };

        // SAFETY: layout was validated against this stream.
        let (codecpar, time_base, raw_duration) = unsafe {
            (
                read_field::<_, *const AVCodecParameters>(stream, layout.codecpar),
                read_field::<_, AVRational>(stream, layout.time_base),
                read_field::<_, i64>(stream, layout.duration),
            )
        };

        let codec = CodecContext {
            api: f,
            // SAFETY: decoder is a live codec descriptor.
            ptr: unsafe { (f.avcodec_alloc_context3)(decoder) },
        };
        if codec.ptr.is_null() {
            return Err(DecoderError::Unopenable("Could not allocate codec context".to_string()));
        }

        // SAFETY: codec.ptr and codecpar are live.
        if unsafe { (f.avcodec_parameters_to_context)(codec.ptr, codecpar) } < 0 {
            return Err(DecoderError::UnsupportedCodec(
                "Could not copy codec parameters".to_string(),
            ));
        }

        // SAFETY: codec.ptr was allocated for decoder.
        if unsafe { (f.avcodec_open2)(codec.ptr, decoder, ptr::null_mut()) } < 0 {
            return Err(DecoderError::UnsupportedCodec("Could not open codec".to_string()));
        }

        let duration = if raw_duration == AV_NOPTS_VALUE {
            warn!("Stream declares no duration");
            0.0
        } else {
            time_base.ticks_to_seconds(raw_duration).unwrap_or(0.0)
        };

        let frame = FrameBuffer {
            api: f,
            // SAFETY: no preconditions.
            ptr: unsafe { (f.av_frame_alloc)() },
        };
        let packet = PacketBuffer {
            api: f,
            // SAFETY: no preconditions.
            ptr: unsafe { (f.av_packet_alloc)() },
        };
        if frame.ptr.is_null() || packet.ptr.is_null() {
            return Err(DecoderError::Unopenable("Could not allocate frame buffers".to_string()));
        }

        // SAFETY: codec.ptr is an open codec context.
        let (resampler, input_format) = unsafe { create_resampler(f, release.channel_api, codec.ptr)? };

        info!(
            release = release.name,
            stream_index,
            duration,
            "Opened file"
        );

        Ok(OpenFile {
            resampler,
            frame,
            packet,
            codec,
            format,
            stream_index,
            time_base,
            input_format,
            duration: duration as f32,
            packet_pending: false,
            input_ended: false,
            finished: false,
            errors: ErrorBudget::new(self.config.max_consecutive_decode_errors),
        })
    }
}

impl DecodeSession for LibavSession {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn open(&mut self) -> Result<()> {
        self.file = None;
        self.file = Some(self.open_file()?);
        Ok(())
    }

    fn duration(&self) -> f32 {
        self.file.as_ref().map(|file| file.duration).unwrap_or(0.0)
    }

    #[instrument(skip(self))]
    fn seek(&mut self, position: f32) -> Result<()> {
        let f = self.api.functions();
        let file = self.file.as_mut().ok_or(DecoderError::NotOpen)?;

        let target = file
            .time_base
            .seconds_to_ticks(f64::from(position.max(0.0)))
            .ok_or_else(|| DecoderError::SeekFailed("Stream has no time base".to_string()))?;

        // SAFETY: all handles are live while the file is open.
        unsafe {
            let ret = (f.av_seek_frame)(
                file.format.ptr,
                file.stream_index,
                target,
                AVSEEK_FLAG_BACKWARD | AVSEEK_FLAG_ANY,
            );
            if ret < 0 {
                return Err(DecoderError::SeekFailed(format!("av_seek_frame failed ({})", ret)));
            }

            (f.avcodec_flush_buffers)(file.codec.ptr);
            // Re-initializing drops samples buffered from before the seek.
            if (f.swr_init)(file.resampler.ptr) < 0 {
                return Err(DecoderError::Resampler("swr_init failed after seek".to_string()));
            }
        }

        // SAFETY: the packet is live while the file is open.
        unsafe { file.restart(f) };
        debug!(position, target, "Seek completed");
        Ok(())
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let f = self.api.functions();
        let Some(file) = self.file.as_mut() else {
            warn!("read() on a session that is not open");
            return 0;
        };

        // SAFETY: all handles are live while the file is open.
        let written = unsafe { file.read(f, buffer) };
        trace!(requested = buffer.len(), written, "Read completed");
        written
    }
}

impl OpenFile {
    /// # Safety
    ///
    /// All handles must be live.
    unsafe fn read(&mut self, f: &LibavFunctions, buffer: &mut [f32]) -> usize {
        let mut written = 0;

        if self.finished {
            return self.flush_resampler(f, buffer, written);
        }

        let mut state = LoopState::DecodingPacket;
        loop {
            if written == buffer.len() {
                break;
            }

            state = match state {
                LoopState::ReadingContainer => self.next_packet(f),
                LoopState::DecodingPacket => {
                    let ret = (f.avcodec_receive_frame)(self.codec.ptr, self.frame.ptr);
                    if ret == 0 {
                        self.errors.reset();
                        LoopState::Resampling
                    } else if ret == AVERROR_EAGAIN {
                        LoopState::ReadingContainer
                    } else if ret == AVERROR_EOF {
                        self.finished = true;
                        written = self.flush_resampler(f, buffer, written);
                        LoopState::Done
                    } else {
                        error!("avcodec_receive_frame failed ({})", ret);
                        LoopState::Done
                    }
                }
                LoopState::Resampling => match self.convert_frame(f, buffer, written) {
                    Some(converted) => {
                        written += converted;
                        LoopState::DecodingPacket
                    }
                    None => LoopState::Done,
                },
                LoopState::Done => break,
            };
        }

        written
    }

    /// Feed the next packet of the selected stream to the codec.
    unsafe fn next_packet(&mut self, f: &LibavFunctions) -> LoopState {
        if self.input_ended {
            // Flush packet already sent but the codec wants input: nothing left.
            return LoopState::Done;
        }

        if !self.packet_pending {
            let ret = (f.av_read_frame)(self.format.ptr, self.packet.ptr);
            if ret < 0 {
                if ret != AVERROR_EOF {
                    debug!("av_read_frame ended with {}", ret);
                }
                self.input_ended = true;
                // A null packet puts the codec into draining mode.
                let ret = (f.avcodec_send_packet)(self.codec.ptr, ptr::null());
                if ret < 0 && ret != AVERROR_EOF {
                    warn!("Could not drain codec ({})", ret);
                }
                return LoopState::DecodingPacket;
            }

            let index: c_int = read_field(self.packet.ptr, PACKET_STREAM_INDEX);
            if index != self.stream_index {
                (f.av_packet_unref)(self.packet.ptr);
                return LoopState::ReadingContainer;
            }
        }

        let ret = (f.avcodec_send_packet)(self.codec.ptr, self.packet.ptr);
        if ret == AVERROR_EAGAIN {
            // Codec output must be drained first; keep the packet.
            self.packet_pending = true;
            return LoopState::DecodingPacket;
        }

        self.packet_pending = false;
        (f.av_packet_unref)(self.packet.ptr);

        if ret < 0 {
            let reason = format!("avcodec_send_packet failed ({})", ret);
            return if self.errors.record(&reason) {
                LoopState::ReadingContainer
            } else {
                LoopState::Done
            };
        }
        LoopState::DecodingPacket
    }

    /// Forget per-position state after a seek: a packet held for resending
    /// belongs to the old position and is released.
    unsafe fn restart(&mut self, f: &LibavFunctions) {
        if self.packet_pending {
            (f.av_packet_unref)(self.packet.ptr);
        }
        self.packet_pending = false;
        self.input_ended = false;
        self.finished = false;
        self.errors.reset();
    }

    /// Convert the current frame into `buffer[written..]`.
    ///
    /// Output that does not fit stays buffered in the resampler.
    unsafe fn convert_frame(
        &mut self,
        f: &LibavFunctions,
        buffer: &mut [f32],
        written: usize,
    ) -> Option<usize> {
        let format: c_int = read_field(self.frame.ptr, FRAME_FORMAT);
        let nb_samples: c_int = read_field(self.frame.ptr, FRAME_NB_SAMPLES);
        let data: *const *const u8 = read_field(self.frame.ptr, FRAME_EXTENDED_DATA);

        if format != self.input_format {
            error!(
                expected = self.input_format,
                actual = format,
                "Sample format changed mid-stream"
            );
            (f.av_frame_unref)(self.frame.ptr);
            return None;
        }

        let remaining = buffer.len() - written;
        let mut out = buffer[written..].as_mut_ptr().cast::<u8>();
        let converted = (f.swr_convert)(
            self.resampler.ptr,
            &mut out,
            clamp_count(remaining),
            data,
            nb_samples,
        );
        (f.av_frame_unref)(self.frame.ptr);

        if converted < 0 {
            error!("swr_convert failed ({})", converted);
            return None;
        }
        Some(converted as usize)
    }

    /// Drain the resampler's tail into `buffer[written..]`.
    unsafe fn flush_resampler(
        &mut self,
        f: &LibavFunctions,
        buffer: &mut [f32],
        mut written: usize,
    ) -> usize {
        while written < buffer.len() {
            let mut out = buffer[written..].as_mut_ptr().cast::<u8>();
            let converted = (f.swr_convert)(
                self.resampler.ptr,
                &mut out,
                clamp_count(buffer.len() - written),
                ptr::null(),
                0,
            );
            if converted <= 0 {
                break;
            }
            written += converted as usize;
        }
        written
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn clamp_count(count: usize) -> c_int {
    c_int::try_from(count).unwrap_or(c_int::MAX)
}

fn path_to_cstring(path: &Path) -> Result<CString> {
    let text = path
        .to_str()
        .ok_or_else(|| DecoderError::Unopenable(format!("Non UTF-8 path: {}", path.display())))?;
    CString::new(text)
        .map_err(|_| DecoderError::Unopenable(format!("Path contains NUL: {}", path.display())))
}

/// Find the `AVStream` for `stream_index` and the layout that describes it.
///
/// A layout is accepted only when its `index` field matches and its
/// `codecpar` names the same codec `av_find_best_stream` picked.
///
/// # Safety
///
/// `format` must be a live context with `stream_index` among its streams and
/// `decoder` a live codec descriptor.
unsafe fn locate_stream(
    format: *mut AVFormatContext,
    stream_index: c_int,
    decoder: *const AVCodec,
    layouts: &'static [StreamLayout],
) -> Result<(*const AVStream, &'static StreamLayout)> {
    let nb_streams: u32 = read_field(format, FORMAT_NB_STREAMS);
    let streams: *const *const AVStream = read_field(format, FORMAT_STREAMS);
    if stream_index as u32 >= nb_streams || streams.is_null() {
        return Err(DecoderError::IncompatibleRelease(
            "Stream table does not match the container".to_string(),
        ));
    }

    let stream = *streams.add(stream_index as usize);
    let codec_id: c_int = read_field(decoder, CODEC_ID);

    for layout in layouts {
        let index: c_int = read_field(stream, layout.index);
        if index != stream_index {
            continue;
        }

        let codecpar: *const AVCodecParameters = read_field(stream, layout.codecpar);
        if !is_plausible_pointer(codecpar) {
            continue;
        }

        let par_type: c_int = read_field(codecpar, CODECPAR_CODEC_TYPE);
        let par_id: c_int = read_field(codecpar, CODECPAR_CODEC_ID);
        if par_type == AVMEDIA_TYPE_AUDIO && par_id == codec_id {
            return Ok((stream, layout));
        }
    }

    Err(DecoderError::IncompatibleRelease(
        "No known AVStream layout matches the loaded libavformat".to_string(),
    ))
}

/// Configure swresample for `codec`'s output, returning the context and the
/// input sample format it expects.
///
/// # Safety
///
/// `codec` must be an open codec context.
unsafe fn create_resampler(
    f: &'static LibavFunctions,
    channel_api: ChannelApi,
    codec: *mut AVCodecContext,
) -> Result<(Resampler, c_int)> {
    let codec_obj = codec.cast::<c_void>();

    let mut sample_rate: i64 = 0;
    if (f.av_opt_get_int)(codec_obj, c"ar".as_ptr(), 0, &mut sample_rate) < 0 || sample_rate <= 0 {
        return Err(DecoderError::UnsupportedCodec("Unknown sample rate".to_string()));
    }

    let mut sample_fmt: c_int = AV_SAMPLE_FMT_NONE;
    if (f.av_opt_get_sample_fmt)(codec_obj, c"sample_fmt".as_ptr(), 0, &mut sample_fmt) < 0
        || sample_fmt == AV_SAMPLE_FMT_NONE
    {
        return Err(DecoderError::UnsupportedCodec("Unknown sample format".to_string()));
    }

    let resampler = Resampler {
        api: f,
        ptr: (f.swr_alloc)(),
    };
    if resampler.ptr.is_null() {
        return Err(DecoderError::Resampler("swr_alloc failed".to_string()));
    }
    let swr = resampler.ptr.cast::<c_void>();

    let mut ok = true;
    match channel_api {
        ChannelApi::Count => {
            let mut channels: i64 = 0;
            if (f.av_opt_get_int)(codec_obj, c"ac".as_ptr(), 0, &mut channels) < 0 || channels <= 0 {
                return Err(DecoderError::UnsupportedCodec("Unknown channel count".to_string()));
            }
            ok &= (f.av_opt_set_int)(swr, c"in_channel_count".as_ptr(), channels, 0) >= 0;
            ok &= (f.av_opt_set_int)(swr, c"out_channel_count".as_ptr(), 1, 0) >= 0;
            ok &= (f.av_opt_set_int)(swr, c"out_channel_layout".as_ptr(), AV_CH_LAYOUT_MONO, 0) >= 0;
        }
        ChannelApi::Layout => {
            let mut description: *mut u8 = ptr::null_mut();
            if (f.av_opt_get)(codec_obj, c"ch_layout".as_ptr(), 0, &mut description) < 0
                || description.is_null()
            {
                return Err(DecoderError::UnsupportedCodec("Unknown channel layout".to_string()));
            }
            let layout = CStr::from_ptr(description.cast_const().cast::<c_char>()).to_owned();
            (f.av_free)(description.cast::<c_void>());

            ok &= (f.av_opt_set)(swr, c"in_chlayout".as_ptr(), layout.as_ptr(), 0) >= 0;
            ok &= (f.av_opt_set)(swr, c"out_chlayout".as_ptr(), c"mono".as_ptr(), 0) >= 0;
        }
    }

    ok &= (f.av_opt_set_int)(swr, c"in_sample_rate".as_ptr(), sample_rate, 0) >= 0;
    ok &= (f.av_opt_set_int)(swr, c"out_sample_rate".as_ptr(), i64::from(TARGET_SAMPLE_RATE), 0) >= 0;
    ok &= (f.av_opt_set_sample_fmt)(swr, c"in_sample_fmt".as_ptr(), sample_fmt, 0) >= 0;
    ok &= (f.av_opt_set_sample_fmt)(swr, c"out_sample_fmt".as_ptr(), AV_SAMPLE_FMT_FLT, 0) >= 0;

    if !ok {
        return Err(DecoderError::Resampler("Could not configure swresample".to_string()));
    }
    if (f.swr_init)(resampler.ptr) < 0 {
        return Err(DecoderError::Resampler("swr_init failed".to_string()));
    }

    debug!(sample_rate, sample_fmt, "Configured resampler");
    Ok((resampler, sample_fmt))
}
