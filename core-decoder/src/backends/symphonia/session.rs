//! # Symphonia Decode Session
//!
//! Pure-Rust decode path: Symphonia demuxes and decodes, the sample converter
//! downmixes, and [`MonoResampler`] converts to 22050 Hz.
//!
//! ## Decode Loop
//!
//! Each `read()` walks a small state machine until the buffer is full or the
//! input ends:
//!
//! ```text
//! Resampling ──(buffer not full)──> ReadingContainer ──packet──> DecodingPacket
//!     ^                                   │ end of input                │
//!     └───────────────────────────────────┴──────(frame)────────────────┘
//! ```
//!
//! Corrupt packets are skipped up to `max_consecutive_decode_errors` in a row.
//! At end of input the resampler is flushed so the tail is not lost.

use super::format_detector::FormatDetector;
use super::sample_converter::SampleConverter;
use crate::config::DecoderConfig;
use crate::error::{DecoderError, Result};
use crate::error_budget::ErrorBudget;
use crate::resample::MonoResampler;
use crate::session::DecodeSession;
use std::collections::VecDeque;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, error, info, instrument, trace, warn};

/// Decode session backed by Symphonia.
pub struct SymphoniaSession {
    path: PathBuf,
    config: DecoderConfig,
    stream: Option<OpenStream>,
}

/// Everything that exists only while the file is open.
struct OpenStream {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    time_base: Option<TimeBase>,
    duration: f32,
    resampler: MonoResampler,
    /// Downmixed source-rate samples of the current packet.
    mono: Vec<f32>,
    /// Resampled samples not yet handed to the caller.
    ready: VecDeque<f32>,
    /// Source frames still to drop after an accurate seek.
    skip_frames: u64,
    errors: ErrorBudget,
    exhausted: bool,
}

enum LoopState {
    ReadingContainer,
    DecodingPacket(Packet),
    Resampling,
    Done,
}

impl SymphoniaSession {
    pub fn new(path: impl Into<PathBuf>, config: DecoderConfig) -> Self {
        Self {
            path: path.into(),
            config,
            stream: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl DecodeSession for SymphoniaSession {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn open(&mut self) -> Result<()> {
        // Release any previous state before touching the file again.
        self.stream = None;

        let mut reader = probe(&self.path)?;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecoderError::UnsupportedFormat("No audio track found".to_string()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();
        FormatDetector::validate_codec_support(params.codec)?;

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| DecoderError::UnsupportedFormat("Missing sample rate".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| {
                DecoderError::UnsupportedCodec(format!("Failed to create codec decoder: {}", e))
            })?;

        let duration = match params.n_frames {
            Some(frames) => frames as f64 / f64::from(sample_rate),
            None => {
                debug!("Container declares no frame count, scanning packets");
                let ticks = scan_track_length(reader.as_mut(), track_id);
                // The scan consumed the reader; start over for decoding.
                reader = probe(&self.path)?;
                ticks_to_seconds(ticks, params.time_base, sample_rate)
            }
        };

        let resampler = MonoResampler::new(sample_rate, self.config.resampler_chunk_frames)?;

        info!(
            codec = FormatDetector::codec_name(params.codec),
            sample_rate,
            duration,
            "Opened file"
        );

        self.stream = Some(OpenStream {
            reader,
            decoder,
            track_id,
            sample_rate,
            time_base: params.time_base,
            duration: duration as f32,
            resampler,
            mono: Vec::new(),
            ready: VecDeque::new(),
            skip_frames: 0,
            errors: ErrorBudget::new(self.config.max_consecutive_decode_errors),
            exhausted: false,
        });

        Ok(())
    }

    fn duration(&self) -> f32 {
        self.stream.as_ref().map(|s| s.duration).unwrap_or(0.0)
    }

    #[instrument(skip(self))]
    fn seek(&mut self, position: f32) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(DecoderError::NotOpen)?;
        stream.seek(position)
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            warn!("read() on a session that is not open");
            return 0;
        };
        stream.read(buffer)
    }
}

impl OpenStream {
    fn seek(&mut self, position: f32) -> Result<()> {
        let seconds = f64::from(position.max(0.0));
        let seeked = self
            .reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::new(seconds.trunc() as u64, seconds.fract()),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| DecoderError::SeekFailed(e.to_string()))?;

        self.decoder.reset();
        self.resampler.reset()?;
        self.ready.clear();
        self.exhausted = false;
        self.errors.reset();

        // The demuxer may land on a packet boundary before the target.
        let overshoot = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.skip_frames = ticks_to_frames(overshoot, self.time_base, self.sample_rate);

        debug!(
            position,
            actual_ts = seeked.actual_ts,
            skip_frames = self.skip_frames,
            "Seek completed"
        );
        Ok(())
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let mut written = 0;
        let mut state = LoopState::Resampling;

        loop {
            state = match state {
                LoopState::Resampling => {
                    let n = self.ready.len().min(buffer.len() - written);
                    for (dst, src) in buffer[written..written + n].iter_mut().zip(self.ready.drain(..n)) {
                        *dst = src;
                    }
                    written += n;

                    if written == buffer.len() || self.exhausted {
                        LoopState::Done
                    } else {
                        LoopState::ReadingContainer
                    }
                }
                LoopState::ReadingContainer => self.next_packet(),
                LoopState::DecodingPacket(packet) => self.decode_packet(&packet),
                LoopState::Done => break,
            };
        }

        trace!(requested = buffer.len(), written, "Read completed");
        written
    }

    fn next_packet(&mut self) -> LoopState {
        match self.reader.next_packet() {
            Ok(packet) if packet.track_id() != self.track_id => LoopState::ReadingContainer,
            Ok(packet) => LoopState::DecodingPacket(packet),
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("Reached end of stream");
                self.finish()
            }
            Err(SymphoniaError::ResetRequired) => {
                warn!("Track list changed mid-stream, stopping");
                self.finish()
            }
            Err(SymphoniaError::IoError(e)) => self.record_error(&e.to_string()),
            Err(e) => {
                error!("Fatal format reader error: {}", e);
                LoopState::Done
            }
        }
    }

    fn decode_packet(&mut self, packet: &Packet) -> LoopState {
        let decoded = match self.decoder.decode(packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => return self.record_error(e),
            Err(SymphoniaError::IoError(e)) => return self.record_error(&e.to_string()),
            Err(e) => {
                error!("Fatal decode error: {}", e);
                return LoopState::Done;
            }
        };

        self.errors.reset();
        self.mono.clear();
        SampleConverter::downmix_into(&decoded, &mut self.mono);

        if self.skip_frames > 0 {
            let trim = self.mono.len().min(self.skip_frames as usize);
            self.mono.drain(..trim);
            self.skip_frames -= trim as u64;
        }

        let mut resampled = Vec::new();
        if let Err(e) = self.resampler.process(&self.mono, &mut resampled) {
            error!("Resampling failed: {}", e);
            return LoopState::Done;
        }
        self.ready.extend(resampled);

        LoopState::Resampling
    }

    /// Skip a bad packet, or give up after too many in a row.
    fn record_error(&mut self, reason: &str) -> LoopState {
        if self.errors.record(reason) {
            LoopState::ReadingContainer
        } else {
            LoopState::Done
        }
    }

    /// Flush the resampler tail once input is exhausted.
    fn finish(&mut self) -> LoopState {
        let mut tail = Vec::new();
        if let Err(e) = self.resampler.flush(&mut tail) {
            warn!("Resampler flush failed: {}", e);
        }
        self.ready.extend(tail);
        self.exhausted = true;
        LoopState::Resampling
    }
}

fn probe(path: &Path) -> Result<Box<dyn FormatReader>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DecoderError::FileNotFound(path.to_path_buf()),
        _ => DecoderError::Io(e),
    })?;

    let hint = FormatDetector::hint_from_path(path);
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let format_options = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_options, &MetadataOptions::default())
        .map_err(|e| DecoderError::UnsupportedFormat(format!("Failed to probe format: {}", e)))?;

    Ok(probed.format)
}

/// Sum of packet durations for `track_id`, in the track's time base.
fn scan_track_length(reader: &mut dyn FormatReader, track_id: u32) -> u64 {
    let mut ticks = 0u64;
    while let Ok(packet) = reader.next_packet() {
        if packet.track_id() == track_id {
            ticks += packet.dur();
        }
    }
    ticks
}

fn ticks_to_seconds(ticks: u64, time_base: Option<TimeBase>, sample_rate: u32) -> f64 {
    match time_base {
        Some(tb) => {
            let time = tb.calc_time(ticks);
            time.seconds as f64 + time.frac
        }
        None => ticks as f64 / f64::from(sample_rate),
    }
}

fn ticks_to_frames(ticks: u64, time_base: Option<TimeBase>, sample_rate: u32) -> u64 {
    match time_base {
        Some(tb) if tb.denom != 0 => {
            let frames = u128::from(ticks) * u128::from(tb.numer) * u128::from(sample_rate)
                / u128::from(tb.denom);
            frames as u64
        }
        _ => ticks,
    }
}
