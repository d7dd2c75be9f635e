//! End-to-end decoding through the in-process backend.
//!
//! Fixtures are synthesized WAV files written with `hound` into a temporary
//! directory. The registry holds only the Symphonia backend so results do not
//! depend on whether FFmpeg is installed on the host.

#![cfg(feature = "decoder-wav")]

use core_decoder::backends::symphonia::SymphoniaSession;
use core_decoder::{
    BackendRegistry, DecodeSession, DecoderConfig, DecoderError, ExcerptDecoder, SymphoniaBackend,
    TARGET_SAMPLE_RATE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

/// Write a 16-bit WAV whose frame `i`, channel `c` is `sample(i, c)`.
fn write_wav(
    dir: &TempDir,
    name: &str,
    sample_rate: u32,
    channels: u16,
    frames: usize,
    sample: impl Fn(usize, u16) -> i16,
) -> PathBuf {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..frames {
        for c in 0..channels {
            writer.write_sample(sample(i, c)).unwrap();
        }
    }
    writer.finalize().unwrap();
    path
}

/// Distinct, reproducible value per frame.
fn ramp(i: usize) -> i16 {
    ((i * 37) % 20_000) as i16 - 10_000
}

fn normalized(value: i16) -> f32 {
    f32::from(value) / f32::from(i16::MAX)
}

fn symphonia_only() -> ExcerptDecoder {
    let config = DecoderConfig::default();
    let registry = BackendRegistry::builder()
        .register(SymphoniaBackend::new(config.clone()))
        .build();
    ExcerptDecoder::with_registry(Arc::new(registry), config)
}

fn open_session(path: &Path) -> SymphoniaSession {
    let mut session = SymphoniaSession::new(path, DecoderConfig::default());
    session.open().unwrap();
    session
}

// ============================================================================
// Session
// ============================================================================

#[test]
fn test_duration_from_header() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "two_seconds.wav", 44100, 2, 88200, |i, _| ramp(i));

    let session = open_session(&path);
    assert!((session.duration() - 2.0).abs() < 1e-4);
}

#[test]
fn test_passthrough_rate_is_sample_exact() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "native.wav", TARGET_SAMPLE_RATE, 1, 22050, |i, _| ramp(i));

    let mut session = open_session(&path);
    let mut buffer = vec![0.0f32; 1000];
    assert_eq!(session.read(&mut buffer), 1000);

    for (i, value) in buffer.iter().enumerate() {
        assert!((value - normalized(ramp(i))).abs() < 1e-6, "frame {}", i);
    }
}

#[test]
fn test_seek_lands_on_requested_frame() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "native.wav", TARGET_SAMPLE_RATE, 1, 44100, |i, _| ramp(i));

    let mut session = open_session(&path);
    session.seek(0.5).unwrap();

    let mut buffer = vec![0.0f32; 64];
    assert_eq!(session.read(&mut buffer), 64);
    for (offset, value) in buffer.iter().enumerate() {
        assert!((value - normalized(ramp(11025 + offset))).abs() < 1e-6);
    }
}

#[test]
fn test_read_near_end_returns_remaining_samples() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "two_seconds.wav", 44100, 2, 88200, |i, _| ramp(i));

    let mut session = open_session(&path);
    session.seek(1.5).unwrap();

    let mut buffer = vec![0.0f32; 22050];
    assert_eq!(session.read(&mut buffer), 11025);

    // Input is exhausted; further reads produce nothing.
    assert_eq!(session.read(&mut buffer), 0);
}

#[test]
fn test_reads_continue_where_previous_stopped() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "native.wav", TARGET_SAMPLE_RATE, 1, 4000, |i, _| ramp(i));

    let mut session = open_session(&path);
    let mut first = vec![0.0f32; 1500];
    let mut second = vec![0.0f32; 1500];
    assert_eq!(session.read(&mut first), 1500);
    assert_eq!(session.read(&mut second), 1500);

    assert!((second[0] - normalized(ramp(1500))).abs() < 1e-6);
}

#[test]
fn test_reopen_restarts_from_beginning() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "native.wav", TARGET_SAMPLE_RATE, 1, 4000, |i, _| ramp(i));

    let mut session = open_session(&path);
    let mut buffer = vec![0.0f32; 2000];
    session.read(&mut buffer);

    session.open().unwrap();
    assert_eq!(session.read(&mut buffer[..1]), 1);
    assert!((buffer[0] - normalized(ramp(0))).abs() < 1e-6);
}

#[test]
fn test_not_audio_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.wav");
    std::fs::write(&path, b"definitely not a RIFF header").unwrap();

    let mut session = SymphoniaSession::new(&path, DecoderConfig::default());
    assert!(matches!(session.open(), Err(DecoderError::UnsupportedFormat(_))));
}

// ============================================================================
// Entry point
// ============================================================================

#[test]
fn test_stereo_44100_downsampled_to_mono_22050() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "stereo.wav", 44100, 2, 88200, |i, _| ramp(i));

    let samples = symphonia_only().decode(&path, 1.0, 0.0);
    assert_eq!(samples.len(), 22050);
}

#[test]
fn test_whole_file_when_length_not_positive() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "stereo.wav", 44100, 2, 88200, |i, _| ramp(i));

    let samples = symphonia_only().decode(&path, 0.0, 0.0);
    assert_eq!(samples.len(), 44100);
}

#[test]
fn test_window_past_end_shifted_left() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "native.wav", TARGET_SAMPLE_RATE, 1, 44100, |i, _| ramp(i));

    // 1s requested from 1.5s of a 2s file: decoded window is [1.0, 2.0).
    let samples = symphonia_only().decode(&path, 1.0, 1.5);
    assert_eq!(samples.len(), 22050);
    assert!((samples[0] - normalized(ramp(22050))).abs() < 1e-6);
}

#[test]
fn test_negative_start_centers_window() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "native.wav", TARGET_SAMPLE_RATE, 1, 4 * 22050, |i, _| ramp(i));

    // 4s file, 1s window, center bias of at most 10s: starts at (4 - 1) / 2.
    let samples = symphonia_only().decode(&path, 1.0, -10.0);
    assert_eq!(samples.len(), 22050);
    assert!((samples[0] - normalized(ramp(33075))).abs() < 1e-6);
}

#[test]
fn test_stereo_channels_are_averaged() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "split.wav", TARGET_SAMPLE_RATE, 2, 2205, |_, c| {
        if c == 0 {
            16_000
        } else {
            -8_000
        }
    });

    let samples = symphonia_only().decode(&path, 0.0, 0.0);
    assert_eq!(samples.len(), 2205);
    let expected = (normalized(16_000) + normalized(-8_000)) / 2.0;
    assert!(samples.iter().all(|s| (s - expected).abs() < 1e-6));
}

#[test]
fn test_full_scale_normalizes_to_one() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "loud.wav", 44100, 1, 44100, |_, _| i16::MAX);

    let samples = symphonia_only().decode(&path, 0.0, 0.0);
    assert_eq!(samples.len(), 22050);

    // Away from the edges the resampled DC level is the input level.
    let middle = samples[11025];
    assert!((middle - 1.0).abs() < 0.01, "middle sample {}", middle);
}

#[test]
fn test_missing_file_yields_empty_output() {
    let samples = symphonia_only().decode("/definitely/not/here.wav", 5.0, 0.0);
    assert!(samples.is_empty());
}

#[test]
fn test_empty_file_yields_empty_output() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "empty.wav", 44100, 1, 0, |_, _| 0);

    let samples = symphonia_only().decode(&path, 5.0, 0.0);
    assert!(samples.is_empty());
}
