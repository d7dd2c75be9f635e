//! # Excerpt Decoding Example
//!
//! Decodes a window of an audio file and prints a short summary.
//!
//! Run with:
//! ```bash
//! cargo run --example decode_excerpt -- <file> [length] [start] [backend]
//!
//! # 30 seconds from the middle of the track, in-process backend only
//! cargo run --example decode_excerpt -- song.flac 30 -60 symphonia
//! ```

use core_decoder::{DecoderConfig, ExcerptDecoder, TARGET_SAMPLE_RATE};
use core_runtime::logging::{init_logging, strip_path, LogFormat, LogLevel, LoggingConfig};
use std::env;
use std::process::ExitCode;
use tracing::info;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: decode_excerpt <file> [length] [start] [backend]");
        return ExitCode::FAILURE;
    };

    let length: f32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(0.0);
    let start: f32 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.0);

    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug),
    )
    .expect("Failed to initialize logging");

    let mut config = DecoderConfig::default();
    if let Some(backend) = args.get(4) {
        config = config.with_preferred_backend(backend.clone());
    }

    let decoder = match ExcerptDecoder::new(config) {
        Ok(decoder) => decoder,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(backends = ?decoder.registry().available_backends(), "Available backends");

    let samples = decoder.decode(path, length, start);
    if samples.is_empty() {
        eprintln!("nothing decoded from {}", strip_path(path));
        return ExitCode::FAILURE;
    }

    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    let rms = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();

    println!(
        "{}: {} samples ({:.2}s), peak {:.3}, rms {:.3}",
        strip_path(path),
        samples.len(),
        samples.len() as f32 / TARGET_SAMPLE_RATE as f32,
        peak,
        rms
    );
    ExitCode::SUCCESS
}
