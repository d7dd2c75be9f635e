//! # In-Process Backend
//!
//! Decodes with the pure-Rust Symphonia library and resamples with rubato.
//! Nothing is loaded at runtime, so the backend is always available; the
//! set of formats depends on the `decoder-*` features.
//!
//! | Format | Feature Flag |
//! |--------|--------------|
//! | MP3 | `decoder-mp3` |
//! | FLAC | `decoder-flac` |
//! | Ogg Vorbis | `decoder-vorbis` |
//! | AAC (MP4) | `decoder-aac` |
//! | WAV / PCM | `decoder-wav` |
//! | ALAC (MP4) | `decoder-alac` |

mod format_detector;
mod sample_converter;
mod session;

pub use format_detector::FormatDetector;
pub use sample_converter::{NormalizedSample, SampleConverter};
pub use session::SymphoniaSession;

use crate::backend::Backend;
use crate::config::DecoderConfig;
use crate::session::DecodeSession;
use std::path::Path;

/// Name under which the in-process backend is selectable.
pub const SYMPHONIA_BACKEND_NAME: &str = "symphonia";

/// Ranks below the libav backend, whose format coverage is broader.
pub const SYMPHONIA_BACKEND_PRIORITY: i32 = 5;

/// Backend producing [`SymphoniaSession`]s.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaBackend {
    config: DecoderConfig,
}

impl SymphoniaBackend {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }
}

impl Backend for SymphoniaBackend {
    fn name(&self) -> &str {
        SYMPHONIA_BACKEND_NAME
    }

    fn priority(&self) -> i32 {
        SYMPHONIA_BACKEND_PRIORITY
    }

    fn is_available(&self) -> bool {
        true
    }

    fn make_session(&self, path: &Path) -> Option<Box<dyn DecodeSession>> {
        Some(Box::new(SymphoniaSession::new(path, self.config.clone())))
    }
}
