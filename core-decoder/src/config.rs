//! # Decoder Configuration
//!
//! Configuration for backend selection and the decode loops.

use crate::error::{DecoderError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output sample rate of every backend, in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 22050;

/// Output channel count of every backend.
pub const TARGET_CHANNELS: u16 = 1;

/// Decoder configuration.
///
/// Controls which backend is tried first and how tolerant the decode loops
/// are to corrupt input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Backend to try before the priority order (e.g. `"libav"`).
    ///
    /// Ignored when the named backend is unknown or unavailable.
    ///
    /// Default: none.
    #[serde(default)]
    pub preferred_backend: Option<String>,

    /// Whether a failed `open()` falls through to the next available backend.
    ///
    /// Default: true.
    #[serde(default = "default_fallback_on_open_failure")]
    pub fallback_on_open_failure: bool,

    /// Consecutive corrupt packets tolerated before a read is aborted.
    ///
    /// Default: 10.
    #[serde(default = "default_max_consecutive_decode_errors")]
    pub max_consecutive_decode_errors: usize,

    /// Input block size fed to the in-process resampler, in source frames.
    ///
    /// Default: 1024 frames.
    #[serde(default = "default_resampler_chunk_frames")]
    pub resampler_chunk_frames: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            preferred_backend: None,
            fallback_on_open_failure: default_fallback_on_open_failure(),
            max_consecutive_decode_errors: default_max_consecutive_decode_errors(),
            resampler_chunk_frames: default_resampler_chunk_frames(),
        }
    }
}

impl DecoderConfig {
    /// Prefer the named backend over the priority order.
    pub fn with_preferred_backend(mut self, name: impl Into<String>) -> Self {
        self.preferred_backend = Some(name.into());
        self
    }

    /// Enable or disable falling through to the next backend on open failure.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_on_open_failure = enabled;
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DecoderError::InvalidConfig(format!("Malformed JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.max_consecutive_decode_errors == 0 {
            return Err(DecoderError::InvalidConfig(
                "max_consecutive_decode_errors must be > 0".to_string(),
            ));
        }

        if self.resampler_chunk_frames < 64 {
            return Err(DecoderError::InvalidConfig(
                "resampler_chunk_frames must be >= 64".to_string(),
            ));
        }

        if let Some(name) = &self.preferred_backend {
            if name.trim().is_empty() {
                return Err(DecoderError::InvalidConfig(
                    "preferred_backend must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_fallback_on_open_failure() -> bool {
    true
}

fn default_max_consecutive_decode_errors() -> usize {
    10
}

fn default_resampler_chunk_frames() -> usize {
    1024
}
