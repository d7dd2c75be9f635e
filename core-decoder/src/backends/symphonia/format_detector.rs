//! # Format Detection
//!
//! Probe hints and codec checks for the in-process backend.

use crate::error::{DecoderError, Result};
use std::path::Path;
use symphonia::core::codecs::{CodecType, CODEC_TYPE_NULL};
use symphonia::core::probe::Hint;
use tracing::debug;

/// Helpers that steer Symphonia's probe and validate what it found.
pub struct FormatDetector;

impl FormatDetector {
    /// Create a probe hint from the file extension.
    ///
    /// Files without an extension are probed by content alone.
    pub fn hint_from_path(path: &Path) -> Hint {
        let mut hint = Hint::new();

        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            debug!("Setting probe hint extension: {}", extension);
            hint.with_extension(extension);
        } else {
            debug!("No file extension found, probe will auto-detect");
        }

        hint
    }

    /// Short codec name for logs, e.g. `"mp3"`.
    pub fn codec_name(codec: CodecType) -> &'static str {
        symphonia::default::get_codecs()
            .get_codec(codec)
            .map(|descriptor| descriptor.short_name)
            .unwrap_or("unknown")
    }

    /// Check that a decoder for `codec` is compiled in.
    ///
    /// The set of codecs depends on the `decoder-*` features.
    pub fn validate_codec_support(codec: CodecType) -> Result<()> {
        if codec == CODEC_TYPE_NULL {
            return Err(DecoderError::UnsupportedCodec(
                "Track declares no codec".to_string(),
            ));
        }

        if symphonia::default::get_codecs().get_codec(codec).is_none() {
            return Err(DecoderError::UnsupportedCodec(format!(
                "No decoder enabled for codec {:?}",
                codec
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_from_path_without_extension() {
        // Hint is opaque; building one must not panic either way.
        let _ = FormatDetector::hint_from_path(Path::new("/music/track"));
        let _ = FormatDetector::hint_from_path(Path::new("/music/song.flac"));
    }

    #[test]
    fn test_null_codec_rejected() {
        assert!(matches!(
            FormatDetector::validate_codec_support(CODEC_TYPE_NULL),
            Err(DecoderError::UnsupportedCodec(_))
        ));
    }

    #[cfg(feature = "decoder-wav")]
    #[test]
    fn test_pcm_supported_with_wav_feature() {
        use symphonia::core::codecs::CODEC_TYPE_PCM_S16LE;

        assert!(FormatDetector::validate_codec_support(CODEC_TYPE_PCM_S16LE).is_ok());
        assert_ne!(FormatDetector::codec_name(CODEC_TYPE_PCM_S16LE), "unknown");
    }
}
