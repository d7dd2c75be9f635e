//! # Decoder Error Types
//!
//! Error taxonomy for opening, seeking and decoding audio files.
//!
//! Most of these never reach the caller of [`crate::decode`]: open failures
//! and library unavailability are consumed by the registry and the entry
//! point, which fall through to the next backend. They exist so backends can
//! report *why* something failed and the entry point can log it.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while decoding an excerpt.
#[derive(Error, Debug)]
pub enum DecoderError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// The file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The file exists but could not be opened or parsed by the backend.
    #[error("Could not open file for decoding: {0}")]
    Unopenable(String),

    // ========================================================================
    // Format/Codec Errors
    // ========================================================================
    /// Container format is not recognized.
    #[error("Unsupported or invalid container: {0}")]
    UnsupportedFormat(String),

    /// Codec is not supported by the backend.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    // ========================================================================
    // Dynamic Library Errors
    // ========================================================================
    /// A required shared library could not be loaded under any candidate name.
    #[error("Shared library unavailable: {0}")]
    LibraryUnavailable(String),

    /// A shared library loaded but lacks a required symbol.
    #[error("Symbol {symbol} missing from {library}")]
    SymbolMissing { library: String, symbol: String },

    /// The loaded library versions do not form a known release.
    #[error("Incompatible library release: {0}")]
    IncompatibleRelease(String),

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// Decoding stopped early but the data produced so far is valid.
    #[error("Decode stalled: {0}")]
    DecodeStall(String),

    /// Decoding failed mid-file; the session must not be reused.
    #[error("Fatal decode error: {0}")]
    FatalDecode(String),

    /// Repositioning the read cursor failed.
    #[error("Seek failed: {0}")]
    SeekFailed(String),

    /// Sample-rate conversion failed.
    #[error("Resampler error: {0}")]
    Resampler(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Configuration values are out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation that needs an open session was called before `open()`.
    #[error("Session is not open")]
    NotOpen,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecoderError {
    /// Returns `true` if this error means the file could not be opened by
    /// the backend, so another backend may still succeed.
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            DecoderError::FileNotFound(_)
                | DecoderError::Unopenable(_)
                | DecoderError::UnsupportedFormat(_)
                | DecoderError::UnsupportedCodec(_)
                | DecoderError::Io(_)
        )
    }

    /// Returns `true` if data decoded before the error is still usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DecoderError::DecodeStall(_) | DecoderError::SeekFailed(_)
        )
    }

    /// Returns `true` if this error comes from the dynamic library loader.
    pub fn is_library_error(&self) -> bool {
        matches!(
            self,
            DecoderError::LibraryUnavailable(_)
                | DecoderError::SymbolMissing { .. }
                | DecoderError::IncompatibleRelease(_)
        )
    }
}

/// Result type for decoder operations.
pub type Result<T> = std::result::Result<T, DecoderError>;
