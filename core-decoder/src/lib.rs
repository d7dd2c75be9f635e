//! # Excerpt Decoding Module
//!
//! Decodes a time window of an audio file into mono `f32` PCM at 22050 Hz,
//! the input format of the analysis pipeline.
//!
//! ## Overview
//!
//! This crate handles:
//! - Resolving a requested `(start, length)` window against the file duration
//! - Choosing a decoding backend at runtime by priority and availability
//! - Decoding through FFmpeg loaded at runtime (`backend-libav`)
//! - Decoding in-process with Symphonia and rubato (`backend-symphonia`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use core_decoder::{DecoderConfig, ExcerptDecoder};
//!
//! let decoder = ExcerptDecoder::new(DecoderConfig::default()).unwrap();
//! // 30 seconds from the middle of the track
//! let samples = decoder.decode("/music/song.flac", 30.0, -60.0);
//! println!("{} samples", samples.len());
//! ```
//!
//! Hosts with their own decoder implement [`Backend`] and assemble a
//! registry with [`BackendRegistry::builder`].

pub mod backend;
pub mod backends;
pub mod config;
pub mod decode;
pub mod error;
pub mod error_budget;
pub mod excerpt;
pub mod registry;
#[cfg(feature = "backend-symphonia")]
pub mod resample;
pub mod session;

pub use backend::Backend;
pub use backends::none::{NullBackend, NULL_BACKEND_NAME};
pub use config::{DecoderConfig, TARGET_CHANNELS, TARGET_SAMPLE_RATE};
pub use decode::{decode, decode_session, ExcerptDecoder};
pub use error::{DecoderError, Result};
pub use error_budget::ErrorBudget;
pub use excerpt::ExcerptWindow;
pub use registry::{BackendRegistry, BackendRegistryBuilder};
pub use session::DecodeSession;

#[cfg(feature = "backend-libav")]
pub use backends::libav::{LibavBackend, LIBAV_BACKEND_NAME};
#[cfg(feature = "backend-symphonia")]
pub use backends::symphonia::{SymphoniaBackend, SYMPHONIA_BACKEND_NAME};
