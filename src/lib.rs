//! Workspace facade crate.
//!
//! Re-exports the workspace crates so host applications can depend on
//! `excerpt-decode-workspace` alone and select backends through its feature
//! flags (`backend-libav`, `backend-symphonia`).

pub use core_decoder as decoder;
pub use core_runtime as runtime;

pub use core_decoder::{decode, DecoderConfig, DecoderError, ExcerptDecoder};
