//! # libav Backend
//!
//! Decodes through FFmpeg's libavformat, libavcodec and libswresample,
//! loaded at runtime. Hosts without a supported FFmpeg release report the
//! backend unavailable and selection moves on.
//!
//! - [`symbols`]: library discovery and the bound function table
//! - [`releases`]: supported releases and their ABI differences
//! - [`session`]: the decode loop
//! - [`log`]: libav log lines forwarded to `tracing`

pub mod ffi;
pub mod log;
pub mod releases;
pub mod session;
pub mod symbols;

pub use releases::{ChannelApi, LibraryVersions, Release, StreamLayout, RELEASES};
pub use session::LibavSession;
pub use symbols::{LibavApi, LibraryKind};

use crate::backend::Backend;
use crate::config::DecoderConfig;
use crate::session::DecodeSession;
use std::path::Path;
use tracing::Level;

/// Name under which the libav backend is selectable.
pub const LIBAV_BACKEND_NAME: &str = "libav";

pub const LIBAV_BACKEND_PRIORITY: i32 = 10;

/// Backend producing [`LibavSession`]s.
#[derive(Debug, Clone, Default)]
pub struct LibavBackend {
    config: DecoderConfig,
}

impl LibavBackend {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }
}

impl Backend for LibavBackend {
    fn name(&self) -> &str {
        LIBAV_BACKEND_NAME
    }

    fn priority(&self) -> i32 {
        LIBAV_BACKEND_PRIORITY
    }

    fn is_available(&self) -> bool {
        LibavApi::get().is_ok()
    }

    fn make_session(&self, path: &Path) -> Option<Box<dyn DecodeSession>> {
        let api = LibavApi::get().ok()?;

        // libav's own logging is forwarded only when tracing is at its most verbose.
        if tracing::enabled!(Level::TRACE) {
            api.set_log_level(ffi::AV_LOG_VERBOSE);
        } else {
            api.set_log_level(ffi::AV_LOG_PANIC);
        }

        Some(Box::new(LibavSession::new(api, path, self.config.clone())))
    }
}
