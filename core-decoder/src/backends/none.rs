//! Backend that never decodes.
//!
//! Selected when nothing else is usable, or explicitly by hosts that hand raw
//! PCM to the analysis pipeline themselves.

use crate::backend::Backend;
use crate::session::DecodeSession;
use std::path::Path;
use tracing::trace;

/// Name under which the null backend is selectable.
pub const NULL_BACKEND_NAME: &str = "none";

/// Placeholder backend; always available, never produces a session.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        trace!("Created null decoder backend");
        Self
    }
}

impl Backend for NullBackend {
    fn name(&self) -> &str {
        NULL_BACKEND_NAME
    }

    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn is_available(&self) -> bool {
        true
    }

    fn make_session(&self, _path: &Path) -> Option<Box<dyn DecodeSession>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_backend_never_decodes() {
        let backend = NullBackend::new();
        assert_eq!(backend.name(), "none");
        assert!(backend.is_available());
        assert!(backend.make_session(Path::new("/music/song.mp3")).is_none());
    }
}
