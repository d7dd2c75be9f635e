//! # Backend Trait
//!
//! A backend is a named factory of [`DecodeSession`]s plus a predicate telling
//! whether it can work on this host right now.
//!
//! Backends are compiled in unconditionally but may be unusable at runtime
//! (missing shared library, missing OS framework). The registry keeps the
//! question "is it usable" separate from "which one do we prefer".
//!
//! Platform-specific collaborators implement this trait outside the crate and
//! hand their backend to [`BackendRegistryBuilder::register`](crate::BackendRegistryBuilder::register).

use crate::session::DecodeSession;
use std::path::Path;

/// Pluggable producer of decode sessions.
pub trait Backend: Send + Sync {
    /// Stable identifier, e.g. `"libav"`.
    fn name(&self) -> &str;

    /// Selection priority; higher wins, ties go to the earlier registration.
    fn priority(&self) -> i32;

    /// Whether the backend can decode on this host.
    ///
    /// May be expensive on first call (e.g. loads shared libraries). The
    /// registry memoizes the answer.
    fn is_available(&self) -> bool;

    /// Create an unopened session for `path`.
    ///
    /// Returns `None` when the backend never decodes (the null backend).
    fn make_session(&self, path: &Path) -> Option<Box<dyn DecodeSession>>;
}
