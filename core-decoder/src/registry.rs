//! # Backend Registry
//!
//! Holds every compiled-in or host-supplied backend and answers "which
//! backend should decode this file".
//!
//! ## Ordering
//!
//! Backends are registered once through [`BackendRegistryBuilder`]. Selection
//! order is priority descending; ties keep registration order.
//!
//! ## Availability
//!
//! `is_available()` can be expensive (the libav backend loads shared
//! libraries on first call), so each entry asks at most once and keeps the
//! answer. The memo is a `OnceLock`, so concurrent first callers block on a
//! single check and then all read the same value.
//!
//! ## Fallback
//!
//! [`BackendRegistry::select`] never fails: when no registered backend is
//! usable it returns the [`NullBackend`].

use crate::backend::Backend;
use crate::backends::none::{NullBackend, NULL_BACKEND_NAME};
use crate::config::DecoderConfig;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

struct RegisteredBackend {
    backend: Arc<dyn Backend>,
    available: OnceLock<bool>,
}

impl RegisteredBackend {
    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let available = self.backend.is_available();
            if available {
                info!(backend = self.backend.name(), "Decoder backend available");
            } else {
                debug!(backend = self.backend.name(), "Decoder backend unavailable");
            }
            available
        })
    }
}

/// Builder assembling the backend list at startup.
#[derive(Default)]
pub struct BackendRegistryBuilder {
    backends: Vec<Arc<dyn Backend>>,
}

impl BackendRegistryBuilder {
    /// Append a backend.
    pub fn register(mut self, backend: impl Backend + 'static) -> Self {
        self.backends.push(Arc::new(backend));
        self
    }

    /// Append an already shared backend.
    pub fn register_arc(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Freeze the list into a registry.
    pub fn build(self) -> BackendRegistry {
        let mut backends = self.backends;
        // Stable sort keeps registration order among equal priorities.
        backends.sort_by(|a, b| b.priority().cmp(&a.priority()));

        for backend in &backends {
            if backend.name() == NULL_BACKEND_NAME {
                warn!("A registered backend shadows the reserved name 'none'");
            }
        }

        BackendRegistry {
            entries: backends
                .into_iter()
                .map(|backend| RegisteredBackend {
                    backend,
                    available: OnceLock::new(),
                })
                .collect(),
            fallback: Arc::new(NullBackend::new()),
        }
    }
}

/// Priority-ordered set of decoder backends.
pub struct BackendRegistry {
    entries: Vec<RegisteredBackend>,
    fallback: Arc<dyn Backend>,
}

impl BackendRegistry {
    pub fn builder() -> BackendRegistryBuilder {
        BackendRegistryBuilder::default()
    }

    /// Registry with the backends compiled into this crate.
    ///
    /// The dynamically-loaded libav backend goes first so hosts with FFmpeg
    /// installed get its broader format coverage; the in-process Symphonia
    /// backend follows.
    #[allow(unused_mut)]
    pub fn with_default_backends(config: &DecoderConfig) -> Self {
        let mut builder = Self::builder();

        #[cfg(feature = "backend-libav")]
        {
            builder =
                builder.register(crate::backends::libav::LibavBackend::new(config.clone()));
        }

        #[cfg(feature = "backend-symphonia")]
        {
            builder = builder.register(crate::backends::symphonia::SymphoniaBackend::new(
                config.clone(),
            ));
        }

        let _ = config;
        builder.build()
    }

    /// First available backend in selection order, or the null backend.
    pub fn select(&self) -> Arc<dyn Backend> {
        self.entries
            .iter()
            .find(|entry| entry.is_available())
            .map(|entry| Arc::clone(&entry.backend))
            .unwrap_or_else(|| {
                warn!("No decoder backend available, falling back to '{}'", NULL_BACKEND_NAME);
                Arc::clone(&self.fallback)
            })
    }

    /// The named backend, if registered and available.
    ///
    /// `"none"` always resolves to the null backend.
    pub fn select_by_name(&self, name: &str) -> Option<Arc<dyn Backend>> {
        if let Some(entry) = self.entries.iter().find(|e| e.backend.name() == name) {
            return entry
                .is_available()
                .then(|| Arc::clone(&entry.backend));
        }

        (name == NULL_BACKEND_NAME).then(|| Arc::clone(&self.fallback))
    }

    /// Every available backend in selection order.
    pub fn candidates(&self) -> Vec<Arc<dyn Backend>> {
        self.entries
            .iter()
            .filter(|entry| entry.is_available())
            .map(|entry| Arc::clone(&entry.backend))
            .collect()
    }

    /// Names of the available backends in selection order.
    pub fn available_backends(&self) -> Vec<String> {
        self.candidates()
            .iter()
            .map(|backend| backend.name().to_string())
            .collect()
    }

    /// Names of all registered backends in selection order.
    pub fn registered_backends(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.backend.name().to_string())
            .collect()
    }

    /// The always-available fallback.
    pub fn null_backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.fallback)
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.registered_backends())
            .finish()
    }
}
