//! # Decode Entry Point
//!
//! Composes backend selection, the session lifecycle and window resolution
//! into the single call the analysis pipeline uses:
//!
//! ```text
//! select backend -> open -> resolve window -> seek(start) -> read(ceil(len * 22050)) -> trim
//! ```
//!
//! Failures never escape as panics or errors. An empty vector means nothing
//! could be decoded; a shorter one means decoding stopped early.

use crate::backend::Backend;
use crate::config::DecoderConfig;
use crate::error::Result;
use crate::excerpt::ExcerptWindow;
use crate::registry::BackendRegistry;
use crate::session::DecodeSession;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, instrument, warn};

/// Excerpt decoder bound to a backend registry.
///
/// Cheap to share across threads; every call creates its own session.
#[derive(Debug, Clone)]
pub struct ExcerptDecoder {
    registry: Arc<BackendRegistry>,
    config: DecoderConfig,
}

impl ExcerptDecoder {
    /// Decoder over the compiled-in backends.
    pub fn new(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        let registry = BackendRegistry::with_default_backends(&config);
        Ok(Self {
            registry: Arc::new(registry),
            config,
        })
    }

    /// Decoder over a host-assembled registry.
    pub fn with_registry(registry: Arc<BackendRegistry>, config: DecoderConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode `excerpt_length` seconds of `path` starting at `excerpt_start`.
    ///
    /// The request is resolved against the file's duration (see
    /// [`ExcerptWindow::resolve`]): a non-positive length selects the whole
    /// file and a negative start is an offset toward the center.
    ///
    /// Returns mono f32 samples at 22050 Hz, never more than the window
    /// holds. Returns an empty vector when no backend could decode the file.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn decode(&self, path: impl AsRef<Path>, excerpt_length: f32, excerpt_start: f32) -> Vec<f32> {
        let path = path.as_ref();

        for backend in self.backend_order() {
            let Some(mut session) = backend.make_session(path) else {
                debug!(backend = backend.name(), "Backend does not produce sessions");
                continue;
            };

            match decode_session(session.as_mut(), excerpt_length, excerpt_start) {
                Ok(samples) if samples.is_empty() => {
                    error!(backend = backend.name(), "No samples decoded");
                    return samples;
                }
                Ok(samples) => {
                    info!(
                        backend = backend.name(),
                        samples = samples.len(),
                        "Decoded excerpt"
                    );
                    return samples;
                }
                Err(e) => {
                    warn!(backend = backend.name(), "Failed to open file: {}", e);
                }
            }
        }

        error!("No decoder backend could open the file");
        Vec::new()
    }

    /// Backends to try, in order.
    fn backend_order(&self) -> Vec<Arc<dyn Backend>> {
        let mut order = Vec::new();

        if let Some(name) = &self.config.preferred_backend {
            match self.registry.select_by_name(name) {
                Some(backend) => order.push(backend),
                None => warn!(backend = %name, "Preferred backend unavailable, using priority order"),
            }
        }

        for backend in self.registry.candidates() {
            if !order.iter().any(|b| b.name() == backend.name()) {
                order.push(backend);
            }
        }

        if !self.config.fallback_on_open_failure {
            order.truncate(1);
        }

        if order.is_empty() {
            order.push(self.registry.select());
        }

        order
    }
}

impl Default for ExcerptDecoder {
    fn default() -> Self {
        let config = DecoderConfig::default();
        Self {
            registry: Arc::new(BackendRegistry::with_default_backends(&config)),
            config,
        }
    }
}

/// Run the session lifecycle for one excerpt.
///
/// Errors only when `open()` fails. A failed seek is logged and decoding
/// continues from wherever the cursor is.
pub fn decode_session(
    session: &mut dyn DecodeSession,
    excerpt_length: f32,
    excerpt_start: f32,
) -> Result<Vec<f32>> {
    session.open()?;

    let duration = session.duration();
    let window = ExcerptWindow::resolve(duration, excerpt_start, excerpt_length);
    debug!(
        duration,
        start = window.start,
        length = window.length,
        "Resolved excerpt window"
    );

    if let Err(e) = session.seek(window.start) {
        warn!("Seek to {:.3}s failed, decoding from current position: {}", window.start, e);
    }

    let mut samples = vec![0.0f32; window.sample_count()];
    let produced = session.read(&mut samples);
    if produced < samples.len() {
        debug!(requested = samples.len(), produced, "Short read");
    }
    samples.truncate(produced);

    Ok(samples)
}

/// Decode an excerpt with the process-wide default decoder.
///
/// The default decoder and its backends are initialized on first use.
pub fn decode(path: impl AsRef<Path>, excerpt_length: f32, excerpt_start: f32) -> Vec<f32> {
    static DEFAULT: OnceLock<ExcerptDecoder> = OnceLock::new();
    DEFAULT
        .get_or_init(ExcerptDecoder::default)
        .decode(path, excerpt_length, excerpt_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecoderError;
    use crate::session::MockDecodeSession;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    fn open_session(duration: f32) -> MockDecodeSession {
        let mut session = MockDecodeSession::new();
        session.expect_open().times(1).returning(|| Ok(()));
        session.expect_duration().return_const(duration);
        session
    }

    #[test]
    fn test_reads_resolved_window() {
        let mut session = open_session(100.0);
        session
            .expect_seek()
            .with(eq(40.0f32))
            .times(1)
            .returning(|_| Ok(()));
        session.expect_read().times(1).returning(|buffer| {
            assert_eq!(buffer.len(), 20 * 22050);
            buffer.fill(0.25);
            buffer.len()
        });

        let samples = decode_session(&mut session, 20.0, -40.0).unwrap();
        assert_eq!(samples.len(), 441_000);
        assert!(samples.iter().all(|&s| s == 0.25));
    }

    #[test]
    fn test_short_read_is_trimmed_not_padded() {
        let mut session = open_session(30.0);
        session.expect_seek().with(eq(20.0f32)).returning(|_| Ok(()));
        session.expect_read().returning(|buffer| {
            buffer[..1000].fill(-0.5);
            1000
        });

        let samples = decode_session(&mut session, 10.0, 25.0).unwrap();
        assert_eq!(samples, vec![-0.5; 1000]);
    }

    #[test]
    fn test_open_failure_skips_everything_else() {
        let mut session = MockDecodeSession::new();
        session
            .expect_open()
            .returning(|| Err(DecoderError::FileNotFound(PathBuf::from("/missing.mp3"))));
        session.expect_seek().never();
        session.expect_read().never();

        let result = decode_session(&mut session, 10.0, 0.0);
        assert!(matches!(result, Err(DecoderError::FileNotFound(_))));
    }

    #[test]
    fn test_seek_failure_still_reads() {
        let mut session = open_session(10.0);
        session
            .expect_seek()
            .returning(|_| Err(DecoderError::SeekFailed("not seekable".into())));
        session.expect_read().returning(|buffer| buffer.len());

        let samples = decode_session(&mut session, 1.0, 2.0).unwrap();
        assert_eq!(samples.len(), 22_050);
    }

    #[test]
    fn test_whole_file_when_length_not_positive() {
        let mut session = open_session(2.0);
        session.expect_seek().with(eq(0.0f32)).returning(|_| Ok(()));
        session.expect_read().returning(|buffer| {
            assert_eq!(buffer.len(), 44_100);
            buffer.len()
        });

        let samples = decode_session(&mut session, 0.0, 5.0).unwrap();
        assert_eq!(samples.len(), 44_100);
    }

    struct SessionBackend {
        name: &'static str,
        priority: i32,
        factory: Box<dyn Fn() -> MockDecodeSession + Send + Sync>,
    }

    impl Backend for SessionBackend {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn is_available(&self) -> bool {
            true
        }

        fn make_session(&self, _path: &Path) -> Option<Box<dyn DecodeSession>> {
            Some(Box::new((self.factory)()))
        }
    }

    fn failing_backend(name: &'static str, priority: i32) -> SessionBackend {
        SessionBackend {
            name,
            priority,
            factory: Box::new(|| {
                let mut session = MockDecodeSession::new();
                session
                    .expect_open()
                    .returning(|| Err(DecoderError::UnsupportedFormat("garbage".into())));
                session
            }),
        }
    }

    fn working_backend(name: &'static str, priority: i32, value: f32) -> SessionBackend {
        SessionBackend {
            name,
            priority,
            factory: Box::new(move || {
                let mut session = open_session(1.0);
                session.expect_seek().returning(|_| Ok(()));
                session.expect_read().returning(move |buffer| {
                    buffer.fill(value);
                    buffer.len()
                });
                session
            }),
        }
    }

    #[test]
    fn test_falls_through_to_next_backend_on_open_failure() {
        let registry = BackendRegistry::builder()
            .register(failing_backend("broken", 10))
            .register(working_backend("fine", 5, 0.1))
            .build();
        let decoder = ExcerptDecoder::with_registry(Arc::new(registry), DecoderConfig::default());

        let samples = decoder.decode("/music/song.ogg", 1.0, 0.0);
        assert_eq!(samples.len(), 22_050);
        assert_eq!(samples[0], 0.1);
    }

    #[test]
    fn test_no_fallback_when_disabled() {
        let registry = BackendRegistry::builder()
            .register(failing_backend("broken", 10))
            .register(working_backend("fine", 5, 0.1))
            .build();
        let config = DecoderConfig::default().with_fallback(false);
        let decoder = ExcerptDecoder::with_registry(Arc::new(registry), config);

        assert!(decoder.decode("/music/song.ogg", 1.0, 0.0).is_empty());
    }

    #[test]
    fn test_preferred_backend_goes_first() {
        let registry = BackendRegistry::builder()
            .register(working_backend("high", 10, 0.1))
            .register(working_backend("low", 1, 0.9))
            .build();
        let config = DecoderConfig::default().with_preferred_backend("low");
        let decoder = ExcerptDecoder::with_registry(Arc::new(registry), config);

        let samples = decoder.decode("/music/song.ogg", 1.0, 0.0);
        assert_eq!(samples[0], 0.9);
    }

    #[test]
    fn test_empty_registry_yields_empty_output() {
        let decoder = ExcerptDecoder::with_registry(
            Arc::new(BackendRegistry::builder().build()),
            DecoderConfig::default(),
        );
        assert!(decoder.decode("/music/song.ogg", 10.0, 0.0).is_empty());
    }
}
