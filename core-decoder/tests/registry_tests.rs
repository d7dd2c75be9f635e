//! Backend selection and the decode entry point over host-registered backends.
//!
//! The backends here produce synthetic sessions, so every test is independent
//! of the codecs and shared libraries present on the host.

use core_decoder::{
    decode_session, Backend, BackendRegistry, DecodeSession, DecoderConfig, DecoderError,
    ExcerptDecoder, Result, TARGET_SAMPLE_RATE,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Synthetic session
// ============================================================================

/// Session over an in-memory ramp at the target rate: sample `i` is `i`.
struct RampSession {
    duration: f32,
    position: usize,
    fail_open: bool,
    opened: bool,
}

impl RampSession {
    fn new(duration: f32) -> Self {
        Self {
            duration,
            position: 0,
            fail_open: false,
            opened: false,
        }
    }

    fn total(&self) -> usize {
        (self.duration * TARGET_SAMPLE_RATE as f32) as usize
    }
}

impl DecodeSession for RampSession {
    fn open(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(DecoderError::UnsupportedFormat("synthetic".to_string()));
        }
        self.opened = true;
        self.position = 0;
        Ok(())
    }

    fn duration(&self) -> f32 {
        if self.opened {
            self.duration
        } else {
            0.0
        }
    }

    fn seek(&mut self, position: f32) -> Result<()> {
        if !self.opened {
            return Err(DecoderError::NotOpen);
        }
        self.position = ((position * TARGET_SAMPLE_RATE as f32) as usize).min(self.total());
        Ok(())
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        if !self.opened {
            return 0;
        }
        let n = buffer.len().min(self.total() - self.position);
        for (offset, slot) in buffer[..n].iter_mut().enumerate() {
            *slot = (self.position + offset) as f32;
        }
        self.position += n;
        n
    }
}

struct RampBackend {
    name: &'static str,
    priority: i32,
    available: bool,
    fail_open: bool,
    duration: f32,
    sessions: AtomicUsize,
}

impl RampBackend {
    fn new(name: &'static str, priority: i32) -> Self {
        Self {
            name,
            priority,
            available: true,
            fail_open: false,
            duration: 10.0,
            sessions: AtomicUsize::new(0),
        }
    }

    fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    fn failing(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

impl Backend for RampBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn make_session(&self, _path: &Path) -> Option<Box<dyn DecodeSession>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        let mut session = RampSession::new(self.duration);
        session.fail_open = self.fail_open;
        Some(Box::new(session))
    }
}

fn decoder_over(backends: Vec<Arc<RampBackend>>, config: DecoderConfig) -> ExcerptDecoder {
    let mut builder = BackendRegistry::builder();
    for backend in backends {
        builder = builder.register_arc(backend);
    }
    ExcerptDecoder::with_registry(Arc::new(builder.build()), config)
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_highest_available_priority_selected() {
    let registry = BackendRegistry::builder()
        .register(RampBackend::new("low", 1))
        .register(RampBackend::new("high", 50).unavailable())
        .register(RampBackend::new("mid", 20))
        .build();

    assert_eq!(registry.select().name(), "mid");
    assert_eq!(registry.available_backends(), vec!["mid", "low"]);
}

#[test]
fn test_null_backend_when_nothing_usable() {
    let registry = BackendRegistry::builder()
        .register(RampBackend::new("gone", 5).unavailable())
        .build();

    let selected = registry.select();
    assert_eq!(selected.name(), "none");
    assert!(selected.make_session(Path::new("/tmp/a.wav")).is_none());
}

#[test]
fn test_default_registry_lists_compiled_backends() {
    let registry = BackendRegistry::with_default_backends(&DecoderConfig::default());
    let names = registry.registered_backends();

    #[cfg(feature = "backend-libav")]
    assert!(names.iter().any(|n| n == "libav"));
    #[cfg(feature = "backend-symphonia")]
    assert!(names.iter().any(|n| n == "symphonia"));

    // Always usable, whatever the host has installed.
    assert!(registry.select_by_name("none").is_some());
}

// ============================================================================
// Entry point
// ============================================================================

#[test]
fn test_decode_resolves_window_and_reads() {
    let backend = Arc::new(RampBackend::new("ramp", 1));
    let decoder = decoder_over(vec![backend.clone()], DecoderConfig::default());

    let samples = decoder.decode("/music/a.wav", 0.5, 2.0);
    assert_eq!(samples.len(), 11025);
    assert_eq!(samples[0], 44100.0);
    assert_eq!(backend.sessions.load(Ordering::SeqCst), 1);
}

#[test]
fn test_decode_falls_back_after_open_failure() {
    let broken = Arc::new(RampBackend::new("broken", 10).failing());
    let working = Arc::new(RampBackend::new("working", 1));
    let decoder = decoder_over(vec![broken.clone(), working.clone()], DecoderConfig::default());

    let samples = decoder.decode("/music/a.wav", 1.0, 0.0);
    assert_eq!(samples.len(), 22050);
    assert_eq!(broken.sessions.load(Ordering::SeqCst), 1);
    assert_eq!(working.sessions.load(Ordering::SeqCst), 1);
}

#[test]
fn test_decode_without_fallback_gives_up() {
    let broken = Arc::new(RampBackend::new("broken", 10).failing());
    let working = Arc::new(RampBackend::new("working", 1));
    let config = DecoderConfig::default().with_fallback(false);
    let decoder = decoder_over(vec![broken, working.clone()], config);

    assert!(decoder.decode("/music/a.wav", 1.0, 0.0).is_empty());
    assert_eq!(working.sessions.load(Ordering::SeqCst), 0);
}

#[test]
fn test_preferred_backend_tried_first() {
    let high = Arc::new(RampBackend::new("high", 10));
    let low = Arc::new(RampBackend::new("low", 1));
    let config = DecoderConfig::default().with_preferred_backend("low");
    let decoder = decoder_over(vec![high.clone(), low.clone()], config);

    assert_eq!(decoder.decode("/music/a.wav", 1.0, 0.0).len(), 22050);
    assert_eq!(low.sessions.load(Ordering::SeqCst), 1);
    assert_eq!(high.sessions.load(Ordering::SeqCst), 0);
}

#[test]
fn test_decode_with_only_null_backend_is_empty() {
    let decoder = decoder_over(Vec::new(), DecoderConfig::default());
    assert!(decoder.decode("/music/a.wav", 1.0, 0.0).is_empty());
}

#[test]
fn test_concurrent_decodes_share_one_decoder() {
    let backend = Arc::new(RampBackend::new("ramp", 1));
    let decoder = Arc::new(decoder_over(vec![backend.clone()], DecoderConfig::default()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let decoder = Arc::clone(&decoder);
            std::thread::spawn(move || decoder.decode("/music/a.wav", 0.25, i as f32).len())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 5513);
    }
    assert_eq!(backend.sessions.load(Ordering::SeqCst), 4);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[test]
fn test_decode_session_short_read_at_end() {
    // 0.1s file: the whole-file window is only partly covered by the ramp
    // because the sample count rounds up.
    let mut session = RampSession::new(0.1);
    let samples = decode_session(&mut session, 0.0, 0.0).unwrap();
    assert_eq!(samples.len(), session.total());
    assert_eq!(samples.last().copied(), Some((session.total() - 1) as f32));
}

#[test]
fn test_decode_session_propagates_open_failure() {
    let mut session = RampSession::new(1.0);
    session.fail_open = true;
    assert!(matches!(
        decode_session(&mut session, 1.0, 0.0),
        Err(DecoderError::UnsupportedFormat(_))
    ));
}
