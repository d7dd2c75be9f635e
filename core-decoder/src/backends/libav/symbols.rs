//! # Dynamic Symbol Table
//!
//! Loads the four FFmpeg libraries at runtime and binds every function the
//! libav session calls. Nothing is linked at build time, so hosts without
//! FFmpeg simply see the backend as unavailable.
//!
//! ## Protocol
//!
//! 1. For each library, in the order `avutil`, `avcodec`, `avformat`,
//!    `swresample`, try the platform file names for every whitelisted major
//!    version (oldest first), then one unversioned name.
//! 2. The first library that fails under every name makes the whole table
//!    unavailable; the remaining libraries are not attempted.
//! 3. Every required symbol must resolve.
//! 4. The four runtime majors must form a known [`Release`].
//!
//! [`LibavApi::get`] runs this once per process. Concurrent first callers
//! block on the same initialization and observe the same outcome; the
//! published table is immutable.

use super::ffi::*;
use super::releases::{LibraryVersions, Release};
use crate::error::{DecoderError, Result};
use libloading::Library;
use std::ffi::{c_char, c_int, c_uint, c_void};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, info, trace, warn};

/// One of the shared libraries the backend needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryKind {
    AvUtil,
    AvCodec,
    AvFormat,
    SwResample,
}

impl LibraryKind {
    /// Load order; `avutil` first since the others depend on it.
    pub const LOAD_ORDER: [LibraryKind; 4] = [
        LibraryKind::AvUtil,
        LibraryKind::AvCodec,
        LibraryKind::AvFormat,
        LibraryKind::SwResample,
    ];

    pub fn base_name(self) -> &'static str {
        match self {
            LibraryKind::AvUtil => "avutil",
            LibraryKind::AvCodec => "avcodec",
            LibraryKind::AvFormat => "avformat",
            LibraryKind::SwResample => "swresample",
        }
    }

    /// ABI majors this build is known to work with, oldest first.
    pub fn supported_majors(self) -> &'static [u32] {
        match self {
            LibraryKind::AvUtil => &[56, 57, 58, 59],
            LibraryKind::AvCodec => &[58, 59, 60, 61],
            LibraryKind::AvFormat => &[58, 59, 60, 61],
            LibraryKind::SwResample => &[3, 4, 5],
        }
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_name())
    }
}

/// Shared-library naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `lib<name>.so.<major>`, Linux and the BSDs.
    Unix,
    /// `lib<name>.<major>.dylib`
    MacOs,
    /// `<name>-<major>.dll`
    Windows,
}

impl Platform {
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(any(target_os = "macos", target_os = "ios")) {
            Platform::MacOs
        } else {
            Platform::Unix
        }
    }
}

/// File names to try for `kind`, in order.
pub fn candidate_names(kind: LibraryKind, platform: Platform) -> Vec<String> {
    let name = kind.base_name();
    let mut names: Vec<String> = kind
        .supported_majors()
        .iter()
        .map(|major| match platform {
            Platform::Unix => format!("lib{}.so.{}", name, major),
            Platform::MacOs => format!("lib{}.{}.dylib", name, major),
            Platform::Windows => format!("{}-{}.dll", name, major),
        })
        .collect();

    names.push(match platform {
        Platform::Unix => format!("lib{}.so", name),
        Platform::MacOs => format!("lib{}.dylib", name),
        Platform::Windows => format!("{}.dll", name),
    });

    names
}

/// Something that can open a shared library by file name.
pub trait LibraryOpener {
    type Handle;

    fn open(&mut self, name: &str) -> Option<Self::Handle>;
}

/// Opens libraries through the platform loader.
#[derive(Debug, Default)]
pub struct SystemOpener;

impl LibraryOpener for SystemOpener {
    type Handle = Library;

    fn open(&mut self, name: &str) -> Option<Library> {
        // SAFETY: FFmpeg's initializers have no preconditions.
        match unsafe { Library::new(name) } {
            Ok(library) => Some(library),
            Err(e) => {
                trace!("Could not load {}: {}", name, e);
                None
            }
        }
    }
}

/// One handle per library.
#[derive(Debug)]
pub struct LibrarySet<H> {
    pub avutil: H,
    pub avcodec: H,
    pub avformat: H,
    pub swresample: H,
}

impl<H> LibrarySet<H> {
    pub fn get(&self, kind: LibraryKind) -> &H {
        match kind {
            LibraryKind::AvUtil => &self.avutil,
            LibraryKind::AvCodec => &self.avcodec,
            LibraryKind::AvFormat => &self.avformat,
            LibraryKind::SwResample => &self.swresample,
        }
    }
}

fn load_one<O: LibraryOpener>(
    opener: &mut O,
    kind: LibraryKind,
    platform: Platform,
) -> Result<O::Handle> {
    let names = candidate_names(kind, platform);
    for name in &names {
        if let Some(handle) = opener.open(name) {
            debug!(library = %kind, file = %name, "Loaded shared library");
            return Ok(handle);
        }
    }

    Err(DecoderError::LibraryUnavailable(format!(
        "{} (tried {})",
        kind,
        names.join(", ")
    )))
}

/// Load all four libraries, stopping at the first one that fails.
pub fn load_libraries<O: LibraryOpener>(
    opener: &mut O,
    platform: Platform,
) -> Result<LibrarySet<O::Handle>> {
    let avutil = load_one(opener, LibraryKind::AvUtil, platform)?;
    let avcodec = load_one(opener, LibraryKind::AvCodec, platform)?;
    let avformat = load_one(opener, LibraryKind::AvFormat, platform)?;
    let swresample = load_one(opener, LibraryKind::SwResample, platform)?;

    Ok(LibrarySet {
        avutil,
        avcodec,
        avformat,
        swresample,
    })
}

/// Declares the function table, its binder and the list of required symbols
/// from one list so the three can never disagree.
macro_rules! libav_functions {
    ($(
        $kind:ident {
            $( fn $name:ident ( $( $arg:ty ),* ) $( -> $ret:ty )? ; )*
        }
    )*) => {
        /// Resolved libav entry points.
        #[derive(Clone, Copy)]
        pub struct LibavFunctions {
            $($( pub $name: unsafe extern "C" fn( $( $arg ),* ) $( -> $ret )?, )*)*
        }

        /// Every symbol the backend binds, with its owning library.
        pub const REQUIRED_SYMBOLS: &[(LibraryKind, &str)] = &[
            $($( (LibraryKind::$kind, stringify!($name)), )*)*
        ];

        impl LibavFunctions {
            /// # Safety
            ///
            /// The libraries must export these symbols with the declared
            /// signatures, and must outlive the returned table.
            unsafe fn bind(libraries: &LibrarySet<Library>) -> Result<Self> {
                Ok(Self {
                    $($( $name: bind_symbol(libraries.get(LibraryKind::$kind), LibraryKind::$kind, stringify!($name))?, )*)*
                })
            }
        }
    };
}

libav_functions! {
    AvUtil {
        fn avutil_version() -> c_uint;
        fn av_log_set_level(c_int);
        fn av_log_set_callback(Option<LogCallback>);
        fn av_log_format_line2(*mut c_void, c_int, *const c_char, VaList, *mut c_char, c_int, *mut c_int) -> c_int;
        fn av_frame_alloc() -> *mut AVFrame;
        fn av_frame_free(*mut *mut AVFrame);
        fn av_frame_unref(*mut AVFrame);
        fn av_opt_get_int(*mut c_void, *const c_char, c_int, *mut i64) -> c_int;
        fn av_opt_get_sample_fmt(*mut c_void, *const c_char, c_int, *mut c_int) -> c_int;
        fn av_opt_get(*mut c_void, *const c_char, c_int, *mut *mut u8) -> c_int;
        fn av_opt_set(*mut c_void, *const c_char, *const c_char, c_int) -> c_int;
        fn av_opt_set_int(*mut c_void, *const c_char, i64, c_int) -> c_int;
        fn av_opt_set_sample_fmt(*mut c_void, *const c_char, c_int, c_int) -> c_int;
        fn av_free(*mut c_void);
    }
    AvCodec {
        fn avcodec_version() -> c_uint;
        fn avcodec_alloc_context3(*const AVCodec) -> *mut AVCodecContext;
        fn avcodec_parameters_to_context(*mut AVCodecContext, *const AVCodecParameters) -> c_int;
        fn avcodec_open2(*mut AVCodecContext, *const AVCodec, *mut *mut c_void) -> c_int;
        fn avcodec_free_context(*mut *mut AVCodecContext);
        fn avcodec_send_packet(*mut AVCodecContext, *const AVPacket) -> c_int;
        fn avcodec_receive_frame(*mut AVCodecContext, *mut AVFrame) -> c_int;
        fn avcodec_flush_buffers(*mut AVCodecContext);
        fn av_packet_alloc() -> *mut AVPacket;
        fn av_packet_free(*mut *mut AVPacket);
        fn av_packet_unref(*mut AVPacket);
    }
    AvFormat {
        fn avformat_version() -> c_uint;
        fn avformat_open_input(*mut *mut AVFormatContext, *const c_char, *const c_void, *mut *mut c_void) -> c_int;
        fn avformat_find_stream_info(*mut AVFormatContext, *mut *mut c_void) -> c_int;
        fn av_find_best_stream(*mut AVFormatContext, c_int, c_int, c_int, *mut *const AVCodec, c_int) -> c_int;
        fn av_read_frame(*mut AVFormatContext, *mut AVPacket) -> c_int;
        fn av_seek_frame(*mut AVFormatContext, c_int, i64, c_int) -> c_int;
        fn avformat_close_input(*mut *mut AVFormatContext);
    }
    SwResample {
        fn swresample_version() -> c_uint;
        fn swr_alloc() -> *mut SwrContext;
        fn swr_init(*mut SwrContext) -> c_int;
        fn swr_free(*mut *mut SwrContext);
        fn swr_convert(*mut SwrContext, *mut *mut u8, c_int, *const *const u8, c_int) -> c_int;
    }
}

/// # Safety
///
/// `T` must be the function pointer type the symbol was exported with.
unsafe fn bind_symbol<T: Copy>(library: &Library, kind: LibraryKind, name: &str) -> Result<T> {
    library
        .get::<T>(name.as_bytes())
        .map(|symbol| *symbol)
        .map_err(|_| DecoderError::SymbolMissing {
            library: kind.to_string(),
            symbol: name.to_string(),
        })
}

/// First required symbol that `has_symbol` reports missing.
pub fn first_missing_symbol(
    mut has_symbol: impl FnMut(LibraryKind, &str) -> bool,
) -> Option<(LibraryKind, &'static str)> {
    REQUIRED_SYMBOLS
        .iter()
        .copied()
        .find(|&(kind, name)| !has_symbol(kind, name))
}

/// The process-wide libav binding.
pub struct LibavApi {
    functions: LibavFunctions,
    versions: LibraryVersions,
    release: &'static Release,
    // Keeps the function pointers valid; never unloaded.
    _libraries: LibrarySet<Library>,
}

impl LibavApi {
    /// The table, loading it on first call.
    pub fn get() -> std::result::Result<&'static LibavApi, &'static DecoderError> {
        static API: OnceLock<Result<LibavApi>> = OnceLock::new();
        API.get_or_init(|| {
            let result = Self::load();
            match &result {
                Ok(api) => info!(
                    release = api.release.name,
                    versions = %api.versions,
                    "Loaded libav"
                ),
                Err(e) => debug!("libav unavailable: {}", e),
            }
            result
        })
        .as_ref()
    }

    fn load() -> Result<Self> {
        if !cfg!(target_pointer_width = "64") {
            return Err(DecoderError::IncompatibleRelease(
                "struct offsets are only known for 64-bit targets".to_string(),
            ));
        }

        let libraries = load_libraries(&mut SystemOpener, Platform::current())?;

        if let Some((kind, name)) = first_missing_symbol(|kind, name| {
            // SAFETY: only the address is looked up, nothing is called.
            unsafe { libraries.get(kind).get::<*const c_void>(name.as_bytes()).is_ok() }
        }) {
            return Err(DecoderError::SymbolMissing {
                library: kind.to_string(),
                symbol: name.to_string(),
            });
        }

        // SAFETY: signatures match the FFmpeg headers for every whitelisted
        // major, and the libraries are stored next to the table.
        let functions = unsafe { LibavFunctions::bind(&libraries)? };

        // SAFETY: the version functions take no arguments and cannot fail.
        let versions = unsafe {
            LibraryVersions {
                avutil: (functions.avutil_version)(),
                avcodec: (functions.avcodec_version)(),
                avformat: (functions.avformat_version)(),
                swresample: (functions.swresample_version)(),
            }
        };

        let release = versions.release().ok_or_else(|| {
            warn!("Unsupported libav combination: {}", versions);
            DecoderError::IncompatibleRelease(versions.to_string())
        })?;

        super::log::install(&functions);

        Ok(Self {
            functions,
            versions,
            release,
            _libraries: libraries,
        })
    }

    pub fn functions(&self) -> &LibavFunctions {
        &self.functions
    }

    pub fn release(&self) -> &'static Release {
        self.release
    }

    pub fn versions(&self) -> LibraryVersions {
        self.versions
    }

    /// Set libav's global log threshold. Lines at or below it are
    /// forwarded to `tracing` at trace level.
    pub fn set_log_level(&self, level: c_int) {
        super::log::set_threshold(level);
        // SAFETY: plain integer setter.
        unsafe { (self.functions.av_log_set_level)(level) }
    }
}
