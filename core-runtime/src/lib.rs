//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the decoding crates:
//! - Logging and tracing setup
//! - Runtime error type
//!
//! ## Overview
//!
//! Library crates in this workspace only emit `tracing` events. Binaries,
//! demos and tests call [`logging::init_logging`] once to install a
//! subscriber.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
