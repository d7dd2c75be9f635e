//! Built-in backends.

pub mod none;

#[cfg(feature = "backend-libav")]
pub mod libav;

#[cfg(feature = "backend-symphonia")]
pub mod symphonia;
