//! Vosk implementation of the WakeVox hotword recognizer.
//!
//! Gated behind the `vosk` feature because libvosk is a native library
//! that not every build environment carries.

#[cfg(feature = "vosk")]
mod recognizer;

#[cfg(feature = "vosk")]
pub use recognizer::{load_model, VoskHotword};

/// Re-exported so downstream crates can hold the shared model handle
/// without depending on the vosk crate directly.
#[cfg(feature = "vosk")]
pub use vosk::Model;
