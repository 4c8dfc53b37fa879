pub mod engine;
pub mod runtime;
#[cfg(feature = "vosk")]
pub mod stt;
