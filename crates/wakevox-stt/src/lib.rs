pub mod provision;
pub mod types;

pub use provision::{
    version_code, JsonFileStore, ModelProvisioner, ProvisionError, ProvisionRecord,
    ProvisionStore, UnsupportedFlagSink,
};
pub use types::{RecognitionEvent, WakeWordSet};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecognizerError {
    /// The native recognizer backend refuses to run on this device.
    /// Permanent until an app update; never retried within a process.
    #[error("recognizer backend unsupported on this device: {0}")]
    UnsupportedBackend(String),

    #[error("failed to load recognition model: {0}")]
    ModelLoad(String),

    #[error("recognition failed: {0}")]
    Decode(String),
}

/// A loaded recognizer restricted to a wake-word grammar.
///
/// One instance per capture session; created and consumed on the capture
/// worker thread. Partial/final segmentation comes from the model's own
/// endpointing — no silence detection is layered on top.
pub trait HotwordRecognizer {
    /// Feed one frame of mono PCM16 at the session sample rate.
    fn accept_frame(&mut self, pcm: &[i16]) -> Result<Option<RecognitionEvent>, RecognizerError>;

    /// Flush and return whatever the current utterance decoded to.
    fn finalize(&mut self) -> Option<String>;

    /// Release native recognizer resources. Feeding after `close` is a
    /// programming error guarded by the capture loop's ownership.
    fn close(&mut self);
}
