use thiserror::Error;

/// Why a capture source could not be opened.
///
/// These are the only open-failure shapes the engine ever sees; platform
/// error types stay behind the audio crate boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// Buffer sizing was rejected by the platform. Device-wide: no
    /// individual source is attempted after this.
    #[error("capture buffer sizing rejected by the platform")]
    SizingFailed,

    /// Every candidate in the capture-source preference list failed to
    /// reach a ready state. Usually transient microphone contention.
    #[error("all capture source candidates failed to initialize")]
    AllSourcesFailed,
}

/// Read-side failures after a source was successfully opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("capture device disconnected")]
    Disconnected,

    #[error("capture source already closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),
}
