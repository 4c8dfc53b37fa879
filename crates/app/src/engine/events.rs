use wakevox_foundation::{OpenError, ReadError};

/// Events from the capture worker to the coordination task. The worker
/// never mutates engine state directly; this stream is its only outlet.
#[derive(Debug)]
pub enum CaptureEvent {
    /// Device grant and recognizer are live; frames are flowing.
    Started,
    /// A finalized utterance from the recognizer.
    Candidate(String),
    /// The worker terminated. Its resources are already released by the
    /// time this is delivered.
    Fault(FaultReason),
}

#[derive(Debug)]
pub enum FaultReason {
    Open(OpenError),
    Read(ReadError),
    Recognizer(String),
    /// Permanent-until-upgrade: short-circuits all further restarts.
    UnsupportedBackend(String),
    /// Could not spawn the worker thread at all.
    Spawn(std::io::Error),
    /// The worker panicked; caught at the thread boundary.
    WorkerPanic,
}

/// Outbound trigger for the external assistant-session launcher. No
/// payload: the launcher owns everything after the handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotwordFired;

/// Terminal, user-visible failures. Surfaced once per failure episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalFailure {
    /// Capture retries exhausted; the microphone stayed unavailable.
    MicUnavailable,
    /// The native recognizer backend cannot run on this device until an
    /// app update.
    BackendUnsupported,
}
