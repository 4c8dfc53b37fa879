use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::info;

use wakevox_foundation::StateManager;
use wakevox_stt::{UnsupportedFlagSink, WakeWordSet};
use wakevox_telemetry::EngineMetrics;

use crate::engine::{
    build_engine, CaptureSessionBuilder, CoordinationHandle, EngineConfig, EngineSetup,
    HotwordFired, TerminalFailure,
};

/// External microphone-permission check. The engine never opens a device
/// without this passing; a denial is a precondition failure reported
/// upward, not something to retry.
pub trait PermissionGate: Send + Sync {
    fn microphone_granted(&self) -> bool;
}

/// Gate for platforms where permission is implicit (desktop).
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn microphone_granted(&self) -> bool {
        true
    }
}

/// Injected collaborators for [`start`].
pub struct EngineDeps {
    pub builder: Arc<dyn CaptureSessionBuilder>,
    pub flag_sink: Arc<dyn UnsupportedFlagSink>,
    pub permission: Arc<dyn PermissionGate>,
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error("microphone permission not granted")]
    PermissionDenied,

    #[error("invalid engine configuration: {0}")]
    Config(String),
}

/// Handle to the running engine.
pub struct EngineHandle {
    /// Pause/resume surface for the external conversational loop.
    pub control: CoordinationHandle,
    /// Fires once per detected wake phrase. `Option` so callers can move
    /// the receiver into their launcher task.
    pub hotword_rx: Option<mpsc::Receiver<HotwordFired>>,
    /// Terminal failures, once per episode.
    pub failure_rx: Option<mpsc::Receiver<TerminalFailure>>,
    pub state: Arc<StateManager>,
    pub metrics: EngineMetrics,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Gracefully stop the engine and wait for the capture session to be
    /// released.
    pub async fn shutdown(self) {
        info!("shutting down hotword engine...");
        self.shutdown.notify_one();
        let _ = self.task.await;
        info!("hotword engine shutdown complete");
    }
}

/// Start the hotword engine. The model must already be provisioned and
/// loaded into the session builder; this checks preconditions, spawns
/// the coordination task, and begins listening.
pub async fn start(config: EngineConfig, deps: EngineDeps) -> Result<EngineHandle, StartError> {
    if WakeWordSet::from_phrases(&config.wake_phrases).is_empty() {
        return Err(StartError::Config(
            "at least one wake phrase is required".to_string(),
        ));
    }
    if !deps.permission.microphone_granted() {
        return Err(StartError::PermissionDenied);
    }

    let (engine, hooks) = build_engine(EngineSetup {
        config,
        builder: deps.builder,
        flag_sink: deps.flag_sink,
    });

    let task = tokio::spawn(engine.run());

    Ok(EngineHandle {
        control: hooks.control,
        hotword_rx: Some(hooks.hotword_rx),
        failure_rx: Some(hooks.failure_rx),
        state: hooks.state,
        metrics: hooks.metrics,
        shutdown: hooks.shutdown,
        task,
    })
}
