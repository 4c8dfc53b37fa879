use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use wakevox_foundation::{EngineState, StateManager};
use wakevox_stt::{UnsupportedFlagSink, WakeWordSet};
use wakevox_telemetry::EngineMetrics;

use super::capture_loop::{CaptureLoop, CaptureLoopHandle, CaptureSessionBuilder};
use super::config::EngineConfig;
use super::coordination::{coordination_channel, CoordinationHandle, ListenerControl};
use super::events::{CaptureEvent, FaultReason, HotwordFired, TerminalFailure};
use super::retry::{RetryDecision, RetryScheduler};
use super::watchdog::Watchdog;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const CONTROL_CHANNEL_CAPACITY: usize = 16;
const SIGNAL_CHANNEL_CAPACITY: usize = 8;

/// Everything the engine needs injected.
pub struct EngineSetup {
    pub config: EngineConfig,
    pub builder: Arc<dyn CaptureSessionBuilder>,
    pub flag_sink: Arc<dyn UnsupportedFlagSink>,
}

/// The caller-facing ends of the engine's channels.
pub struct EngineHooks {
    /// Handle for the external conversational loop.
    pub control: CoordinationHandle,
    /// Fires once per detected wake phrase.
    pub hotword_rx: mpsc::Receiver<HotwordFired>,
    /// Terminal failures, once per episode.
    pub failure_rx: mpsc::Receiver<TerminalFailure>,
    pub state: Arc<StateManager>,
    pub metrics: EngineMetrics,
    /// Request engine-task shutdown.
    pub shutdown: Arc<Notify>,
}

/// The orchestrator. Owns `EngineState` exclusively; every other
/// component reads state or requests transitions through events. Runs as
/// one coordination task that never blocks: device work lives on the
/// capture worker, timers are select branches.
pub struct HotwordEngine {
    config: EngineConfig,
    builder: Arc<dyn CaptureSessionBuilder>,
    flag_sink: Arc<dyn UnsupportedFlagSink>,
    state: Arc<StateManager>,
    metrics: EngineMetrics,

    events_tx: mpsc::Sender<CaptureEvent>,
    events_rx: mpsc::Receiver<CaptureEvent>,
    control_rx: mpsc::Receiver<ListenerControl>,
    hotword_tx: mpsc::Sender<HotwordFired>,
    failure_tx: mpsc::Sender<TerminalFailure>,
    shutdown: Arc<Notify>,

    capture: Option<CaptureLoopHandle>,
    wake_words: WakeWordSet,
    retry: RetryScheduler,
    retry_deadline: Option<Instant>,
    watchdog: Watchdog,
    /// Latched when the backend proved unsupported; no restart will be
    /// attempted for the rest of the process.
    backend_dead: bool,
    /// Keeps each failure episode from being surfaced more than once.
    failure_reported: bool,
}

pub fn build_engine(setup: EngineSetup) -> (HotwordEngine, EngineHooks) {
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (control, control_rx) = coordination_channel(CONTROL_CHANNEL_CAPACITY);
    let (hotword_tx, hotword_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
    let (failure_tx, failure_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
    let state = Arc::new(StateManager::new());
    let metrics = EngineMetrics::default();
    let shutdown = Arc::new(Notify::new());

    let engine = HotwordEngine {
        retry: RetryScheduler::new(
            setup.config.retry_base_delay,
            setup.config.retry_max_delay,
            setup.config.max_retries,
        ),
        watchdog: Watchdog::new(setup.config.handoff_timeout),
        wake_words: WakeWordSet::from_phrases(&setup.config.wake_phrases),
        config: setup.config,
        builder: setup.builder,
        flag_sink: setup.flag_sink,
        state: Arc::clone(&state),
        metrics: metrics.clone(),
        events_tx,
        events_rx,
        control_rx,
        hotword_tx,
        failure_tx,
        shutdown: Arc::clone(&shutdown),
        capture: None,
        retry_deadline: None,
        backend_dead: false,
        failure_reported: false,
    };

    let hooks = EngineHooks {
        control,
        hotword_rx,
        failure_rx,
        state,
        metrics,
        shutdown,
    };

    (engine, hooks)
}

impl HotwordEngine {
    /// Run until shutdown. The model is already provisioned and loaded by
    /// the time this task starts, so the first act is to begin listening.
    pub async fn run(mut self) {
        info!(
            phrases = ?self.wake_words.phrases(),
            "hotword engine starting"
        );
        self.start_listening().await;

        loop {
            let retry_at = self.retry_deadline;
            tokio::select! {
                Some(msg) = self.control_rx.recv() => {
                    self.handle_control(msg).await;
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_capture_event(event).await;
                }
                _ = self.watchdog.expired(), if self.watchdog.is_armed() => {
                    self.handle_watchdog_fire().await;
                }
                _ = tokio::time::sleep_until(retry_at.unwrap_or_else(far_off)), if retry_at.is_some() => {
                    self.retry_deadline = None;
                    self.handle_retry_fire().await;
                }
                _ = self.shutdown.notified() => {
                    break;
                }
            }
        }

        self.stop_capture().await;
        info!("hotword engine stopped");
    }

    async fn handle_control(&mut self, msg: ListenerControl) {
        match msg {
            ListenerControl::Pause => self.handle_pause().await,
            ListenerControl::Resume => self.handle_resume().await,
        }
    }

    async fn handle_pause(&mut self) {
        match self.state.current() {
            // The handoff already means this engine is not holding the
            // microphone; absorb without effect.
            EngineState::CommandHandoff => debug!("pause during handoff absorbed"),
            EngineState::PausedExternal => debug!("duplicate pause ignored"),
            _ => {
                info!("external pause: releasing the microphone");
                self.stop_capture().await;
                self.retry_deadline = None;
                self.transition(EngineState::PausedExternal);
            }
        }
    }

    async fn handle_resume(&mut self) {
        match self.state.current() {
            EngineState::Listening => debug!("duplicate resume ignored"),
            EngineState::RecoveringError => {
                // A retry is already scheduled; resuming must not reset
                // or hasten it.
                debug!("resume ignored while recovering");
            }
            EngineState::CommandHandoff => {
                info!("foreground session resumed the listener");
                self.watchdog.disarm();
                self.start_listening().await;
            }
            EngineState::PausedExternal => {
                info!("external resume: reclaiming the microphone");
                self.start_listening().await;
            }
            EngineState::Idle => {
                if self.backend_dead {
                    warn!("resume ignored: recognizer backend unsupported on this device");
                } else {
                    info!("resume from idle: restarting the listener");
                    self.start_listening().await;
                }
            }
        }
    }

    async fn handle_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Started => {
                self.retry.record_success();
                self.failure_reported = false;
            }
            CaptureEvent::Candidate(text) => self.handle_candidate(text).await,
            CaptureEvent::Fault(reason) => self.handle_fault(reason).await,
        }
    }

    async fn handle_candidate(&mut self, text: String) {
        // Candidates arriving after a handoff or pause are queued stragglers
        // from a loop that is already stopping; never re-trigger on them.
        if self.state.current() != EngineState::Listening {
            debug!(%text, "candidate ignored outside listening");
            return;
        }

        let matched = self.wake_words.matches(&text).map(str::to_string);
        let Some(phrase) = matched else {
            debug!(%text, "candidate did not match any wake phrase");
            return;
        };

        info!(%text, %phrase, "wake phrase detected; handing off");
        self.stop_capture().await;
        self.transition(EngineState::CommandHandoff);
        self.watchdog.arm();
        EngineMetrics::incr(&self.metrics.hotwords_fired);
        if self.hotword_tx.try_send(HotwordFired).is_err() {
            // The launcher is gone or backed up; the watchdog will bring
            // the listener back.
            warn!("hotword signal not delivered");
        }
    }

    async fn handle_fault(&mut self, reason: FaultReason) {
        if self.state.current() != EngineState::Listening {
            debug!(?reason, "stale capture fault ignored");
            return;
        }

        match reason {
            FaultReason::UnsupportedBackend(msg) => {
                error!(%msg, "recognizer backend unsupported; disabling until app update");
                self.flag_sink.mark_unsupported();
                self.backend_dead = true;
                self.stop_capture().await;
                self.transition(EngineState::RecoveringError);
                self.transition(EngineState::Idle);
                self.report_failure(TerminalFailure::BackendUnsupported);
            }
            reason => {
                warn!(?reason, "capture fault");
                self.stop_capture().await;
                self.transition(EngineState::RecoveringError);
                match self.retry.record_failure() {
                    RetryDecision::Backoff(delay) => {
                        info!(?delay, attempt = self.retry.attempt(), "retrying capture");
                        EngineMetrics::incr(&self.metrics.retries_scheduled);
                        self.retry_deadline = Some(Instant::now() + delay);
                    }
                    RetryDecision::GiveUp => {
                        error!("capture retries exhausted; microphone unavailable");
                        self.transition(EngineState::Idle);
                        self.report_failure(TerminalFailure::MicUnavailable);
                    }
                }
            }
        }
    }

    async fn handle_retry_fire(&mut self) {
        if self.state.current() == EngineState::RecoveringError {
            self.start_listening().await;
        }
    }

    async fn handle_watchdog_fire(&mut self) {
        self.watchdog.disarm();
        if self.state.current() == EngineState::CommandHandoff {
            warn!("foreground session never resumed; forcing the listener back");
            EngineMetrics::incr(&self.metrics.watchdog_fires);
            self.start_listening().await;
        }
    }

    /// Every path into `Listening` goes through here, and it always stops
    /// any live session first — the structural guarantee that two capture
    /// sessions never coexist.
    async fn start_listening(&mut self) {
        self.stop_capture().await;

        if self.backend_dead {
            return;
        }

        // Configuration changes take effect here, not mid-session.
        self.wake_words = WakeWordSet::from_phrases(&self.config.wake_phrases);

        match CaptureLoop::spawn(
            Arc::clone(&self.builder),
            self.wake_words.clone(),
            self.events_tx.clone(),
            self.metrics.clone(),
            self.config.stop_timeout,
        ) {
            Ok(handle) => {
                self.capture = Some(handle);
                self.transition(EngineState::Listening);
            }
            Err(e) => {
                error!("failed to spawn capture worker: {}", e);
                self.transition(EngineState::Listening);
                self.handle_fault(FaultReason::Spawn(e)).await;
            }
        }
    }

    /// Fully releases the current capture session before returning, so
    /// the next queued transition observes a free microphone.
    async fn stop_capture(&mut self) {
        if let Some(handle) = self.capture.take() {
            handle.stop().await;
        }
    }

    fn transition(&self, to: EngineState) {
        if let Err(e) = self.state.transition(to) {
            error!("{}", e);
        }
    }

    fn report_failure(&mut self, failure: TerminalFailure) {
        if self.failure_reported {
            return;
        }
        self.failure_reported = true;
        if self.failure_tx.try_send(failure).is_err() {
            warn!(?failure, "terminal failure signal not delivered");
        }
    }
}

fn far_off() -> Instant {
    Instant::now() + Duration::from_secs(3600)
}
