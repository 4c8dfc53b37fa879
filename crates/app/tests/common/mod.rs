//! Recording doubles and helpers shared by the engine scenario tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use wakevox_app::engine::{CaptureSessionBuilder, EngineConfig};
use wakevox_app::runtime::{AlwaysGranted, EngineDeps, PermissionGate};
use wakevox_audio::{CaptureConfig, CaptureSource};
use wakevox_foundation::{EngineState, OpenError, ReadError, StateManager};
use wakevox_stt::{
    HotwordRecognizer, RecognitionEvent, RecognizerError, UnsupportedFlagSink, WakeWordSet,
};

/// Shared, ordered log of teardown calls.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: &str) {
        self.0.lock().unwrap().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub type FrameEvent = Result<Option<RecognitionEvent>, RecognizerError>;

/// One scripted step of a running session.
pub enum ScriptStep {
    /// The source yields a frame; the recognizer answers with this.
    Emit(FrameEvent),
    /// The source fails mid-read.
    ReadFail(ReadError),
}

/// Plan for one capture session, consumed in order by the builder.
pub enum SessionPlan {
    OpenFail(OpenError),
    RecognizerFail(RecognizerError),
    /// Scripted steps; once exhausted the source reads empty forever.
    Run(Vec<ScriptStep>),
}

pub fn final_event(text: &str) -> ScriptStep {
    ScriptStep::Emit(Ok(Some(RecognitionEvent::Final(text.to_string()))))
}

pub fn idle_session() -> SessionPlan {
    SessionPlan::Run(Vec::new())
}

#[derive(Default)]
pub struct Counters {
    pub open_calls: AtomicUsize,
    /// Currently-open sources and the high-water mark; the single-owner
    /// invariant says the mark never exceeds one.
    pub open_now: AtomicUsize,
    pub open_max: AtomicUsize,
}

enum RecognizerPlan {
    Fail(RecognizerError),
    Events(VecDeque<FrameEvent>),
}

pub struct MockBuilder {
    plans: Mutex<VecDeque<SessionPlan>>,
    pending_recognizer: Mutex<Option<RecognizerPlan>>,
    fail_when_exhausted: bool,
    pub log: CallLog,
    pub counters: Arc<Counters>,
}

impl MockBuilder {
    pub fn new(plans: Vec<SessionPlan>) -> Arc<Self> {
        Self::build(plans, false)
    }

    /// Once the plans run out, every further open fails. For exhaustion
    /// scenarios.
    pub fn failing_when_exhausted(plans: Vec<SessionPlan>) -> Arc<Self> {
        Self::build(plans, true)
    }

    fn build(plans: Vec<SessionPlan>, fail_when_exhausted: bool) -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(plans.into()),
            pending_recognizer: Mutex::new(None),
            fail_when_exhausted,
            log: CallLog::default(),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn open_calls(&self) -> usize {
        self.counters.open_calls.load(Ordering::SeqCst)
    }
}

impl CaptureSessionBuilder for MockBuilder {
    fn open_source(&self) -> Result<Box<dyn CaptureSource>, OpenError> {
        self.counters.open_calls.fetch_add(1, Ordering::SeqCst);
        let plan = self.plans.lock().unwrap().pop_front().unwrap_or_else(|| {
            if self.fail_when_exhausted {
                SessionPlan::OpenFail(OpenError::AllSourcesFailed)
            } else {
                idle_session()
            }
        });

        let (steps, recognizer) = match plan {
            SessionPlan::OpenFail(e) => return Err(e),
            SessionPlan::RecognizerFail(e) => (VecDeque::new(), RecognizerPlan::Fail(e)),
            SessionPlan::Run(script) => {
                let mut steps = VecDeque::new();
                let mut events = VecDeque::new();
                for step in script {
                    match step {
                        ScriptStep::Emit(event) => {
                            steps.push_back(SourceStep::Frame);
                            events.push_back(event);
                        }
                        ScriptStep::ReadFail(e) => steps.push_back(SourceStep::Fail(e)),
                    }
                }
                (steps, RecognizerPlan::Events(events))
            }
        };

        *self.pending_recognizer.lock().unwrap() = Some(recognizer);
        let now = self.counters.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.open_max.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(MockSource {
            steps,
            closed: false,
            log: self.log.clone(),
            counters: Arc::clone(&self.counters),
        }))
    }

    fn build_recognizer(
        &self,
        _wake_words: &WakeWordSet,
        _sample_rate: u32,
    ) -> Result<Box<dyn HotwordRecognizer>, RecognizerError> {
        match self.pending_recognizer.lock().unwrap().take() {
            Some(RecognizerPlan::Fail(e)) => Err(e),
            Some(RecognizerPlan::Events(events)) => Ok(Box::new(MockRecognizer {
                events,
                log: self.log.clone(),
            })),
            None => Ok(Box::new(MockRecognizer {
                events: VecDeque::new(),
                log: self.log.clone(),
            })),
        }
    }
}

enum SourceStep {
    Frame,
    Fail(ReadError),
}

struct MockSource {
    steps: VecDeque<SourceStep>,
    closed: bool,
    log: CallLog,
    counters: Arc<Counters>,
}

impl CaptureSource for MockSource {
    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn frame_samples(&self) -> usize {
        160
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, ReadError> {
        match self.steps.pop_front() {
            None => Ok(0),
            Some(SourceStep::Frame) => Ok(buf.len().min(160).max(1)),
            Some(SourceStep::Fail(e)) => Err(e),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.push("source.close");
            self.counters.open_now.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        self.close();
    }
}

struct MockRecognizer {
    events: VecDeque<FrameEvent>,
    log: CallLog,
}

impl HotwordRecognizer for MockRecognizer {
    fn accept_frame(&mut self, _pcm: &[i16]) -> FrameEvent {
        self.events.pop_front().unwrap_or(Ok(None))
    }

    fn finalize(&mut self) -> Option<String> {
        None
    }

    fn close(&mut self) {
        self.log.push("recognizer.close");
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub marks: AtomicUsize,
}

impl UnsupportedFlagSink for RecordingSink {
    fn mark_unsupported(&self) {
        self.marks.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct DeniedGate;

impl PermissionGate for DeniedGate {
    fn microphone_granted(&self) -> bool {
        false
    }
}

/// Tight timings so scenarios run in milliseconds.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        wake_phrases: vec!["assistant".to_string()],
        capture: CaptureConfig::default(),
        max_retries: 5,
        retry_base_delay: Duration::from_millis(20),
        retry_max_delay: Duration::from_millis(80),
        handoff_timeout: Duration::from_millis(150),
        stop_timeout: Duration::from_millis(500),
    }
}

pub fn deps(builder: Arc<MockBuilder>, sink: Arc<RecordingSink>) -> EngineDeps {
    EngineDeps {
        builder,
        flag_sink: sink,
        permission: Arc::new(AlwaysGranted),
    }
}

/// Wait until at least `n` capture sessions have reached the ready
/// state. `Listening` is entered optimistically before the worker opens
/// the device, so session counts are the reliable signal.
pub async fn wait_for_sessions(metrics: &wakevox_telemetry::EngineMetrics, n: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if wakevox_telemetry::EngineMetrics::get(&metrics.sessions_started) >= n {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "timed out waiting for {} sessions; saw {}",
                n,
                wakevox_telemetry::EngineMetrics::get(&metrics.sessions_started)
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_for_state(state: &StateManager, target: EngineState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if state.current() == target {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "timed out waiting for {:?}; still {:?}",
                target,
                state.current()
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Long enough for queued events and worker teardown to drain.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}

pub async fn recv_within<T>(rx: &mut mpsc::Receiver<T>, ms: u64) -> T {
    tokio::time::timeout(Duration::from_millis(ms), rx.recv())
        .await
        .expect("timed out waiting for a signal")
        .expect("signal channel closed")
}
