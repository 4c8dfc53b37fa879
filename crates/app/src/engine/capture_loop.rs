use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use wakevox_audio::CaptureSource;
use wakevox_foundation::OpenError;
use wakevox_stt::{HotwordRecognizer, RecognitionEvent, RecognizerError, WakeWordSet};
use wakevox_telemetry::EngineMetrics;

use super::events::{CaptureEvent, FaultReason};

/// How long the worker naps when the ring is empty. Device reads are
/// bounded by this plus the platform's callback cadence.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Creates the two halves of a capture session. The builder is shared
/// with every worker; the sources and recognizers it hands out live and
/// die on that worker's thread.
pub trait CaptureSessionBuilder: Send + Sync {
    fn open_source(&self) -> Result<Box<dyn CaptureSource>, OpenError>;

    fn build_recognizer(
        &self,
        wake_words: &WakeWordSet,
        sample_rate: u32,
    ) -> Result<Box<dyn HotwordRecognizer>, RecognizerError>;
}

/// Owner handle for one running capture worker. At most one of these is
/// live at a time, enforced by the state machine always stopping before
/// starting.
pub struct CaptureLoopHandle {
    stop: Arc<AtomicBool>,
    done_rx: oneshot::Receiver<()>,
    stop_timeout: Duration,
}

impl CaptureLoopHandle {
    /// Cooperative shutdown: raise the stop flag, then wait for the
    /// worker to finish its own cleanup (device release, recognizer
    /// close). Bounded by `stop_timeout`; on expiry the worker is
    /// abandoned and the next session opens a fresh grant.
    pub async fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        match tokio::time::timeout(self.stop_timeout, self.done_rx).await {
            Ok(_) => debug!("capture worker stopped"),
            Err(_) => error!(
                timeout = ?self.stop_timeout,
                "capture worker did not stop in time; abandoning it"
            ),
        }
    }
}

pub struct CaptureLoop;

impl CaptureLoop {
    /// Spawn a capture session on a dedicated worker thread. All open
    /// and build work happens on the worker, so failures surface as
    /// [`CaptureEvent::Fault`] rather than blocking the caller.
    pub fn spawn(
        builder: Arc<dyn CaptureSessionBuilder>,
        wake_words: WakeWordSet,
        events: mpsc::Sender<CaptureEvent>,
        metrics: EngineMetrics,
        stop_timeout: Duration,
    ) -> std::io::Result<CaptureLoopHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let (done_tx, done_rx) = oneshot::channel();

        thread::Builder::new()
            .name("hotword-capture".to_string())
            .spawn(move || {
                run_session(&*builder, &wake_words, &events, &worker_stop, &metrics);
                let _ = done_tx.send(());
            })?;

        Ok(CaptureLoopHandle {
            stop,
            done_rx,
            stop_timeout,
        })
    }
}

fn run_session(
    builder: &dyn CaptureSessionBuilder,
    wake_words: &WakeWordSet,
    events: &mpsc::Sender<CaptureEvent>,
    stop: &AtomicBool,
    metrics: &EngineMetrics,
) {
    let mut source = match builder.open_source() {
        Ok(source) => source,
        Err(e) => {
            let _ = events.blocking_send(CaptureEvent::Fault(FaultReason::Open(e)));
            return;
        }
    };

    let sample_rate = source.sample_rate();
    let mut recognizer = match builder.build_recognizer(wake_words, sample_rate) {
        Ok(recognizer) => recognizer,
        Err(e) => {
            source.close();
            let reason = match e {
                RecognizerError::UnsupportedBackend(msg) => FaultReason::UnsupportedBackend(msg),
                other => FaultReason::Recognizer(other.to_string()),
            };
            let _ = events.blocking_send(CaptureEvent::Fault(reason));
            return;
        }
    };

    info!(sample_rate, phrases = wake_words.phrases().len(), "capture session live");
    EngineMetrics::incr(&metrics.sessions_started);
    let _ = events.blocking_send(CaptureEvent::Started);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        pump(source.as_mut(), recognizer.as_mut(), stop, events, metrics)
    }));

    // Cleanup on the worker's own thread, on every exit path: the device
    // grant is released before the recognizer goes away, so the
    // recognizer is never fed from a half-torn-down device.
    source.close();
    if let Some(tail) = recognizer.finalize() {
        debug!(%tail, "tail utterance discarded at stop");
    }
    recognizer.close();

    match outcome {
        Ok(Ok(())) => debug!("capture session ended cleanly"),
        Ok(Err(reason)) => {
            EngineMetrics::incr(&metrics.capture_faults);
            let _ = events.blocking_send(CaptureEvent::Fault(reason));
        }
        Err(_) => {
            EngineMetrics::incr(&metrics.capture_faults);
            let _ = events.blocking_send(CaptureEvent::Fault(FaultReason::WorkerPanic));
        }
    }
}

fn pump(
    source: &mut dyn CaptureSource,
    recognizer: &mut dyn HotwordRecognizer,
    stop: &AtomicBool,
    events: &mpsc::Sender<CaptureEvent>,
    metrics: &EngineMetrics,
) -> Result<(), FaultReason> {
    let mut frame = vec![0i16; source.frame_samples().max(1)];

    loop {
        if stop.load(Ordering::SeqCst) {
            return Ok(());
        }

        let n = source.read(&mut frame).map_err(FaultReason::Read)?;
        if n == 0 {
            thread::sleep(IDLE_POLL);
            continue;
        }
        EngineMetrics::incr(&metrics.frames_read);

        match recognizer.accept_frame(&frame[..n]) {
            Ok(Some(RecognitionEvent::Final(text))) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    continue;
                }
                EngineMetrics::incr(&metrics.candidates);
                if events
                    .blocking_send(CaptureEvent::Candidate(text))
                    .is_err()
                {
                    // Engine is gone; nothing left to report to.
                    return Ok(());
                }
            }
            Ok(_) => {}
            Err(RecognizerError::UnsupportedBackend(msg)) => {
                return Err(FaultReason::UnsupportedBackend(msg))
            }
            Err(e) => return Err(FaultReason::Recognizer(e.to_string())),
        }
    }
}
