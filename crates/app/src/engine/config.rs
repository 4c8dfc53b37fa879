use std::time::Duration;

use wakevox_audio::CaptureConfig;

/// Tuning for the hotword engine. Wake phrases are re-read at every
/// capture-session start; the timing knobs are fixed for the process.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Ordered wake phrases; matched by substring containment.
    pub wake_phrases: Vec<String>,
    pub capture: CaptureConfig,
    /// Capture-init failures tolerated before giving up.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// How long a foreground session may hold the handoff before the
    /// watchdog forces the listener back.
    pub handoff_timeout: Duration,
    /// Hard bound on cooperative capture-worker shutdown.
    pub stop_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wake_phrases: vec!["hey wakevox".to_string()],
            capture: CaptureConfig::default(),
            max_retries: 5,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(15),
            handoff_timeout: Duration::from_secs(30),
            stop_timeout: Duration::from_secs(2),
        }
    }
}
