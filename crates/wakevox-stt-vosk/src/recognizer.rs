use std::path::Path;
use std::sync::Arc;

use tracing::warn;
use vosk::{CompleteResult, DecodingState, Model, Recognizer};

use wakevox_stt::{HotwordRecognizer, RecognitionEvent, RecognizerError, WakeWordSet};

/// Load the recognition model once per process. The handle is shared
/// across capture-session restarts and only dropped at shutdown.
pub fn load_model(path: &Path) -> Result<Arc<Model>, RecognizerError> {
    if !path.is_dir() {
        return Err(RecognizerError::ModelLoad(format!(
            "model directory missing: {}",
            path.display()
        )));
    }
    // The assets are present, so a refusal here is the native backend
    // rejecting this device rather than a provisioning problem.
    match Model::new(path.to_string_lossy()) {
        Some(model) => Ok(Arc::new(model)),
        None => Err(RecognizerError::UnsupportedBackend(format!(
            "native recognizer refused model at {}",
            path.display()
        ))),
    }
}

/// One grammar-restricted Vosk recognizer, paired with one capture
/// session. The grammar is the wake-word set plus `[unk]`, so anything
/// off-grammar decodes to the unknown bucket instead of a false match.
pub struct VoskHotword {
    recognizer: Option<Recognizer>,
}

impl VoskHotword {
    pub fn new(
        model: &Model,
        sample_rate: u32,
        wake_words: &WakeWordSet,
    ) -> Result<Self, RecognizerError> {
        if sample_rate != 16_000 {
            warn!(
                sample_rate,
                "recognizer running off its 16kHz training rate; accuracy may degrade"
            );
        }

        let grammar = wake_words.grammar();
        let mut recognizer = Recognizer::new_with_grammar(model, sample_rate as f32, &grammar)
            .ok_or_else(|| {
                RecognizerError::UnsupportedBackend(
                    "native recognizer could not be constructed".to_string(),
                )
            })?;

        // The engine only needs the transcript text.
        recognizer.set_max_alternatives(0);
        recognizer.set_words(false);

        Ok(Self {
            recognizer: Some(recognizer),
        })
    }
}

impl HotwordRecognizer for VoskHotword {
    fn accept_frame(&mut self, pcm: &[i16]) -> Result<Option<RecognitionEvent>, RecognizerError> {
        let recognizer = self
            .recognizer
            .as_mut()
            .ok_or_else(|| RecognizerError::Decode("recognizer already closed".to_string()))?;

        let state = recognizer
            .accept_waveform(pcm)
            .map_err(|e| RecognizerError::Decode(format!("waveform rejected: {:?}", e)))?;

        match state {
            DecodingState::Finalized => Ok(flatten(recognizer.result()).map(RecognitionEvent::Final)),
            DecodingState::Running => {
                let partial = recognizer.partial_result().partial;
                Ok(non_empty(partial).map(RecognitionEvent::Partial))
            }
            DecodingState::Failed => Err(RecognizerError::Decode(
                "recognition failed for current chunk".to_string(),
            )),
        }
    }

    fn finalize(&mut self) -> Option<String> {
        self.recognizer
            .as_mut()
            .and_then(|recognizer| flatten(recognizer.final_result()))
    }

    fn close(&mut self) {
        // Dropping the recognizer frees the native resources.
        self.recognizer = None;
    }
}

fn flatten(result: CompleteResult) -> Option<String> {
    match result {
        CompleteResult::Single(single) => non_empty(single.text),
        CompleteResult::Multiple(multiple) => multiple
            .alternatives
            .first()
            .and_then(|alternative| non_empty(alternative.text)),
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
