//! Vosk-backed session assembly: provisioning, the one-per-process model
//! handle, and the builder that pairs microphone grants with
//! grammar-restricted recognizers.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use wakevox_audio::{CaptureConfig, CaptureSource, MicSource};
use wakevox_foundation::OpenError;
use wakevox_stt::{
    HotwordRecognizer, JsonFileStore, ModelProvisioner, ProvisionError, RecognizerError,
    UnsupportedFlagSink, WakeWordSet,
};
use wakevox_stt_vosk::{load_model, Model, VoskHotword};

use crate::engine::CaptureSessionBuilder;

/// Filesystem layout for model provisioning.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    /// Packaged, read-only model tree shipped with the app.
    pub assets_dir: PathBuf,
    /// Writable per-install copy the recognizer loads from.
    pub target_dir: PathBuf,
    /// Provision record location.
    pub state_file: PathBuf,
}

#[derive(Error, Debug)]
pub enum StackError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
}

impl StackError {
    /// True when the condition persists until an app update; callers use
    /// this to disable the feature's surface rather than retry.
    pub fn is_unsupported_backend(&self) -> bool {
        matches!(
            self,
            StackError::Provision(ProvisionError::UnsupportedBackend { .. })
                | StackError::Recognizer(RecognizerError::UnsupportedBackend(_))
        )
    }
}

/// Provisions the model, loads it once, and yields the capture-session
/// builder plus the flag sink the engine persists unsupported-backend
/// conditions through.
pub fn build_vosk_stack(
    paths: &ModelPaths,
    capture: CaptureConfig,
    app_version: u32,
) -> Result<(Arc<MicSessionBuilder>, Arc<dyn UnsupportedFlagSink>), StackError> {
    let provisioner = Arc::new(ModelProvisioner::new(
        JsonFileStore::new(&paths.state_file),
        &paths.assets_dir,
        &paths.target_dir,
        app_version,
    ));

    let model_path = provisioner.ensure_model()?;

    // Loading is the expensive step and happens exactly once; an
    // unsupported refusal here is persisted so the next launch fails
    // fast until the app is updated.
    let model = match load_model(&model_path) {
        Ok(model) => model,
        Err(e @ RecognizerError::UnsupportedBackend(_)) => {
            provisioner.mark_unsupported();
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let builder = Arc::new(MicSessionBuilder { model, capture });
    let flag_sink: Arc<dyn UnsupportedFlagSink> = provisioner;
    Ok((builder, flag_sink))
}

/// Pairs one microphone grant with one grammar-restricted recognizer per
/// capture session. The model handle is shared and read-only.
pub struct MicSessionBuilder {
    model: Arc<Model>,
    capture: CaptureConfig,
}

impl CaptureSessionBuilder for MicSessionBuilder {
    fn open_source(&self) -> Result<Box<dyn CaptureSource>, OpenError> {
        Ok(Box::new(MicSource::open(&self.capture)?))
    }

    fn build_recognizer(
        &self,
        wake_words: &WakeWordSet,
        sample_rate: u32,
    ) -> Result<Box<dyn HotwordRecognizer>, RecognizerError> {
        Ok(Box::new(VoskHotword::new(
            &self.model,
            sample_rate,
            wake_words,
        )?))
    }
}
