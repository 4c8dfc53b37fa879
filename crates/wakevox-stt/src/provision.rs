//! Model provisioning: copies the packaged recognition model into a
//! writable per-install location, keyed by app version, and remembers
//! when the native backend proved unsupported on this device.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Persisted provisioning state. One small record behind the injected
/// store; the engine never touches platform key-value storage directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRecord {
    /// App version the model tree was last copied for.
    pub model_version: Option<u32>,
    /// App version at which the native backend was found unsupported.
    /// A newer app version clears the condition for one retry.
    pub unsupported_since: Option<u32>,
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("recognizer backend marked unsupported since app version {since}")]
    UnsupportedBackend { since: u32 },

    #[error("packaged model assets missing at {0}")]
    AssetsMissing(PathBuf),

    #[error("failed to copy model assets: {0}")]
    CopyFailed(io::Error),

    #[error("provision store error: {0}")]
    Store(String),
}

/// Where the provision record lives. Injected so the engine stays
/// storage-agnostic.
pub trait ProvisionStore: Send + Sync {
    fn load(&self) -> Result<ProvisionRecord, String>;
    fn save(&self, record: &ProvisionRecord) -> Result<(), String>;
}

/// Lets the engine persist the unsupported-backend condition without
/// knowing about provisioning internals.
pub trait UnsupportedFlagSink: Send + Sync {
    fn mark_unsupported(&self);
}

pub struct ModelProvisioner<S: ProvisionStore> {
    store: S,
    assets_dir: PathBuf,
    target_dir: PathBuf,
    app_version: u32,
}

impl<S: ProvisionStore> ModelProvisioner<S> {
    pub fn new(
        store: S,
        assets_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
        app_version: u32,
    ) -> Self {
        Self {
            store,
            assets_dir: assets_dir.into(),
            target_dir: target_dir.into(),
            app_version,
        }
    }

    /// Ensure a versioned model tree exists at the target directory.
    ///
    /// Fails fast when the backend was marked unsupported at this app
    /// version or later. Returns the existing path without copying when
    /// the target is populated and the recorded version matches.
    /// Otherwise replaces the target with a fresh copy of the packaged
    /// tree; the version record is persisted only after a complete copy,
    /// so a failed copy is retried next time.
    pub fn ensure_model(&self) -> Result<PathBuf, ProvisionError> {
        let mut record = self.store.load().map_err(ProvisionError::Store)?;

        if let Some(since) = record.unsupported_since {
            if since >= self.app_version {
                return Err(ProvisionError::UnsupportedBackend { since });
            }
            // App was updated past the failure; allow one retry.
            tracing::info!(
                since,
                current = self.app_version,
                "clearing unsupported-backend flag after app update"
            );
            record.unsupported_since = None;
        }

        if dir_populated(&self.target_dir) && record.model_version == Some(self.app_version) {
            tracing::debug!(path = %self.target_dir.display(), "model already provisioned");
            return Ok(self.target_dir.clone());
        }

        if !self.assets_dir.is_dir() {
            return Err(ProvisionError::AssetsMissing(self.assets_dir.clone()));
        }

        if self.target_dir.exists() {
            fs::remove_dir_all(&self.target_dir).map_err(ProvisionError::CopyFailed)?;
        }
        copy_tree(&self.assets_dir, &self.target_dir).map_err(ProvisionError::CopyFailed)?;

        record.model_version = Some(self.app_version);
        self.store.save(&record).map_err(ProvisionError::Store)?;
        tracing::info!(
            version = self.app_version,
            path = %self.target_dir.display(),
            "model provisioned"
        );
        Ok(self.target_dir.clone())
    }
}

impl<S: ProvisionStore> UnsupportedFlagSink for ModelProvisioner<S> {
    fn mark_unsupported(&self) {
        let mut record = self.store.load().unwrap_or_default();
        record.unsupported_since = Some(self.app_version);
        if let Err(e) = self.store.save(&record) {
            tracing::error!("failed to persist unsupported-backend flag: {}", e);
        } else {
            tracing::warn!(
                version = self.app_version,
                "recognizer backend marked unsupported until app update"
            );
        }
    }
}

/// JSON-file store for the provision record. Missing file reads as the
/// default record.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProvisionStore for JsonFileStore {
    fn load(&self) -> Result<ProvisionRecord, String> {
        if !self.path.exists() {
            return Ok(ProvisionRecord::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| e.to_string())?;
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    }

    fn save(&self, record: &ProvisionRecord) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let raw = serde_json::to_string_pretty(record).map_err(|e| e.to_string())?;
        fs::write(&self.path, raw).map_err(|e| e.to_string())
    }
}

/// Integer version code derived from a semver string, in the usual
/// major*10000 + minor*100 + patch shape. Pre-release suffixes are
/// ignored.
pub fn version_code(semver: &str) -> u32 {
    let mut parts = semver.split('.').map(|part| {
        part.split(|c: char| !c.is_ascii_digit())
            .next()
            .unwrap_or("")
            .parse::<u32>()
            .unwrap_or(0)
    });
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);
    major * 10_000 + minor * 100 + patch
}

fn dir_populated(path: &Path) -> bool {
    path.is_dir()
        && fs::read_dir(path)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
}

fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
