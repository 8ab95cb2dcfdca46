//! Model artifact store
//!
//! One JSON envelope per channel at `<models_dir>/<channel>.model.json`. The
//! fitted state is kept as a serialized payload string next to its SHA-256 so
//! float values round-trip bit for bit. Saves go through a temporary sibling
//! file and a rename; loads never fail hard: anything missing, unreadable or
//! inconsistent is reported as absent.

use crate::db::sqlite::models::Channel;
use crate::error::{AppError, Result};
use crate::forecasting::{FittedModel, SeasonalModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Envelope format version
pub const ARTIFACT_VERSION: u32 = 1;

const ARTIFACT_SUFFIX: &str = "model.json";

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    version: u32,
    channel: Channel,
    kind: String,
    orig_n: usize,
    saved_at: DateTime<Utc>,
    checksum: String,
    payload: String,
}

/// A loaded, verified artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub channel: Channel,
    /// Sample size the model was fitted against
    pub orig_n: usize,
    pub saved_at: DateTime<Utc>,
    pub model: FittedModel,
}

/// Filesystem-backed store of per-channel fitted models
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable location of a channel's artifact
    pub fn path_for(&self, channel: Channel) -> PathBuf {
        self.dir.join(format!("{}.{}", channel.as_str(), ARTIFACT_SUFFIX))
    }

    /// Persist `model` for `channel`, replacing any previous artifact wholesale
    pub fn save(&self, channel: Channel, model: &FittedModel) -> Result<PathBuf> {
        let payload = serde_json::to_string(model)?;
        let envelope = ArtifactEnvelope {
            version: ARTIFACT_VERSION,
            channel,
            kind: model.kind().to_string(),
            orig_n: model.nobs(),
            saved_at: Utc::now(),
            checksum: checksum(&payload),
            payload,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        let path = self.path_for(channel);
        self.write_atomic(&path, &bytes).map_err(|e| {
            AppError::Persistence(format!("failed to write {}: {}", path.display(), e))
        })?;

        info!(
            "Saved {} artifact for {} (orig_n={})",
            envelope.kind, channel, envelope.orig_n
        );
        Ok(path)
    }

    /// Load the artifact for `channel`; `None` when absent or not trustworthy
    pub fn load(&self, channel: Channel) -> Option<ModelArtifact> {
        let path = self.path_for(channel);
        if !path.exists() {
            debug!("No artifact for {} at {}", channel, path.display());
            return None;
        }

        match read_artifact(&path, channel) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!("Ignoring artifact {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let tmp_path = path.with_extension(format!("json.tmp-{}", uuid::Uuid::new_v4()));
        let written = (|| {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)
        })();

        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        written
    }
}

fn read_artifact(path: &Path, channel: Channel) -> Result<ModelArtifact> {
    let contents = fs::read_to_string(path)?;
    let envelope: ArtifactEnvelope = serde_json::from_str(&contents)?;

    if envelope.version != ARTIFACT_VERSION {
        return Err(AppError::Persistence(format!(
            "unsupported artifact version {}",
            envelope.version
        )));
    }
    if envelope.channel != channel {
        return Err(AppError::Persistence(format!(
            "artifact belongs to channel {}",
            envelope.channel
        )));
    }
    if checksum(&envelope.payload) != envelope.checksum {
        return Err(AppError::Persistence("checksum mismatch".into()));
    }

    let model: FittedModel = serde_json::from_str(&envelope.payload)?;
    if model.nobs() != envelope.orig_n {
        return Err(AppError::Persistence(format!(
            "orig_n {} disagrees with model state ({})",
            envelope.orig_n,
            model.nobs()
        )));
    }

    Ok(ModelArtifact {
        channel,
        orig_n: envelope.orig_n,
        saved_at: envelope.saved_at,
        model,
    })
}

fn checksum(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecasting::{HoltWintersFit, SEASONAL_PERIOD};
    use tempfile::tempdir;

    fn fitted(n: usize) -> FittedModel {
        let values: Vec<f64> = (0..n).map(|i| (i % 96) as f64 * 0.1 + 1.0 / 3.0).collect();
        FittedModel::HoltWinters(HoltWintersFit::fit(&values, SEASONAL_PERIOD).unwrap())
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let model = fitted(250);

        let path = store.save(Channel::Humidity, &model).unwrap();
        assert_eq!(path, dir.path().join("humidity.model.json"));

        let loaded = store.load(Channel::Humidity).unwrap();
        assert_eq!(loaded.orig_n, 250);
        assert_eq!(loaded.model, model);
    }

    #[test]
    fn test_missing_artifact_is_absent() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(&dir.path().join("never-created"));
        assert!(store.load(Channel::Co).is_none());
    }

    #[test]
    fn test_corrupt_artifact_is_absent() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        fs::write(store.path_for(Channel::Tvoc), b"{not json").unwrap();
        assert!(store.load(Channel::Tvoc).is_none());
    }

    #[test]
    fn test_tampered_payload_is_absent() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = store.save(Channel::Temperature, &fitted(120)).unwrap();

        let mut envelope: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        envelope["checksum"] = serde_json::Value::String("00".repeat(32));
        fs::write(&path, serde_json::to_vec(&envelope).unwrap()).unwrap();

        assert!(store.load(Channel::Temperature).is_none());
    }

    #[test]
    fn test_artifact_of_other_channel_is_absent() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = store.save(Channel::Temperature, &fitted(120)).unwrap();
        fs::copy(&path, store.path_for(Channel::Flammable)).unwrap();

        assert!(store.load(Channel::Flammable).is_none());
        assert!(store.load(Channel::Temperature).is_some());
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(Channel::Co, &fitted(100)).unwrap();
        store.save(Channel::Co, &fitted(300)).unwrap();

        assert_eq!(store.load(Channel::Co).unwrap().orig_n, 300);
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
