//! Model Checkpointing
//!
//! Versioned JSON persistence of the full training state tuple, plus a
//! directory manager with retention. Serialization here is deliberately
//! stricter than the in-memory snapshot path: JSON cannot represent NaN/Inf,
//! and those are exactly the values this engine exists to detect, so a
//! checkpoint containing them is refused rather than silently nulled.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::networks::dense::{count_non_finite, NetworkConfig, Parameters};
use crate::optim::{OptimizerState, SchedulerState};
use crate::stability::WatchdogState;
use crate::training::engine::TrainingState;

/// Current checkpoint file format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// The full serializable state tuple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub config: EngineConfig,
    pub network: NetworkConfig,
    pub parameters: Parameters,
    pub optimizer: OptimizerState,
    pub scheduler: SchedulerState,
    pub watchdog: WatchdogState,
    pub training: TrainingState,
}

impl ModelCheckpoint {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        network: NetworkConfig,
        parameters: Parameters,
        optimizer: OptimizerState,
        scheduler: SchedulerState,
        watchdog: WatchdogState,
        training: TrainingState,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            timestamp: Utc::now(),
            config,
            network,
            parameters,
            optimizer,
            scheduler,
            watchdog,
            training,
        }
    }

    /// Shape and finiteness validation, run before save and after load.
    pub fn validate(&self) -> Result<()> {
        self.parameters.validate_against(&self.network)?;
        if !self.optimizer.matches(&self.parameters) {
            return Err(EngineError::Shape(
                "checkpoint optimizer state does not match parameters".into(),
            ));
        }

        let (nan, inf) = self.parameters.count_non_finite();
        let (m_nan, m_inf) = count_non_finite(&self.optimizer.m);
        let (v_nan, v_inf) = count_non_finite(&self.optimizer.v);
        let total = nan + inf + m_nan + m_inf + v_nan + v_inf;
        if total > 0 {
            return Err(EngineError::Checkpoint(format!(
                "refusing non-finite state: {} NaN/Inf values across parameters and moments",
                total
            )));
        }
        Ok(())
    }

    /// Serialize to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), step = self.training.global_step, "checkpoint saved");
        Ok(())
    }

    /// Deserialize from a JSON file, checking the format version.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let checkpoint: Self = serde_json::from_str(&content)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(EngineError::CheckpointVersion {
                found: checkpoint.version,
                expected: CHECKPOINT_VERSION,
            });
        }
        checkpoint.validate()?;
        info!(path = %path.display(), step = checkpoint.training.global_step, "checkpoint loaded");
        Ok(checkpoint)
    }
}

/// Checkpoint directory manager with bounded retention
pub struct Checkpointer {
    checkpoint_dir: PathBuf,
    max_checkpoints: usize,
}

impl Checkpointer {
    pub fn new<P: AsRef<Path>>(checkpoint_dir: P, max_checkpoints: usize) -> Self {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();
        if !checkpoint_dir.exists() {
            if let Err(e) = fs::create_dir_all(&checkpoint_dir) {
                warn!("Failed to create checkpoint directory: {}", e);
            }
        }
        Self {
            checkpoint_dir,
            max_checkpoints,
        }
    }

    /// Get checkpoint path for a given name
    pub fn checkpoint_path(&self, name: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{}.json", name))
    }

    /// Save a checkpoint under a name and prune old files.
    pub fn save(&self, checkpoint: &ModelCheckpoint, name: &str) -> Result<PathBuf> {
        let path = self.checkpoint_path(name);
        checkpoint.save(&path)?;
        self.cleanup_old_checkpoints();
        Ok(path)
    }

    /// Load a checkpoint by name.
    pub fn load(&self, name: &str) -> Result<ModelCheckpoint> {
        let path = self.checkpoint_path(name);
        if !path.exists() {
            return Err(EngineError::Checkpoint(format!(
                "checkpoint not found: {}",
                path.display()
            )));
        }
        ModelCheckpoint::load(&path)
    }

    /// List available checkpoint names, sorted.
    pub fn list_checkpoints(&self) -> Vec<String> {
        let mut checkpoints = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.checkpoint_dir) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Some(stem) = name.strip_suffix(".json") {
                        checkpoints.push(stem.to_string());
                    }
                }
            }
        }
        checkpoints.sort();
        checkpoints
    }

    /// Get latest checkpoint name
    pub fn latest_checkpoint(&self) -> Option<String> {
        self.list_checkpoints().into_iter().last()
    }

    /// Check if a checkpoint exists
    pub fn exists(&self, name: &str) -> bool {
        self.checkpoint_path(name).exists()
    }

    fn cleanup_old_checkpoints(&self) {
        let checkpoints = self.list_checkpoints();
        if checkpoints.len() <= self.max_checkpoints {
            return;
        }

        let to_remove = checkpoints.len() - self.max_checkpoints;
        for name in checkpoints.into_iter().take(to_remove) {
            let path = self.checkpoint_path(&name);
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove old checkpoint {:?}: {}", path, e);
            } else {
                info!("Removed old checkpoint: {}", name);
            }
        }
    }
}

impl Default for Checkpointer {
    fn default() -> Self {
        Self::new("./checkpoints", 5)
    }
}

/// Generate a checkpoint name with epoch number
pub fn epoch_name(prefix: &str, epoch: usize) -> String {
    format!("{}_ep{:06}", prefix, epoch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Architecture;
    use std::env::temp_dir;

    fn checkpoint() -> ModelCheckpoint {
        let config = EngineConfig::default();
        let network = NetworkConfig::build(Architecture::Compact, 4, 1).unwrap();
        let parameters = Parameters::initialize(&network, 1.0, Some(21));
        let optimizer = OptimizerState::for_parameters(&parameters);
        ModelCheckpoint::new(
            config,
            network,
            parameters,
            optimizer,
            SchedulerState::new(1e-3),
            WatchdogState::default(),
            TrainingState::default(),
        )
    }

    #[test]
    fn round_trip_preserves_state() {
        let dir = temp_dir().join("onlearn_ckpt_roundtrip");
        let path = dir.join("model.json");
        let original = checkpoint();

        original.save(&path).unwrap();
        let loaded = ModelCheckpoint::load(&path).unwrap();

        assert_eq!(loaded.parameters, original.parameters);
        assert_eq!(loaded.optimizer, original.optimizer);
        assert_eq!(loaded.scheduler, original.scheduler);
        assert_eq!(loaded.training, original.training);
        assert_eq!(loaded.version, CHECKPOINT_VERSION);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn refuses_non_finite_parameters() {
        let mut cp = checkpoint();
        cp.parameters.layers[0][0][0] = f64::NAN;
        let err = cp.validate().unwrap_err();
        assert!(matches!(err, EngineError::Checkpoint(_)));
    }

    #[test]
    fn rejects_future_versions() {
        let dir = temp_dir().join("onlearn_ckpt_version");
        let path = dir.join("model.json");
        let mut cp = checkpoint();
        cp.version = CHECKPOINT_VERSION + 1;
        // Bypass save() validation, write directly.
        fs::create_dir_all(&dir).unwrap();
        fs::write(&path, serde_json::to_string(&cp).unwrap()).unwrap();

        let err = ModelCheckpoint::load(&path).unwrap_err();
        assert!(matches!(err, EngineError::CheckpointVersion { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn checkpointer_lists_and_prunes() {
        let dir = temp_dir().join("onlearn_ckpt_prune");
        let _ = fs::remove_dir_all(&dir);
        let keeper = Checkpointer::new(&dir, 2);
        let cp = checkpoint();

        for epoch in 1..=4 {
            keeper.save(&cp, &epoch_name("model", epoch)).unwrap();
        }

        let names = keeper.list_checkpoints();
        assert_eq!(names, vec!["model_ep000003", "model_ep000004"]);
        assert_eq!(keeper.latest_checkpoint().as_deref(), Some("model_ep000004"));
        assert!(keeper.exists("model_ep000004"));
        assert!(!keeper.exists("model_ep000001"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn epoch_name_pads() {
        assert_eq!(epoch_name("model", 7), "model_ep000007");
    }
}
