// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves model weights with Burn's CompactRecorder whenever the
// validation accuracy improves, and records the run's config.
//
// File naming convention:
//   model/
//     model-weights.01-0.612500.mpk.gz   ← epoch 1, val_acc 0.6125
//     model-weights.03-0.701250.mpk.gz   ← epoch 3 improved again
//     train_config.json                  ← resolved configuration
//     metrics.csv                        ← one row per epoch
//
// Checkpoints are a record of the run; the pipeline never
// resumes from them.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::CompactRecorder,
};

use crate::application::train_use_case::TrainConfig;

pub struct CheckpointManager {
    dir:          PathBuf,
    best_val_acc: Option<f64>,
}

impl CheckpointManager {
    /// Create the manager and its directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create model directory '{}'", dir.display()))?;
        Ok(Self { dir, best_val_acc: None })
    }

    /// Checkpoint stem for an epoch: `model-weights.{epoch:02}-{val_acc:.6}`.
    pub fn checkpoint_name(epoch: usize, val_acc: f64) -> String {
        format!("model-weights.{epoch:02}-{val_acc:.6}")
    }

    /// Save `model` if `val_acc` beats every earlier epoch.
    /// Returns the path written (without the recorder's extension), if any.
    pub fn save_if_improved<B, M>(
        &mut self,
        model:   &M,
        epoch:   usize,
        val_acc: f64,
    ) -> Result<Option<PathBuf>>
    where
        B: Backend,
        M: Module<B>,
    {
        if !self.is_improvement(val_acc) {
            tracing::info!(
                "Epoch {:02}: val_acc {:.6} did not improve from {:.6}",
                epoch,
                val_acc,
                self.best_val_acc.unwrap_or_default()
            );
            return Ok(None);
        }

        let path = self.dir.join(Self::checkpoint_name(epoch, val_acc));
        model
            .clone()
            .save_file(path.clone(), &CompactRecorder::new())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::info!(
            "Epoch {:02}: val_acc improved from {} to {:.6}, saved '{}'",
            epoch,
            self.best_val_acc
                .map(|a| format!("{a:.6}"))
                .unwrap_or_else(|| "-inf".to_string()),
            val_acc,
            path.display()
        );
        self.best_val_acc = Some(val_acc);
        Ok(Some(path))
    }

    pub fn is_improvement(&self, val_acc: f64) -> bool {
        self.best_val_acc.map_or(true, |best| val_acc > best)
    }

    /// Write the resolved configuration next to the checkpoints.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::nn::{Linear, LinearConfig};
    use tempfile::TempDir;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_checkpoint_name_encodes_epoch_and_accuracy() {
        assert_eq!(CheckpointManager::checkpoint_name(3, 0.7125), "model-weights.03-0.712500");
    }

    #[test]
    fn test_only_improvements_are_saved() {
        let dir     = TempDir::new().unwrap();
        let mut mgr = CheckpointManager::new(dir.path()).unwrap();
        let device  = Default::default();
        let model: Linear<TestBackend> = LinearConfig::new(2, 2).init(&device);

        assert!(mgr.save_if_improved(&model, 1, 0.5).unwrap().is_some());
        assert!(mgr.save_if_improved(&model, 2, 0.5).unwrap().is_none());
        assert!(mgr.save_if_improved(&model, 3, 0.4).unwrap().is_none());
        assert!(mgr.save_if_improved(&model, 4, 0.6).unwrap().is_some());

        let saved = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("model-weights."))
            .count();
        assert_eq!(saved, 2);
    }

    #[test]
    fn test_config_written_as_json() {
        let dir = TempDir::new().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        let cfg = TrainConfig::default();
        mgr.save_config(&cfg).unwrap();
        let json = fs::read_to_string(dir.path().join("train_config.json")).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
