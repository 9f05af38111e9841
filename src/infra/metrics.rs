// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per training epoch:
//
//   epoch,train_loss,train_acc,val_loss,val_acc
//   1,1.102300,0.512000,0.981200,0.604000
//   2,0.874100,0.655000,0.902300,0.640000
//
// Output file: <model_dir>/metrics.csv
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    /// Mean categorical cross-entropy over training batches
    pub train_loss: f64,
    pub train_acc:  f64,
    pub val_loss:   f64,
    /// Fraction of validation rows whose argmax matches the target
    pub val_acc:    f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, train_acc: f64, val_loss: f64, val_acc: f64) -> Self {
        Self { epoch, train_loss, train_acc, val_loss, val_acc }
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,train_acc,val_loss,val_acc")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.train_acc,
            m.val_loss,
            m.val_acc,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_acc={:.4}",
            m.epoch,
            m.train_loss,
            m.val_acc,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
