// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Runs a trained classifier over padded sequences in batches
// and returns per-class probabilities row by row.
use anyhow::{Context, Result};
use burn::prelude::*;

use crate::ml::model::{TextClassifier, TrainedClassifier};

pub struct Inferencer<B: Backend> {
    model:      TrainedClassifier<B>,
    device:     B::Device,
    batch_size: usize,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: TrainedClassifier<B>, device: B::Device, batch_size: usize) -> Self {
        Self { model, device, batch_size: batch_size.max(1) }
    }

    /// Probabilities for every sequence, in input order.
    /// All sequences must share the same (padded) length.
    pub fn predict_proba(&self, sequences: &[Vec<u32>]) -> Result<Vec<Vec<f32>>> {
        let mut rows = Vec::with_capacity(sequences.len());

        for chunk in sequences.chunks(self.batch_size) {
            let seq_len = chunk[0].len();
            if let Some(bad) = chunk.iter().find(|s| s.len() != seq_len) {
                anyhow::bail!(
                    "sequences must be padded to one length, found {} and {}",
                    seq_len,
                    bad.len()
                );
            }

            let flat: Vec<i32> = chunk.iter().flatten().map(|&id| id as i32).collect();
            let input = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
                .reshape([chunk.len(), seq_len]);

            let probs = self.model.predict(input);
            let [_, classes] = probs.dims();
            let values: Vec<f32> = probs
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("{e:?}"))
                .context("Cannot read prediction tensor")?;

            rows.extend(values.chunks(classes).map(|r| r.to_vec()));
        }

        tracing::debug!("Predicted {} rows", rows.len());
        Ok(rows)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::embeddings::EmbeddingMatrix;
    use crate::ml::model::BiLstmClassifierConfig;

    type TestBackend = burn::backend::NdArray;

    fn inferencer(batch_size: usize) -> Inferencer<TestBackend> {
        let device = Default::default();
        let mut matrix = EmbeddingMatrix::zeros(6, 3);
        for i in 1..6 {
            matrix.set_row(i, &[i as f32 / 6.0, 0.1, -0.2]);
        }
        let model = BiLstmClassifierConfig::new(3)
            .with_lstm_units(4)
            .init::<TestBackend>(&matrix, &device);
        Inferencer::new(TrainedClassifier::Lstm(model), device, batch_size)
    }

    #[test]
    fn test_rows_follow_input_across_batches() {
        let inf  = inferencer(2);
        let seqs = vec![vec![0, 1, 2], vec![3, 4, 5], vec![0, 0, 1], vec![2, 2, 2], vec![5, 4, 3]];
        let probs = inf.predict_proba(&seqs).unwrap();
        assert_eq!(probs.len(), 5);
        for row in &probs {
            assert_eq!(row.len(), 3);
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_empty_input_gives_no_rows() {
        assert!(inferencer(4).predict_proba(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_ragged_batch_is_rejected() {
        let result = inferencer(4).predict_proba(&[vec![1, 2], vec![1, 2, 3]]);
        assert!(result.is_err());
    }
}
