// ============================================================
// Layer 4 — Classification Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec of samples
// into two tensors:
//
//   token_ids: [batch, max_len]       (Int)
//   targets:   [batch, category_size] (Float, one-hot)
//
// Every sample is already padded to max_len, so the batcher
// only flattens and reshapes.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ClassificationSample;

#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
    /// Padded token ids — shape: [batch_size, max_len]
    pub token_ids: Tensor<B, 2, Int>,

    /// One-hot targets — shape: [batch_size, category_size]
    pub targets: Tensor<B, 2>,
}

#[derive(Clone, Debug)]
pub struct ClassificationBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ClassificationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ClassificationSample, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(&self, items: Vec<ClassificationSample>) -> ClassificationBatch<B> {
        let batch_size = items.len();
        let seq_len    = items[0].token_ids.len();
        let classes    = items[0].target.len();

        // Burn uses i32 for Int tensors
        let ids_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.token_ids.iter().map(|&x| x as i32))
            .collect();

        let targets_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.target.iter().copied())
            .collect();

        let token_ids = Tensor::<B, 1, Int>::from_ints(
            ids_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let targets = Tensor::<B, 1>::from_floats(
            targets_flat.as_slice(), &self.device
        ).reshape([batch_size, classes]);

        ClassificationBatch { token_ids, targets }
    }
}
