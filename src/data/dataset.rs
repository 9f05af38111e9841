use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One padded token sequence with its one-hot target row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationSample {
    pub token_ids: Vec<u32>,
    pub target:    Vec<f32>,
}

pub struct ClassificationDataset {
    samples: Vec<ClassificationSample>,
}

impl ClassificationDataset {
    pub fn new(samples: Vec<ClassificationSample>) -> Self { Self { samples } }

    /// Pair padded sequences with one-hot rows; extra entries on either side are ignored.
    pub fn from_parts(sequences: Vec<Vec<u32>>, targets: Vec<Vec<f32>>) -> Self {
        let samples = sequences
            .into_iter()
            .zip(targets)
            .map(|(token_ids, target)| ClassificationSample { token_ids, target })
            .collect();
        Self { samples }
    }

    pub fn sample_count(&self) -> usize { self.samples.len() }
}

impl Dataset<ClassificationSample> for ClassificationDataset {
    fn get(&self, index: usize) -> Option<ClassificationSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
