// ============================================================
// Layer 5 — Classifier Architectures
// ============================================================
// Two interchangeable text classifiers, both built from
// (sequence length, embedding matrix, category count) and both
// starting with a FROZEN embedding layer initialised from the
// pretrained matrix:
//
//   BiLstmClassifier
//     embedding → 3 × BiLSTM(128) → [max pool ‖ mean pool]
//     → 2 × residual Dense(512, ReLU) → Dense(categories)
//
//   TextCnnClassifier
//     embedding → spatial dropout(0.2)
//     → for k in {3,4,5}: Conv1d(128, k, ReLU) → MaxPool(2)
//     → concat over time → flatten → Dense(categories)
//
// Both return raw logits; `predict` applies softmax.
//
// Reference: Burn Book §3 (Building Blocks)
//            Kim (2014) Convolutional Neural Networks for
//            Sentence Classification

use burn::{
    module::Param,
    nn::{
        conv::{Conv1d, Conv1dConfig},
        pool::{MaxPool1d, MaxPool1dConfig},
        BiLstm, BiLstmConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{
        activation::{log_softmax, relu, softmax},
        Distribution,
    },
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::data::embeddings::EmbeddingMatrix;
use crate::domain::errors::{PipelineError, PipelineResult};

/// Convolution widths of the TextCNN branches.
pub const CNN_FILTER_SIZES: [usize; 3] = [3, 4, 5];
const CNN_POOL_SIZE: usize = 2;

// ─── TextClassifier ───────────────────────────────────────────────────────────
/// The narrow interface the trainer and inferencer rely on.
pub trait TextClassifier<B: Backend> {
    /// token_ids: [batch, seq_len] → logits: [batch, categories]
    fn forward(&self, token_ids: Tensor<B, 2, Int>) -> Tensor<B, 2>;

    /// Per-class probabilities: [batch, categories], rows sum to 1.
    fn predict(&self, token_ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        softmax(self.forward(token_ids), 1)
    }
}

/// Mean categorical cross-entropy against one-hot targets.
pub fn categorical_cross_entropy<B: Backend>(
    logits:  Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    (log_softmax(logits, 1) * targets)
        .sum_dim(1)
        .neg()
        .mean()
}

/// Rows whose argmax matches the one-hot target.
pub fn correct_predictions<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> usize {
    let hits: i64 = logits
        .argmax(1)
        .equal(targets.argmax(1))
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();
    hits as usize
}

/// Embedding layer holding the pretrained matrix, excluded from training.
fn frozen_embedding<B: Backend>(matrix: &EmbeddingMatrix, device: &B::Device) -> Embedding<B> {
    let weight = Tensor::<B, 1>::from_floats(matrix.as_slice(), device)
        .reshape([matrix.rows(), matrix.dim()]);
    let mut embedding = EmbeddingConfig::new(matrix.rows(), matrix.dim()).init(device);
    embedding.weight = Param::from_tensor(weight);
    embedding.no_grad()
}

// ─── Architecture ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Architecture {
    /// Stacked bidirectional LSTM
    #[default]
    Lstm,
    /// TextCNN with 3/4/5-wide filters
    Cnn,
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lstm" => Ok(Architecture::Lstm),
            "cnn"  => Ok(Architecture::Cnn),
            other => Err(format!("unknown architecture '{other}' (expected lstm or cnn)")),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::Lstm => f.write_str("lstm"),
            Architecture::Cnn  => f.write_str("cnn"),
        }
    }
}

// ─── BiLSTM ───────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct BiLstmClassifierConfig {
    pub category_count: usize,
    /// Hidden units per direction; the pooled width is 4× this
    #[config(default = 128)]
    pub lstm_units: usize,
}

impl BiLstmClassifierConfig {
    pub fn init<B: Backend>(&self, matrix: &EmbeddingMatrix, device: &B::Device) -> BiLstmClassifier<B> {
        let units  = self.lstm_units;
        // max pool ‖ mean pool over a bidirectional output
        let pooled = 4 * units;
        BiLstmClassifier {
            embedding: frozen_embedding(matrix, device),
            lstm1:     BiLstmConfig::new(matrix.dim(), units, true).init(device),
            lstm2:     BiLstmConfig::new(2 * units, units, true).init(device),
            lstm3:     BiLstmConfig::new(2 * units, units, true).init(device),
            dense1:    LinearConfig::new(pooled, pooled).init(device),
            dense2:    LinearConfig::new(pooled, pooled).init(device),
            output:    LinearConfig::new(pooled, self.category_count).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct BiLstmClassifier<B: Backend> {
    pub embedding: Embedding<B>,
    pub lstm1:     BiLstm<B>,
    pub lstm2:     BiLstm<B>,
    pub lstm3:     BiLstm<B>,
    pub dense1:    Linear<B>,
    pub dense2:    Linear<B>,
    pub output:    Linear<B>,
}

impl<B: Backend> TextClassifier<B> for BiLstmClassifier<B> {
    fn forward(&self, token_ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch_size, _] = token_ids.dims();

        let x = self.embedding.forward(token_ids); // [batch, seq_len, dim]
        let (x, _) = self.lstm1.forward(x, None);
        let (x, _) = self.lstm2.forward(x, None);
        let (x, _) = self.lstm3.forward(x, None);  // [batch, seq_len, 2*units]

        // max_dim only differentiates over the last axis: pool on [batch, width, seq_len]
        let width    = x.dims()[2];
        let max_pool = x.clone().swap_dims(1, 2).max_dim(2).reshape([batch_size, width]);
        let avg_pool = x.mean_dim(1).reshape([batch_size, width]);
        let hidden   = Tensor::cat(vec![max_pool, avg_pool], 1);

        let hidden = hidden.clone() + relu(self.dense1.forward(hidden));
        let hidden = hidden.clone() + relu(self.dense2.forward(hidden));

        self.output.forward(hidden)
    }
}

// ─── TextCNN ──────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct TextCnnClassifierConfig {
    pub seq_len:        usize,
    pub category_count: usize,
    #[config(default = 128)]
    pub num_filters: usize,
    #[config(default = 0.2)]
    pub spatial_dropout: f64,
}

impl TextCnnClassifierConfig {
    /// Time steps left after a filter of width `k` and the pooling layer.
    pub fn pooled_len(&self, k: usize) -> usize {
        (self.seq_len + 1).saturating_sub(k) / CNN_POOL_SIZE
    }

    pub fn init<B: Backend>(
        &self,
        matrix: &EmbeddingMatrix,
        device: &B::Device,
    ) -> PipelineResult<TextCnnClassifier<B>> {
        let widest = CNN_FILTER_SIZES.iter().copied().max().unwrap_or(0);
        if self.seq_len < widest + CNN_POOL_SIZE - 1 {
            return Err(PipelineError::Config(format!(
                "the CNN needs sequences of at least {} tokens, the longest example has {}",
                widest + CNN_POOL_SIZE - 1,
                self.seq_len
            )));
        }

        let convs = CNN_FILTER_SIZES
            .iter()
            .map(|&k| Conv1dConfig::new(matrix.dim(), self.num_filters, k).init(device))
            .collect();
        let flat_width: usize = CNN_FILTER_SIZES
            .iter()
            .map(|&k| self.num_filters * self.pooled_len(k))
            .sum();

        Ok(TextCnnClassifier {
            embedding: frozen_embedding(matrix, device),
            convs,
            pool: MaxPool1dConfig::new(CNN_POOL_SIZE)
                .with_stride(CNN_POOL_SIZE)
                .init(),
            output: LinearConfig::new(flat_width, self.category_count).init(device),
            spatial_dropout: self.spatial_dropout,
        })
    }
}

#[derive(Module, Debug)]
pub struct TextCnnClassifier<B: Backend> {
    pub embedding:       Embedding<B>,
    pub convs:           Vec<Conv1d<B>>,
    pub pool:            MaxPool1d,
    pub output:          Linear<B>,
    pub spatial_dropout: f64,
}

impl<B: Backend> TextCnnClassifier<B> {
    /// Zero whole embedding channels (same mask at every time step).
    /// Only active while gradients are tracked.
    fn drop_channels(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        if !B::ad_enabled() || self.spatial_dropout <= 0.0 {
            return x;
        }
        let [batch_size, seq_len, dim] = x.dims();
        let keep = 1.0 - self.spatial_dropout;
        let mask = Tensor::<B, 3>::random([batch_size, 1, dim], Distribution::Bernoulli(keep), &x.device())
            .expand([batch_size, seq_len, dim]);
        (x * mask).div_scalar(keep)
    }
}

impl<B: Backend> TextClassifier<B> for TextCnnClassifier<B> {
    fn forward(&self, token_ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let x = self.embedding.forward(token_ids);   // [batch, seq_len, dim]
        let x = self.drop_channels(x).swap_dims(1, 2); // [batch, dim, seq_len]

        let branches: Vec<Tensor<B, 3>> = self
            .convs
            .iter()
            .map(|conv| self.pool.forward(relu(conv.forward(x.clone()))))
            .collect();

        // [batch, filters, Σ pooled_len] → [batch, filters * Σ pooled_len]
        let merged = Tensor::cat(branches, 2).flatten::<2>(1, 2);
        self.output.forward(merged)
    }
}

// ─── TrainedClassifier ────────────────────────────────────────────────────────
/// Either architecture, so callers can hold a trained model by value.
#[derive(Debug, Clone)]
pub enum TrainedClassifier<B: Backend> {
    Lstm(BiLstmClassifier<B>),
    Cnn(TextCnnClassifier<B>),
}

impl<B: Backend> TextClassifier<B> for TrainedClassifier<B> {
    fn forward(&self, token_ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        match self {
            TrainedClassifier::Lstm(m) => m.forward(token_ids),
            TrainedClassifier::Cnn(m)  => m.forward(token_ids),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn tiny_matrix(rows: usize, dim: usize) -> EmbeddingMatrix {
        let mut m = EmbeddingMatrix::zeros(rows, dim);
        for i in 1..rows {
            let v: Vec<f32> = (0..dim).map(|j| ((i * 7 + j) % 5) as f32 / 5.0).collect();
            m.set_row(i, &v);
        }
        m
    }

    fn ids(rows: &[[i32; 6]]) -> Tensor<TestBackend, 2, Int> {
        let flat: Vec<i32> = rows.iter().flatten().copied().collect();
        Tensor::<TestBackend, 1, Int>::from_ints(flat.as_slice(), &Default::default())
            .reshape([rows.len(), 6])
    }

    #[test]
    fn test_lstm_output_shape() {
        let device = Default::default();
        let model: BiLstmClassifier<TestBackend> = BiLstmClassifierConfig::new(4)
            .with_lstm_units(8)
            .init(&tiny_matrix(10, 6), &device);
        let logits = model.forward(ids(&[[0, 0, 1, 2, 3, 4], [5, 6, 7, 8, 9, 1]]));
        assert_eq!(logits.dims(), [2, 4]);
    }

    #[test]
    fn test_cnn_output_shape() {
        let device = Default::default();
        let config = TextCnnClassifierConfig::new(6, 3).with_num_filters(4);
        let model: TextCnnClassifier<TestBackend> = config.init(&tiny_matrix(10, 5), &device).unwrap();
        let logits = model.forward(ids(&[[0, 1, 2, 3, 4, 5], [9, 8, 7, 6, 5, 4], [0, 0, 0, 0, 0, 1]]));
        assert_eq!(logits.dims(), [3, 3]);
    }

    #[test]
    fn test_cnn_rejects_short_sequences() {
        let device = Default::default();
        let result = TextCnnClassifierConfig::new(5, 3).init::<TestBackend>(&tiny_matrix(4, 5), &device);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_cnn_pooled_lengths() {
        let config = TextCnnClassifierConfig::new(10, 2);
        // conv widths 8, 7, 6 → pooled 4, 3, 3
        assert_eq!(config.pooled_len(3), 4);
        assert_eq!(config.pooled_len(4), 3);
        assert_eq!(config.pooled_len(5), 3);
    }

    #[test]
    fn test_predict_rows_sum_to_one() {
        let device = Default::default();
        let model = TrainedClassifier::Lstm(
            BiLstmClassifierConfig::new(3).with_lstm_units(4).init::<TestBackend>(&tiny_matrix(10, 4), &device),
        );
        let probs: Vec<f32> = model
            .predict(ids(&[[1, 2, 3, 4, 5, 6]]))
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_frozen_embedding_holds_pretrained_rows() {
        let device = Default::default();
        let matrix = tiny_matrix(3, 2);
        let layer: Embedding<TestBackend> = frozen_embedding(&matrix, &device);
        let weight: Vec<f32> = layer.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(weight, matrix.as_slice());
    }

    #[test]
    fn test_cross_entropy_of_confident_correct_prediction_is_small() {
        let device  = Default::default();
        let logits  = Tensor::<TestBackend, 1>::from_floats([10.0, -10.0, -10.0, 10.0].as_slice(), &device).reshape([2, 2]);
        let targets = Tensor::<TestBackend, 1>::from_floats([1.0, 0.0, 0.0, 1.0].as_slice(), &device).reshape([2, 2]);
        let loss: f32 = categorical_cross_entropy(logits.clone(), targets.clone()).into_scalar().elem::<f32>();
        assert!(loss < 1e-3);
        assert_eq!(correct_predictions(logits, targets), 2);
    }

    #[test]
    fn test_lstm_gradients_flow_through_pooling() {
        type AdBackend = burn::backend::Autodiff<TestBackend>;
        let device = Default::default();
        let model: BiLstmClassifier<AdBackend> = BiLstmClassifierConfig::new(2)
            .with_lstm_units(4)
            .init(&tiny_matrix(10, 6), &device);

        let flat: Vec<i32> = vec![0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 1];
        let token_ids = Tensor::<AdBackend, 1, Int>::from_ints(flat.as_slice(), &device).reshape([2, 6]);
        let targets = Tensor::<AdBackend, 1>::from_floats([1.0, 0.0, 0.0, 1.0].as_slice(), &device)
            .reshape([2, 2]);

        let loss  = categorical_cross_entropy(model.forward(token_ids), targets);
        let grads = loss.backward();
        assert!(model.output.weight.val().grad(&grads).is_some());
        assert!(model.dense1.weight.val().grad(&grads).is_some());
    }

    #[test]
    fn test_architecture_names() {
        assert_eq!("cnn".parse::<Architecture>().unwrap(), Architecture::Cnn);
        assert_eq!(Architecture::Lstm.to_string(), "lstm");
    }
}
