// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load, tokenize, align embeddings  (prepare_use_case)
//   Step 2: Build Burn datasets               (Layer 4 - data)
//   Step 3: Save config, open metrics log     (Layer 6 - infra)
//   Step 4: Run training loop                 (Layer 5 - ml)
//   Step 5: Predict the test partition        (Layer 5 - ml)
//   Step 6: Score predictions                 (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::prepare_use_case::prepare;
use crate::data::{
    dataset::ClassificationDataset,
    embeddings::EMBEDDING_DIM,
    label_encoder::LabelFit,
    tokenizer::{IndexOrder, DEFAULT_EXCLUDED_CHARS},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    embedding_store::CacheMode,
    metrics::MetricsLogger,
};
use crate::ml::{
    evaluator::{evaluate, Evaluation},
    inferencer::Inferencer,
    model::Architecture,
    trainer::run_training,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every path and constant of a run. Serialised to train_config.json
// next to the checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_path:     String,
    pub test_path:      String,
    pub embedding_path: String,
    pub cache_path:     String,
    pub model_dir:      String,
    pub text_column:    String,
    pub label_column:   String,
    pub category_count: usize,
    pub val_fraction:   f64,
    pub seed:           u64,
    pub epochs:         usize,
    pub batch_size:     usize,
    pub lr:             f64,
    pub architecture:   Architecture,
    pub label_fit:      LabelFit,
    pub index_order:    IndexOrder,
    pub cache_mode:     CacheMode,
    pub lowercase:      bool,
    pub excluded_chars: String,
    pub embedding_dim:  usize,
    /// Report names by class index; the label encoder's classes when unset
    pub target_names:   Option<Vec<String>>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_path:     "./data/train.csv".to_string(),
            test_path:      "./data/test.csv".to_string(),
            embedding_path: "../embedding/glove.840B.300d.txt".to_string(),
            cache_path:     "embedding.bin".to_string(),
            model_dir:      "./model/".to_string(),
            text_column:    "turn3".to_string(),
            label_column:   "label".to_string(),
            category_count: 4,
            val_fraction:   0.1,
            seed:           42,
            epochs:         3,
            batch_size:     32,
            lr:             1e-3,
            architecture:   Architecture::Lstm,
            label_fit:      LabelFit::Union,
            index_order:    IndexOrder::Insertion,
            cache_mode:     CacheMode::ContentAddressed,
            lowercase:      true,
            excluded_chars: DEFAULT_EXCLUDED_CHARS.to_string(),
            embedding_dim:  EMBEDDING_DIM,
            target_names:   None,
        }
    }
}

impl TrainConfig {
    /// Reject values no run could use before any file is touched.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.category_count > 0, "category count must be positive");
        anyhow::ensure!(self.epochs > 0, "epochs must be positive");
        anyhow::ensure!(self.batch_size > 0, "batch size must be positive");
        anyhow::ensure!(self.embedding_dim > 0, "embedding dimension must be positive");
        anyhow::ensure!(
            (0.0..1.0).contains(&self.val_fraction),
            "validation fraction must be in [0, 1), got {}",
            self.val_fraction
        );
        if let Some(names) = &self.target_names {
            anyhow::ensure!(
                names.len() == self.category_count,
                "{} target names given for {} categories",
                names.len(),
                self.category_count
            );
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Train, then evaluate on the test partition.
    pub fn execute(&self) -> Result<Evaluation> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Partitions, sequences and embedding matrix ───────────────
        let data = prepare(cfg)?;
        let seq_len = data.encoded.max_len;

        // ── Step 2: Build Burn datasets ───────────────────────────────────────
        let train_dataset = ClassificationDataset::from_parts(
            data.encoded.train.clone(),
            data.partitions.train_y.clone(),
        );
        let val_dataset = ClassificationDataset::from_parts(
            data.encoded.val.clone(),
            data.partitions.val_y.clone(),
        );
        tracing::info!(
            "Datasets: {} train, {} validation samples of length {}",
            train_dataset.sample_count(),
            val_dataset.sample_count(),
            seq_len
        );

        // ── Step 3: Config + metrics next to the checkpoints ─────────────────
        let mut ckpt_manager = CheckpointManager::new(&cfg.model_dir)?;
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.model_dir)
            .with_context(|| format!("Cannot open metrics log in '{}'", cfg.model_dir))?;

        // ── Step 4: Run training loop (Layer 5) ───────────────────────────────
        let model = run_training(
            cfg,
            &data.embedding,
            seq_len,
            train_dataset,
            val_dataset,
            &mut ckpt_manager,
            &metrics,
        )?;

        // ── Step 5: Predict the test partition ────────────────────────────────
        let inferencer = Inferencer::new(model, Default::default(), cfg.batch_size);
        let probs = inferencer.predict_proba(&data.encoded.test)?;

        // ── Step 6: Score ─────────────────────────────────────────────────────
        Ok(evaluate(&probs, &data.partitions.test_y, &data.target_names(cfg)))
    }
}
