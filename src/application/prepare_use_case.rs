// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Everything up to (but not including) model construction:
//
//   Step 1: Load and split the CSV partitions  (Layer 4 - data)
//   Step 2: Fit the vocabulary and pad         (Layer 4 - data)
//   Step 3: Align pretrained embeddings        (Layer 6 - infra)
//
// `train` runs this first; `prepare` stops here and reports.

use anyhow::{Context, Result};
use std::{fmt, path::Path};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    embeddings::EmbeddingMatrix,
    loader::{CsvExampleSource, DatasetLoader, LoaderOptions, Partitions},
    tokenizer::{EncodedPartitions, TextTokenizer},
};
use crate::infra::embedding_store::EmbeddingAligner;

/// Output of the preparation steps.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub partitions: Partitions,
    pub encoded:    EncodedPartitions,
    pub embedding:  EmbeddingMatrix,
}

impl PreparedData {
    /// Names shown in the classification report.
    pub fn target_names(&self, cfg: &TrainConfig) -> Vec<String> {
        cfg.target_names
            .clone()
            .unwrap_or_else(|| self.partitions.classes.clone())
    }
}

impl fmt::Display for PreparedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.partitions;
        writeln!(f, "Train rows:       {}", p.train_x.len())?;
        writeln!(f, "Validation rows:  {}", p.val_x.len())?;
        writeln!(f, "Test rows:        {}", p.test_x.len())?;
        writeln!(f, "Classes:          {:?}", p.classes)?;
        writeln!(f, "Vocabulary size:  {}", self.encoded.vocabulary.len())?;
        writeln!(f, "Sequence length:  {}", self.encoded.max_len)?;
        write!(
            f,
            "Embedding matrix: {} x {} ({} rows with a pretrained vector)",
            self.embedding.rows(),
            self.embedding.dim(),
            self.embedding.covered_rows()
        )
    }
}

pub struct PrepareUseCase {
    config: TrainConfig,
}

impl PrepareUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PreparedData> {
        prepare(&self.config)
    }
}

pub fn prepare(cfg: &TrainConfig) -> Result<PreparedData> {
    // ── Step 1: Load, split and encode labels ────────────────────────────────
    tracing::info!("Loading '{}' and '{}'", cfg.train_path, cfg.test_path);
    let loader = DatasetLoader::new(
        CsvExampleSource::new(&cfg.train_path, &cfg.text_column, &cfg.label_column),
        CsvExampleSource::new(&cfg.test_path, &cfg.text_column, &cfg.label_column),
        LoaderOptions {
            category_size: cfg.category_count,
            val_fraction:  cfg.val_fraction,
            seed:          cfg.seed,
            label_fit:     cfg.label_fit,
        },
    );
    let partitions = loader.load().context("Failed to load the labelled data")?;

    // ── Step 2: Vocabulary + padded sequences ────────────────────────────────
    let tokenizer = TextTokenizer::new(&cfg.excluded_chars, cfg.lowercase, cfg.index_order);
    let encoded = tokenizer
        .fit_transform(&partitions.train_x, &partitions.test_x, &partitions.val_x)
        .context("Failed to tokenize the partitions")?;

    // ── Step 3: Embedding matrix (cached) ────────────────────────────────────
    let aligner   = EmbeddingAligner::new(&cfg.cache_path, cfg.cache_mode, cfg.embedding_dim);
    let embedding = aligner
        .load_or_build(&encoded.vocabulary, Path::new(&cfg.embedding_path))
        .with_context(|| format!("Failed to align embeddings from '{}'", cfg.embedding_path))?;

    Ok(PreparedData { partitions, encoded, embedding })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::embedding_store::CacheMode;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> TrainConfig {
        let path = |name: &str| dir.path().join(name).to_string_lossy().into_owned();

        fs::write(
            path("train.csv"),
            "id,turn3,label\n\
             1,I am so happy today,happy\n\
             2,this makes me angry,angry\n\
             3,so sad right now,sad\n\
             4,just a normal day,others\n\
             5,happy happy joy,happy\n",
        )
        .unwrap();
        fs::write(
            path("test.csv"),
            "id,turn3,label\n1,angry and sad,angry\n2,a happy day,happy\n",
        )
        .unwrap();
        fs::write(path("vectors.txt"), "happy 1.0 0.0 0.5\nsad 0.0 1.0 0.5\nzebra 9 9 9\n").unwrap();

        TrainConfig {
            train_path:     path("train.csv"),
            test_path:      path("test.csv"),
            embedding_path: path("vectors.txt"),
            cache_path:     path("embedding.bin"),
            model_dir:      path("model"),
            embedding_dim:  3,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_prepare_runs_all_steps() {
        let dir  = TempDir::new().unwrap();
        let cfg  = config_in(&dir);
        let data = PrepareUseCase::new(cfg.clone()).execute().unwrap();

        // ceil(0.1 * 5) = 1 validation row
        assert_eq!(data.partitions.val_x.len(), 1);
        assert_eq!(data.partitions.train_x.len(), 4);
        assert_eq!(data.partitions.test_y.len(), 2);
        assert_eq!(data.partitions.classes, vec!["angry", "happy", "others", "sad"]);

        assert_eq!(data.embedding.rows(), data.encoded.vocabulary.len() + 1);
        assert_eq!(data.embedding.covered_rows(), 2);
        assert!(data.encoded.train.iter().all(|s| s.len() == data.encoded.max_len));

        assert_eq!(data.target_names(&cfg), data.partitions.classes);
        assert!(data.to_string().contains("Vocabulary size:"));
    }

    #[test]
    fn test_fixed_cache_is_reused_without_source() {
        let dir = TempDir::new().unwrap();
        let cfg = TrainConfig { cache_mode: CacheMode::Fixed, ..config_in(&dir) };
        let first = prepare(&cfg).unwrap();
        assert!(Path::new(&cfg.cache_path).exists());

        // A fixed cache is never re-validated against the source
        fs::remove_file(&cfg.embedding_path).unwrap();
        let again = prepare(&cfg).unwrap();
        assert_eq!(again.embedding, first.embedding);

        // Content-addressed mode has to stat the source to build its key
        let keyed = TrainConfig { cache_mode: CacheMode::ContentAddressed, ..cfg };
        assert!(prepare(&keyed).is_err());
    }

    #[test]
    fn test_custom_target_names_win() {
        let dir = TempDir::new().unwrap();
        let cfg = TrainConfig {
            target_names: Some(vec!["0".into(), "1".into(), "2".into(), "3".into()]),
            ..config_in(&dir)
        };
        let data = prepare(&cfg).unwrap();
        assert_eq!(data.target_names(&cfg), vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let dir = TempDir::new().unwrap();
        let cfg = TrainConfig { text_column: "turn1".into(), ..config_in(&dir) };
        let err = prepare(&cfg).unwrap_err();
        assert!(format!("{err:#}").contains("turn1"));
    }
}
