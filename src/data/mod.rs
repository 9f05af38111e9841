// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw CSV rows to tensor batches:
//
//   train.csv / test.csv
//       │
//       ▼
//   DatasetLoader     → reads rows, splits train/validation,
//       │               encodes labels (integer, one-hot)
//       ▼
//   TextTokenizer     → vocabulary + padded id sequences
//       │
//       ▼
//   embeddings        → pretrained vectors aligned to ids
//       │
//       ▼
//   ClassificationDataset / Batcher → Burn DataLoader input
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads CSV sources and builds the six partitions
pub mod loader;

/// Label → class index and one-hot encoding
pub mod label_encoder;

/// Seeded train/validation split
pub mod splitter;

/// Vocabulary, id sequences and padding
pub mod tokenizer;

/// Pretrained vector parsing and vocabulary alignment
pub mod embeddings;

/// Implements Burn's Dataset trait for classification samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
