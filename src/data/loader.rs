// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Reads labelled examples from CSV files and turns them into
// the six partitions the rest of the pipeline consumes:
//
//   train.csv ──► split 90/10 ──► train_x / train_y (one-hot)
//                            └──► val_x   / val_y   (one-hot)
//   test.csv  ─────────────────► test_x  / test_y  (integer)
//
// The CSV files must have a header row. Only two columns are
// read: the text column and the label column; everything else
// in the file is ignored.
//
// Reference: csv crate documentation
//            Rust Book §9 (Error Handling)

use std::{fs::File, path::PathBuf};

use crate::data::label_encoder::{one_hot, LabelEncoder, LabelFit};
use crate::data::splitter::split_train_val;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::example::{unzip_examples, Example, PartitionKind};
use crate::domain::traits::ExampleSource;

// ─── CsvExampleSource ─────────────────────────────────────────────────────────
/// Reads (text, label) pairs from one CSV file.
pub struct CsvExampleSource {
    path:         PathBuf,
    text_column:  String,
    label_column: String,
}

impl CsvExampleSource {
    pub fn new(
        path:         impl Into<PathBuf>,
        text_column:  impl Into<String>,
        label_column: impl Into<String>,
    ) -> Self {
        Self {
            path:         path.into(),
            text_column:  text_column.into(),
            label_column: label_column.into(),
        }
    }

    fn format_error(&self, reason: impl Into<String>) -> PipelineError {
        PipelineError::DataFormat {
            path:   self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl ExampleSource for CsvExampleSource {
    fn load_examples(&self) -> PipelineResult<Vec<Example>> {
        let file = File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file);

        // Locate the two columns we need by header name
        let headers = reader
            .headers()
            .map_err(|e| self.format_error(format!("cannot read header row: {e}")))?
            .clone();
        let find = |name: &str| {
            headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
                self.format_error(format!(
                    "missing column '{}' (found: {})",
                    name,
                    headers.iter().collect::<Vec<_>>().join(", ")
                ))
            })
        };
        let text_idx  = find(&self.text_column)?;
        let label_idx = find(&self.label_column)?;

        let mut examples = Vec::new();
        for (row, record) in reader.records().enumerate() {
            // Row numbers are 1-based and count the header line
            let line = row + 2;
            let record = record.map_err(|e| self.format_error(format!("row {line}: {e}")))?;

            let text = record
                .get(text_idx)
                .ok_or_else(|| self.format_error(format!("row {line}: no '{}' field", self.text_column)))?;
            let label = record
                .get(label_idx)
                .ok_or_else(|| self.format_error(format!("row {line}: no '{}' field", self.label_column)))?;

            examples.push(Example::new(text, label.trim()));
        }

        tracing::debug!("Read {} rows from '{}'", examples.len(), self.path.display());
        Ok(examples)
    }
}

// ─── Partitions ───────────────────────────────────────────────────────────────
/// The six arrays produced by [`DatasetLoader::load`].
#[derive(Debug, Clone)]
pub struct Partitions {
    pub train_x: Vec<String>,
    /// One-hot rows of width `category_size`
    pub train_y: Vec<Vec<f32>>,
    pub test_x:  Vec<String>,
    /// Integer class indices, used only for metrics
    pub test_y:  Vec<usize>,
    pub val_x:   Vec<String>,
    /// One-hot rows of width `category_size`
    pub val_y:   Vec<Vec<f32>>,
    /// Class names in index order (the encoder fit on the training labels
    /// in per-partition mode, on the union of all labels otherwise)
    pub classes: Vec<String>,
}

/// Options controlling how the loader splits and encodes.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub category_size: usize,
    pub val_fraction:  f64,
    pub seed:          u64,
    pub label_fit:     LabelFit,
}

// ─── DatasetLoader ────────────────────────────────────────────────────────────
pub struct DatasetLoader<S: ExampleSource> {
    train_source: S,
    test_source:  S,
    options:      LoaderOptions,
}

impl<S: ExampleSource> DatasetLoader<S> {
    pub fn new(train_source: S, test_source: S, options: LoaderOptions) -> Self {
        Self { train_source, test_source, options }
    }

    /// Load both sources, split train into train/validation and encode labels.
    pub fn load(&self) -> PipelineResult<Partitions> {
        let opts = &self.options;

        let train_rows = self.train_source.load_examples()?;
        let test_rows  = self.test_source.load_examples()?;

        let (train_rows, val_rows) = split_train_val(train_rows, opts.val_fraction, opts.seed);
        tracing::info!(
            "Partitions: {} train, {} validation, {} test",
            train_rows.len(),
            val_rows.len(),
            test_rows.len()
        );

        let (train_x, train_labels) = unzip_examples(&train_rows);
        let (test_x,  test_labels)  = unzip_examples(&test_rows);
        let (val_x,   val_labels)   = unzip_examples(&val_rows);

        let (train_idx, test_y, val_idx, classes) = match opts.label_fit {
            LabelFit::Union => {
                let all = train_labels.iter().chain(&test_labels).chain(&val_labels);
                let encoder = LabelEncoder::fit(all);
                self.check_category_size(&encoder, None)?;
                (
                    encoder.transform(&train_labels)?,
                    encoder.transform(&test_labels)?,
                    encoder.transform(&val_labels)?,
                    encoder.classes().to_vec(),
                )
            }
            LabelFit::PerPartition => {
                let train_enc = LabelEncoder::fit(&train_labels);
                let test_enc  = LabelEncoder::fit(&test_labels);
                let val_enc   = LabelEncoder::fit(&val_labels);
                self.check_category_size(&train_enc, Some(PartitionKind::Train))?;
                self.check_category_size(&test_enc,  Some(PartitionKind::Test))?;
                self.check_category_size(&val_enc,   Some(PartitionKind::Validation))?;

                if train_enc.classes() != test_enc.classes()
                    || train_enc.classes() != val_enc.classes()
                {
                    tracing::warn!(
                        "Per-partition label encoders disagree: train={:?} test={:?} validation={:?}; \
                         the same index may name different labels across partitions",
                        train_enc.classes(),
                        test_enc.classes(),
                        val_enc.classes()
                    );
                }
                (
                    train_enc.transform(&train_labels)?,
                    test_enc.transform(&test_labels)?,
                    val_enc.transform(&val_labels)?,
                    train_enc.classes().to_vec(),
                )
            }
        };

        Ok(Partitions {
            train_x,
            train_y: one_hot(&train_idx, opts.category_size)?,
            test_x,
            test_y,
            val_x,
            val_y: one_hot(&val_idx, opts.category_size)?,
            classes,
        })
    }

    fn check_category_size(
        &self,
        encoder:   &LabelEncoder,
        partition: Option<PartitionKind>,
    ) -> PipelineResult<()> {
        let observed = encoder.len();
        if self.options.category_size < observed {
            let scope = partition
                .map(|p| format!(" in the {p} partition"))
                .unwrap_or_default();
            return Err(PipelineError::Config(format!(
                "category_size is {} but {} distinct labels were observed{}: {:?}",
                self.options.category_size,
                observed,
                scope,
                encoder.classes()
            )));
        }
        Ok(())
    }
}
