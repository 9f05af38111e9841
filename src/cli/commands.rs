// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands: `train` and `prepare`.
//
// `prepare` takes the data flags only; `train` flattens the same
// group and adds the model and optimiser flags. Defaults are the
// values of the reference run (4 categories, 3 epochs, batch 32).
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    embeddings::EMBEDDING_DIM,
    label_encoder::LabelFit,
    tokenizer::{IndexOrder, DEFAULT_EXCLUDED_CHARS},
};
use crate::infra::embedding_store::CacheMode;
use crate::ml::model::Architecture;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a classifier and evaluate it on the test file
    Train(TrainArgs),

    /// Load, tokenize and align embeddings, then print statistics
    Prepare(DataArgs),
}

/// Inputs, tokenization and embedding cache.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Training CSV (split 90/10 into train and validation)
    #[arg(long, default_value = "./data/train.csv")]
    pub train_path: String,

    /// Test CSV, used only for the final evaluation
    #[arg(long, default_value = "./data/test.csv")]
    pub test_path: String,

    /// Pretrained vectors, one `token v1 .. vN` entry per line
    #[arg(long, default_value = "../embedding/glove.840B.300d.txt")]
    pub embedding_path: String,

    /// Where the aligned embedding matrix is cached
    #[arg(long, default_value = "embedding.bin")]
    pub cache_path: String,

    /// `content-addressed` rebuilds when vocabulary or source change;
    /// `fixed` always reuses an existing artifact
    #[arg(long, default_value_t = CacheMode::ContentAddressed)]
    pub cache_mode: CacheMode,

    #[arg(long, default_value = "turn3")]
    pub text_column: String,

    #[arg(long, default_value = "label")]
    pub label_column: String,

    /// Number of output classes (one-hot width)
    #[arg(long, default_value_t = 4)]
    pub category_count: usize,

    /// Fraction of the training file held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub val_fraction: f64,

    /// Seed for the train/validation split and batch shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// `union` fits one label encoder on every partition;
    /// `per-partition` fits one per partition
    #[arg(long, default_value_t = LabelFit::Union)]
    pub label_fit: LabelFit,

    /// `insertion` (first seen) or `frequency` (most common first)
    #[arg(long, default_value_t = IndexOrder::Insertion)]
    pub index_order: IndexOrder,

    /// Keep the original letter case
    #[arg(long)]
    pub keep_case: bool,

    /// Characters replaced by a space before splitting
    #[arg(long, default_value = DEFAULT_EXCLUDED_CHARS)]
    pub excluded_chars: String,

    #[arg(long, default_value_t = EMBEDDING_DIM)]
    pub embedding_dim: usize,

    /// Comma-separated class names for the report, by class index
    #[arg(long, value_delimiter = ',')]
    pub target_names: Option<Vec<String>>,
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Directory for checkpoints, train_config.json and metrics.csv
    #[arg(long, default_value = "./model/")]
    pub model_dir: String,

    /// `lstm` (stacked BiLSTM) or `cnn` (TextCNN)
    #[arg(long, default_value_t = Architecture::Lstm)]
    pub architecture: Architecture,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,
}

/// The application layer never sees clap types.
impl From<DataArgs> for TrainConfig {
    fn from(a: DataArgs) -> Self {
        TrainConfig {
            train_path:     a.train_path,
            test_path:      a.test_path,
            embedding_path: a.embedding_path,
            cache_path:     a.cache_path,
            cache_mode:     a.cache_mode,
            text_column:    a.text_column,
            label_column:   a.label_column,
            category_count: a.category_count,
            val_fraction:   a.val_fraction,
            seed:           a.seed,
            label_fit:      a.label_fit,
            index_order:    a.index_order,
            lowercase:      !a.keep_case,
            excluded_chars: a.excluded_chars,
            embedding_dim:  a.embedding_dim,
            target_names:   a.target_names,
            ..TrainConfig::default()
        }
    }
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            model_dir:    a.model_dir,
            architecture: a.architecture,
            epochs:       a.epochs,
            batch_size:   a.batch_size,
            lr:           a.lr,
            ..a.data.into()
        }
    }
}
