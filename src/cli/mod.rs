// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and prints results. All work is
// delegated to Layer 2 (application).
//
//   1. `train`   — train, checkpoint, evaluate on the test file
//   2. `prepare` — data + embedding preparation only
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, DataArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "text-classifier",
    version = "0.1.0",
    about = "Train a BiLSTM or TextCNN text classifier on pretrained word embeddings."
)]
pub struct Cli {
    /// The subcommand to run (train or prepare)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the matching use case; never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Prepare(args) => run_prepare(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!(
        "Training {} on '{}', checkpoints in '{}'",
        args.architecture,
        args.data.train_path,
        args.model_dir
    );

    let evaluation = TrainUseCase::new(args.into()).execute()?;
    println!("{evaluation}");
    Ok(())
}

fn run_prepare(args: DataArgs) -> Result<()> {
    use crate::application::prepare_use_case::PrepareUseCase;

    let prepared = PrepareUseCase::new(args.into()).execute()?;
    println!("{prepared}");
    Ok(())
}
