// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and Adam.
//
//   - Training runs on MyBackend (Autodiff<Wgpu>)
//   - model.valid() drops autodiff for validation, which also
//     switches spatial dropout off
//   - Loss is categorical cross-entropy on one-hot targets
//   - After every epoch: metrics row in metrics.csv, and a
//     checkpoint only if validation accuracy improved
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::ClassificationBatcher,
    dataset::ClassificationDataset,
    embeddings::EmbeddingMatrix,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::{
    categorical_cross_entropy, correct_predictions, Architecture, BiLstmClassifierConfig,
    TextClassifier, TextCnnClassifierConfig, TrainedClassifier,
};

pub type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type MyInnerBackend = burn::backend::Wgpu;

/// Build the configured architecture, train it, and return the
/// final model on the inner backend.
pub fn run_training(
    cfg:           &TrainConfig,
    embedding:     &EmbeddingMatrix,
    seq_len:       usize,
    train_dataset: ClassificationDataset,
    val_dataset:   ClassificationDataset,
    ckpt_manager:  &mut CheckpointManager,
    metrics:       &MetricsLogger,
) -> Result<TrainedClassifier<MyInnerBackend>> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    match cfg.architecture {
        Architecture::Lstm => {
            let model = BiLstmClassifierConfig::new(cfg.category_count)
                .init::<MyBackend>(embedding, &device);
            tracing::info!("Model ready: BiLSTM, seq_len={}, classes={}", seq_len, cfg.category_count);
            let trained = train_loop(cfg, model, train_dataset, val_dataset, ckpt_manager, metrics, &device)?;
            Ok(TrainedClassifier::Lstm(trained))
        }
        Architecture::Cnn => {
            let model = TextCnnClassifierConfig::new(seq_len, cfg.category_count)
                .init::<MyBackend>(embedding, &device)?;
            tracing::info!("Model ready: TextCNN, seq_len={}, classes={}", seq_len, cfg.category_count);
            let trained = train_loop(cfg, model, train_dataset, val_dataset, ckpt_manager, metrics, &device)?;
            Ok(TrainedClassifier::Cnn(trained))
        }
    }
}

pub(crate) fn train_loop<B, M>(
    cfg:           &TrainConfig,
    mut model:     M,
    train_dataset: ClassificationDataset,
    val_dataset:   ClassificationDataset,
    ckpt_manager:  &mut CheckpointManager,
    metrics:       &MetricsLogger,
    device:        &B::Device,
) -> Result<M::InnerModule>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + TextClassifier<B>,
    M::InnerModule: TextClassifier<B::InnerBackend>,
{
    let mut optim = AdamConfig::new().init();

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = ClassificationBatcher::<B>::new(device.clone());
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let val_batcher = ClassificationBatcher::<B::InnerBackend>::new(device.clone());
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;
        let mut train_correct  = 0usize;
        let mut train_total    = 0usize;

        for batch in train_loader.iter() {
            let logits = model.forward(batch.token_ids);
            let loss   = categorical_cross_entropy(logits.clone(), batch.targets.clone());

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;
            train_total    += batch.targets.dims()[0];
            train_correct  += correct_predictions(logits, batch.targets);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum = 0.0f64;
        let mut val_batches  = 0usize;
        let mut val_correct  = 0usize;
        let mut val_total    = 0usize;

        for batch in val_loader.iter() {
            let logits = model_valid.forward(batch.token_ids);
            val_loss_sum += categorical_cross_entropy(logits.clone(), batch.targets.clone())
                .into_scalar()
                .elem::<f64>();
            val_batches += 1;
            val_total   += batch.targets.dims()[0];
            val_correct += correct_predictions(logits, batch.targets);
        }

        let m = EpochMetrics::new(
            epoch,
            ratio_or(train_loss_sum, train_batches as f64, f64::NAN),
            ratio_or(train_correct as f64, train_total as f64, 0.0),
            ratio_or(val_loss_sum, val_batches as f64, f64::NAN),
            ratio_or(val_correct as f64, val_total as f64, 0.0),
        );

        println!(
            "Epoch {:>3}/{} | loss={:.4} | acc={:.4} | val_loss={:.4} | val_acc={:.4}",
            epoch, cfg.epochs, m.train_loss, m.train_acc, m.val_loss, m.val_acc,
        );
        metrics.log(&m)?;
        ckpt_manager.save_if_improved::<B::InnerBackend, _>(&model_valid, epoch, m.val_acc)?;
    }

    tracing::info!("Training complete!");
    Ok(model.valid())
}

fn ratio_or(num: f64, den: f64, empty: f64) -> f64 {
    if den > 0.0 { num / den } else { empty }
}
