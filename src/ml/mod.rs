// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds, trains or runs a Burn module.
//
//   model.rs      — BiLSTM and TextCNN classifiers behind the
//                   TextClassifier trait, loss and accuracy
//   trainer.rs    — Adam epoch loop with validation, metrics
//                   and best-only checkpointing
//   inferencer.rs — batched probability prediction
//   evaluator.rs  — accuracy, classification report and
//                   predicted-class counts
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Classifier architectures
pub mod model;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Batched prediction over padded sequences
pub mod inferencer;

/// Test-set scoring and report
pub mod evaluator;
