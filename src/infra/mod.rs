// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence concerns:
//
//   embedding_store.rs — Embedding alignment with an on-disk
//                        cache (content-addressed or fixed
//                        path), checksummed and written
//                        atomically.
//
//   checkpoint.rs      — Best-only model checkpoints using
//                        Burn's CompactRecorder, plus the
//                        run's config as JSON.
//
//   metrics.rs         — Epoch metrics appended to a CSV file.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Embedding matrix cache and aligner
pub mod embedding_store;

/// Model checkpoint saving
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
