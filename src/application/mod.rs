// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for one goal at a time.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Load, tokenize and align embeddings (shared by both workflows)
pub mod prepare_use_case;

// The full training + evaluation workflow
pub mod train_use_case;
