// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits so the
// concrete sources (CSV files today) can be swapped without
// touching the pipeline.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::errors::PipelineResult;
use crate::domain::example::Example;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can produce labelled examples.
///
/// Implementations:
///   - CsvExampleSource → one CSV file with a text and a label column
pub trait ExampleSource {
    /// Load every example, in file order.
    fn load_examples(&self) -> PipelineResult<Vec<Example>>;
}
