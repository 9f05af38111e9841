// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe what the pipeline works on:
// labelled examples, partitions, and the error taxonomy.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A labelled text example and the partitions that hold them
pub mod example;

// Error taxonomy shared by the data and embedding pipeline
pub mod errors;

// Core abstractions (traits) that other layers implement
pub mod traits;
