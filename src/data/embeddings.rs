// ============================================================
// Layer 4 — Pretrained Embeddings
// ============================================================
// Reads a word-vector text file (GloVe style) and aligns it
// with the vocabulary:
//
//   embedding file            vocabulary         matrix
//   ──────────────            ──────────         ──────
//   "dog 1.0 0.0 …"     ─┐    cat → 1      row 0: zeros (padding)
//   "fish 0.3 …"         ├─►  dog → 2  ─►  row 1: zeros (no vector)
//   …                   ─┘                 row 2: dog's vector
//
// Every line must be one token followed by exactly `dim`
// floats. A single bad line fails the whole read, so a matrix
// is never built from a partially parsed file. Tokens that
// are not in the vocabulary are validated and then dropped.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::data::tokenizer::Vocabulary;
use crate::domain::errors::{PipelineError, PipelineResult};

/// Dimension of the pretrained vectors the pipeline ships with.
pub const EMBEDDING_DIM: usize = 300;

/// Dense row-major matrix: one row per vocabulary id, row 0 for padding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    rows:   usize,
    dim:    usize,
    values: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self { rows, dim, values: vec![0.0; rows * dim] }
    }

    pub fn rows(&self) -> usize { self.rows }

    pub fn dim(&self) -> usize { self.dim }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.dim..(i + 1) * self.dim]
    }

    pub fn set_row(&mut self, i: usize, vector: &[f32]) {
        self.row_mut(i).copy_from_slice(vector);
    }

    fn row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.values[i * self.dim..(i + 1) * self.dim]
    }

    /// All values, row after row.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// True when the buffer length agrees with the declared shape.
    pub fn is_consistent(&self) -> bool {
        self.rows.checked_mul(self.dim) == Some(self.values.len())
    }

    /// Number of rows past the padding row that hold a non-zero vector.
    pub fn covered_rows(&self) -> usize {
        (1..self.rows)
            .filter(|&i| self.row(i).iter().any(|&v| v != 0.0))
            .count()
    }
}

/// Parse `path` into token → vector, keeping only tokens in `vocabulary`.
pub fn read_embedding_table(
    path:       &Path,
    dim:        usize,
    vocabulary: &Vocabulary,
) -> PipelineResult<HashMap<String, Vec<f32>>> {
    let file_error = |line: Option<usize>, reason: String| PipelineError::EmbeddingFile {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let file = File::open(path).map_err(|e| file_error(None, format!("cannot open: {e}")))?;
    let reader = BufReader::new(file);

    let mut table = HashMap::new();
    let mut seen  = 0usize;

    for (n, line) in reader.lines().enumerate() {
        let line_no = n + 1;
        let line = line.map_err(|e| file_error(Some(line_no), format!("cannot read: {e}")))?;

        let mut parts = line.split_whitespace();
        let Some(token) = parts.next() else {
            continue;
        };

        let vector = parts
            .map(str::parse::<f32>)
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|e| file_error(Some(line_no), format!("invalid component for '{token}': {e}")))?;
        if vector.len() != dim {
            return Err(file_error(
                Some(line_no),
                format!("expected {dim} components for '{token}', found {}", vector.len()),
            ));
        }

        seen += 1;
        if vocabulary.get(token).is_some() {
            // Later duplicates replace earlier ones
            table.insert(token.to_string(), vector);
        }
    }

    tracing::info!(
        "Read {} vectors from '{}', {} match the vocabulary",
        seen,
        path.display(),
        table.len()
    );
    Ok(table)
}

/// Build the (len + 1) × dim matrix; ids without a vector keep zeros.
pub fn align_embeddings(
    vocabulary: &Vocabulary,
    table:      &HashMap<String, Vec<f32>>,
    dim:        usize,
) -> EmbeddingMatrix {
    let mut matrix = EmbeddingMatrix::zeros(vocabulary.len() + 1, dim);
    for (token, id) in vocabulary.iter() {
        if let Some(vector) = table.get(token) {
            matrix.set_row(id as usize, vector);
        }
    }
    matrix
}
