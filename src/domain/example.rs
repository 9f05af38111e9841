// ============================================================
// Layer 3 — Example Domain Type
// ============================================================
// One labelled short text, as read from a tabular source.
// Examples are immutable once loaded: every later stage
// (split, tokenise, encode) produces new values instead of
// editing these in place.

use serde::{Deserialize, Serialize};

/// A raw (text, label) pair from one row of a CSV file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// The raw text column, before any normalisation
    pub text: String,

    /// The categorical label exactly as it appears in the file
    pub label: String,
}

impl Example {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text:  text.into(),
            label: label.into(),
        }
    }
}

/// The three disjoint dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionKind {
    Train,
    Validation,
    Test,
}

impl std::fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PartitionKind::Train      => "train",
            PartitionKind::Validation => "validation",
            PartitionKind::Test       => "test",
        };
        f.write_str(name)
    }
}

/// Splits a slice of examples into parallel text and label columns.
pub fn unzip_examples(examples: &[Example]) -> (Vec<String>, Vec<String>) {
    examples
        .iter()
        .map(|e| (e.text.clone(), e.label.clone()))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unzip_keeps_row_order() {
        let rows = vec![Example::new("hi there", "happy"), Example::new("ugh", "angry")];
        let (texts, labels) = unzip_examples(&rows);
        assert_eq!(texts,  vec!["hi there", "ugh"]);
        assert_eq!(labels, vec!["happy", "angry"]);
    }

    #[test]
    fn test_partition_display() {
        assert_eq!(PartitionKind::Validation.to_string(), "validation");
    }
}
