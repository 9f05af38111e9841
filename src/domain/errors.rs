use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the preprocessing and embedding pipeline.
///
/// Training and inference errors from Burn are not wrapped here;
/// they propagate through `anyhow` in the application layer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing column or malformed row in a tabular input.
    #[error("data format error in '{path}': {reason}")]
    DataFormat { path: PathBuf, reason: String },

    /// Configuration that cannot describe the observed data.
    #[error("configuration error: {0}")]
    Config(String),

    /// No text produced a single vocabulary token.
    #[error("empty vocabulary: no example contains a token after filtering")]
    EmptyVocabulary,

    /// Missing embedding file or a line that is not `token v1 .. vN`.
    #[error("embedding file error in '{path}'{}: {reason}", line_suffix(.line))]
    EmbeddingFile {
        path:   PathBuf,
        line:   Option<usize>,
        reason: String,
    },

    /// Unreadable or corrupt cache artifact. Handled inside the aligner.
    #[error("embedding cache error at '{path}': {reason}")]
    CacheIo { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" (line {n})"),
        None    => String::new(),
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_mentions_line() {
        let err = PipelineError::EmbeddingFile {
            path:   PathBuf::from("glove.txt"),
            line:   Some(7),
            reason: "expected 300 components, found 2".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("glove.txt"));
        assert!(msg.contains("line 7"));
    }

    #[test]
    fn test_embedding_error_without_line() {
        let err = PipelineError::EmbeddingFile {
            path:   PathBuf::from("missing.txt"),
            line:   None,
            reason: "not found".to_string(),
        };
        assert!(!err.to_string().contains("line"));
    }
}
