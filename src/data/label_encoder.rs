// ============================================================
// Layer 4 — Label Encoder
// ============================================================
// Maps categorical label strings to integer class indices and
// integer indices to one-hot rows.
//
// Class order is the sorted order of the distinct labels, so
// the same set of labels always produces the same mapping. When
// every label is an integer they sort numerically ("2" < "10"),
// otherwise as strings.
// Two fitting strategies are offered:
//
//   Union        — fit once over every partition's labels and
//                  reuse the mapping everywhere (default)
//   PerPartition — fit a fresh encoder on each partition. If a
//                  partition is missing a label, its indices
//                  shift and no longer line up with the others.
//                  Kept for reproducing earlier runs.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::domain::errors::{PipelineError, PipelineResult};

/// How label encoders are fit across partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelFit {
    #[default]
    Union,
    PerPartition,
}

impl FromStr for LabelFit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "union"         => Ok(LabelFit::Union),
            "per-partition" => Ok(LabelFit::PerPartition),
            other => Err(format!("unknown label fit '{other}' (expected union or per-partition)")),
        }
    }
}

impl fmt::Display for LabelFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelFit::Union        => f.write_str("union"),
            LabelFit::PerPartition => f.write_str("per-partition"),
        }
    }
}

/// Sorted list of distinct labels; a label's position is its class index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
    index:   HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn fit<I>(labels: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let distinct: BTreeSet<String> = labels
            .into_iter()
            .map(|l| l.as_ref().to_string())
            .collect();
        let mut classes: Vec<String> = distinct.into_iter().collect();

        let numeric: Option<Vec<i64>> = classes.iter().map(|c| c.trim().parse().ok()).collect();
        if let Some(values) = numeric {
            let mut keyed: Vec<(i64, String)> = values.into_iter().zip(classes).collect();
            // Ties ("1" vs "01") keep string order
            keyed.sort();
            classes = keyed.into_iter().map(|(_, c)| c).collect();
        }

        let index = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self { classes, index }
    }

    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> PipelineResult<Vec<usize>> {
        labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                self.index.get(label).copied().ok_or_else(|| {
                    PipelineError::Config(format!(
                        "label '{label}' was not seen when the encoder was fit"
                    ))
                })
            })
            .collect()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}

/// Expand class indices into one-hot rows of the given width.
pub fn one_hot(indices: &[usize], width: usize) -> PipelineResult<Vec<Vec<f32>>> {
    indices
        .iter()
        .map(|&idx| {
            if idx >= width {
                return Err(PipelineError::Config(format!(
                    "class index {idx} does not fit in {width} categories"
                )));
            }
            let mut row = vec![0.0f32; width];
            row[idx] = 1.0;
            Ok(row)
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_are_sorted_and_distinct() {
        let enc = LabelEncoder::fit(["sad", "happy", "sad", "angry"]);
        assert_eq!(enc.classes(), &["angry", "happy", "sad"]);
        assert_eq!(enc.transform(&["sad", "angry"]).unwrap(), vec![2, 0]);
    }

    #[test]
    fn test_integer_labels_sort_numerically() {
        let labels: Vec<String> = (0..12).rev().map(|i| i.to_string()).collect();
        let enc = LabelEncoder::fit(&labels);
        let expected: Vec<String> = (0..12).map(|i| i.to_string()).collect();
        assert_eq!(enc.classes(), expected.as_slice());
        assert_eq!(enc.transform(&["2", "10"]).unwrap(), vec![2, 10]);
    }

    #[test]
    fn test_mixed_labels_fall_back_to_string_order() {
        let enc = LabelEncoder::fit(["10", "2", "x"]);
        assert_eq!(enc.classes(), &["10", "2", "x"]);
    }

    #[test]
    fn test_unseen_label_is_rejected() {
        let enc = LabelEncoder::fit(["a", "b"]);
        assert!(matches!(enc.transform(&["c"]), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_one_hot_rows() {
        let rows = one_hot(&[0, 2], 4).unwrap();
        assert_eq!(rows[0], vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(rows[1], vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_one_hot_index_out_of_range() {
        assert!(one_hot(&[4], 4).is_err());
    }

    #[test]
    fn test_label_fit_parses_cli_names() {
        assert_eq!("per-partition".parse::<LabelFit>().unwrap(), LabelFit::PerPartition);
        assert_eq!(LabelFit::Union.to_string(), "union");
        assert!("both".parse::<LabelFit>().is_err());
    }
}
