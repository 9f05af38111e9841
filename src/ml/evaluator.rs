// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Turns predicted probabilities into a console report:
//
//   Accuracy: 71.25%
//                 precision    recall  f1-score   support
//
//           angry     0.7500    0.6000    0.6667         5
//           happy     ...
//
//        accuracy                         0.7125        80
//       macro avg     ...
//    weighted avg     ...
//
//   [0 1 2 3]
//   [12 30 21 17]
//
// Any zero denominator yields 0.0.

use std::{collections::BTreeMap, fmt};

/// Index of the largest value in each row (first wins on ties).
pub fn argmax_rows(probs: &[Vec<f32>]) -> Vec<usize> {
    probs
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                .0
        })
        .collect()
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    pub name:      String,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    pub support:   usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes:  Vec<ClassScores>,
    pub accuracy: f64,
    pub total:    usize,
}

impl ClassificationReport {
    /// Scores every label seen in either `y_true` or `y_pred`, ascending.
    /// Labels without a display name are shown by index.
    pub fn compute(y_true: &[usize], y_pred: &[usize], names: &[String]) -> Self {
        let mut labels: Vec<usize> = y_true.iter().chain(y_pred).copied().collect();
        labels.sort_unstable();
        labels.dedup();

        let classes = labels
            .into_iter()
            .map(|label| {
                let mut tp = 0usize;
                let mut fp = 0usize;
                let mut fn_ = 0usize;
                for (&t, &p) in y_true.iter().zip(y_pred) {
                    match (t == label, p == label) {
                        (true, true)  => tp += 1,
                        (false, true) => fp += 1,
                        (true, false) => fn_ += 1,
                        _ => {}
                    }
                }
                let precision = safe_div(tp as f64, (tp + fp) as f64);
                let recall    = safe_div(tp as f64, (tp + fn_) as f64);
                ClassScores {
                    name: names.get(label).cloned().unwrap_or_else(|| label.to_string()),
                    precision,
                    recall,
                    f1: safe_div(2.0 * precision * recall, precision + recall),
                    support: tp + fn_,
                }
            })
            .collect();

        let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
        Self {
            classes,
            accuracy: safe_div(correct as f64, y_true.len() as f64),
            total: y_true.len(),
        }
    }

    /// Unweighted mean of (precision, recall, f1) over classes.
    pub fn macro_avg(&self) -> (f64, f64, f64) {
        let n = self.classes.len() as f64;
        let (p, r, f) = self.sums(|_| 1.0);
        (safe_div(p, n), safe_div(r, n), safe_div(f, n))
    }

    /// Support-weighted mean of (precision, recall, f1).
    pub fn weighted_avg(&self) -> (f64, f64, f64) {
        let total = self.total as f64;
        let (p, r, f) = self.sums(|c| c.support as f64);
        (safe_div(p, total), safe_div(r, total), safe_div(f, total))
    }

    fn sums(&self, weight: impl Fn(&ClassScores) -> f64) -> (f64, f64, f64) {
        self.classes.iter().fold((0.0, 0.0, 0.0), |(p, r, f), c| {
            let w = weight(c);
            (p + w * c.precision, r + w * c.recall, f + w * c.f1)
        })
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.name.chars().count())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(f, "{:>width$} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                c.name, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>width$} {:>9} {:>9} {:>9.4} {:>9}", "accuracy", "", "", self.accuracy, self.total)?;

        let (p, r, f1) = self.macro_avg();
        writeln!(f, "{:>width$} {:>9.4} {:>9.4} {:>9.4} {:>9}", "macro avg", p, r, f1, self.total)?;
        let (p, r, f1) = self.weighted_avg();
        write!(f, "{:>width$} {:>9.4} {:>9.4} {:>9.4} {:>9}", "weighted avg", p, r, f1, self.total)
    }
}

// ─── Evaluation ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Fraction in [0, 1]; displayed as a percentage
    pub accuracy:         f64,
    pub report:           ClassificationReport,
    pub predicted_counts: BTreeMap<usize, usize>,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy: {:.2}%", self.accuracy * 100.0)?;
        writeln!(f, "{}", self.report)?;
        writeln!(f)?;
        let join = |items: Vec<String>| items.join(" ");
        writeln!(f, "[{}]", join(self.predicted_counts.keys().map(|k| k.to_string()).collect()))?;
        write!(f, "[{}]", join(self.predicted_counts.values().map(|v| v.to_string()).collect()))
    }
}

/// Score predicted probabilities against integer labels.
pub fn evaluate(probs: &[Vec<f32>], y_true: &[usize], names: &[String]) -> Evaluation {
    let y_pred = argmax_rows(probs);
    let report = ClassificationReport::compute(y_true, &y_pred, names);

    let mut predicted_counts = BTreeMap::new();
    for &p in &y_pred {
        *predicted_counts.entry(p).or_insert(0) += 1;
    }

    tracing::info!("Test accuracy: {:.4} over {} rows", report.accuracy, report.total);
    Evaluation { accuracy: report.accuracy, report, predicted_counts }
}
