/*!
Sparse confusion matrix over the observed labels. Rows are true labels and columns predicted
labels. Only the cells that were hit are stored; a dense `Array2` is built on demand for a
caller-supplied label order.
*/
use crate::metrics::{ClassCounts, Counts};
use ndarray::Array2;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// Number of true labels listed by `ErrorAnalysis::most_confused_labels`.
const MOST_CONFUSED_LABELS: usize = 10;

/// A `(true_label, pred_label) -> count` cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConfusionPair {
    pub true_label: String,
    pub pred_label: String,
    pub count: usize,
}

/// Number of errors made on the tokens of a true label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LabelErrors {
    pub label: String,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfusionMatrix {
    rows: BTreeMap<String, BTreeMap<String, usize>>,
}

impl ConfusionMatrix {
    pub fn record<S: AsRef<str>, T: AsRef<str>>(&mut self, true_label: S, pred_label: T) {
        self.add(true_label, pred_label, 1)
    }

    pub fn add<S: AsRef<str>, T: AsRef<str>>(
        &mut self,
        true_label: S,
        pred_label: T,
        count: usize,
    ) {
        if count == 0 {
            return;
        }
        *self
            .rows
            .entry(String::from(true_label.as_ref()))
            .or_default()
            .entry(String::from(pred_label.as_ref()))
            .or_default() += count;
    }

    /// Count of a cell; `0` for a cell that was never hit.
    pub fn get<S: AsRef<str>, T: AsRef<str>>(&self, true_label: S, pred_label: T) -> usize {
        self.rows
            .get(true_label.as_ref())
            .and_then(|row| row.get(pred_label.as_ref()))
            .copied()
            .unwrap_or(0)
    }

    pub fn merge(&mut self, other: &ConfusionMatrix) {
        for cell in other.cells() {
            self.add(cell.true_label, cell.pred_label, cell.count);
        }
    }

    /// Iterates over the non-empty cells, ordered by true label then predicted label.
    pub fn cells(&self) -> impl Iterator<Item = ConfusionPair> + '_ {
        self.rows.iter().flat_map(|(true_label, row)| {
            row.iter().map(move |(pred_label, count)| ConfusionPair {
                true_label: true_label.clone(),
                pred_label: pred_label.clone(),
                count: *count,
            })
        })
    }

    pub fn total(&self) -> usize {
        self.rows.values().flat_map(|row| row.values()).sum()
    }

    /// Sum of the diagonal.
    pub fn correct(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|(label, row)| row.get(label))
            .sum()
    }

    pub fn errors(&self) -> usize {
        self.total() - self.correct()
    }

    /// Support of a true label.
    pub fn row_sum<S: AsRef<str>>(&self, true_label: S) -> usize {
        self.rows
            .get(true_label.as_ref())
            .map(|row| row.values().sum())
            .unwrap_or(0)
    }

    /// Every label observed as a true or a predicted label.
    pub fn labels(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .flat_map(|(true_label, row)| {
                std::iter::once(true_label.as_str()).chain(row.keys().map(String::as_str))
            })
            .collect()
    }

    /// Per-class counts: the row sums are the supports, the column sums the predictions and the
    /// diagonal the true positives.
    pub fn class_counts(&self) -> ClassCounts {
        let mut counts = ClassCounts::default();
        for cell in self.cells() {
            let correct = usize::from(cell.true_label == cell.pred_label);
            counts.add(&cell.true_label, Counts::new(correct * cell.count, 0, cell.count));
            counts.add(&cell.pred_label, Counts::new(0, cell.count, 0));
        }
        counts
    }

    /// Dense projection over `labels`: `result[[i, j]]` counts the tokens of true label
    /// `labels[i]` predicted as `labels[j]`. Cells involving a label outside of `labels` are left
    /// out.
    pub fn dense<S: AsRef<str>>(&self, labels: &[S]) -> Array2<usize> {
        Array2::from_shape_fn((labels.len(), labels.len()), |(i, j)| {
            self.get(labels[i].as_ref(), labels[j].as_ref())
        })
    }

    /// The `n` most frequent off-diagonal cells, by descending count. Ties are broken by the
    /// lexical order of the `(true_label, pred_label)` pair.
    pub fn top_confusions(&self, n: usize) -> Vec<ConfusionPair> {
        let mut errors: Vec<ConfusionPair> = self
            .cells()
            .filter(|c| c.true_label != c.pred_label)
            .collect();
        // stable sort: ties keep the lexical order of `cells`
        errors.sort_by_key(|c| Reverse(c.count));
        errors.truncate(n);
        errors
    }

    /// True labels ranked by their number of errors, ties broken by lexical order.
    pub fn most_confused_labels(&self, n: usize) -> Vec<LabelErrors> {
        let mut labels: Vec<LabelErrors> = self
            .rows
            .iter()
            .map(|(label, row)| LabelErrors {
                label: label.clone(),
                errors: row
                    .iter()
                    .filter(|(pred, _)| *pred != label)
                    .map(|(_, count)| count)
                    .sum(),
            })
            .filter(|l| l.errors > 0)
            .collect();
        labels.sort_by_key(|l| Reverse(l.errors));
        labels.truncate(n);
        labels
    }

    pub fn error_analysis(&self, n: usize) -> ErrorAnalysis {
        let total = self.total();
        let total_errors = self.errors();
        let error_rate = if total == 0 {
            0.0
        } else {
            total_errors as f64 / total as f64
        };
        ErrorAnalysis {
            total_errors,
            error_rate,
            top_confusions: self.top_confusions(n),
            most_confused_labels: self.most_confused_labels(MOST_CONFUSED_LABELS),
        }
    }
}

/// Serialized as the list of its non-empty cells.
impl Serialize for ConfusionMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let cells: Vec<ConfusionPair> = self.cells().collect();
        let mut seq = serializer.serialize_seq(Some(cells.len()))?;
        for cell in cells.iter() {
            seq.serialize_element(cell)?;
        }
        seq.end()
    }
}

/// Summary of the errors of one confusion matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorAnalysis {
    pub total_errors: usize,
    /// `total_errors` over the number of compared tokens, `0` without tokens.
    pub error_rate: f64,
    pub top_confusions: Vec<ConfusionPair>,
    pub most_confused_labels: Vec<LabelErrors>,
}
