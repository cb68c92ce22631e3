/*!
Page-level metrics. A page's ordered token list is one sequence. Two reductions are computed
over the pages, and they measure different things: the exact-match rate of the flat labels and
the mean of the per-page entity F1. The distribution of the per-page token accuracy and token
macro F1 is reported next to them.
*/
use crate::error::Result;
use crate::metrics::{
    mean_or_zero, precision_recall_fscore_support, ratio, ClassCounts, DivByZeroStrat,
};
use crate::reporter::Average;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Raw counts of one page. Only counts are stored, so the page scores of many files can be pooled
/// without loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PageScore {
    pub page_id: String,
    /// Number of tokens of the page.
    pub tokens: usize,
    /// Number of tokens whose prefix-stripped predicted label equals the prefix-stripped true
    /// label.
    pub correct: usize,
    pub gold_spans: usize,
    pub pred_spans: usize,
    /// Number of predicted spans that exactly match a gold span.
    pub matched_spans: usize,
    /// Per-class counts of the labels as recorded, over the tokens of the page.
    pub label_counts: ClassCounts,
}

impl PageScore {
    /// True when every token of the page is correctly labelled.
    pub fn exact_match(&self) -> bool {
        self.correct == self.tokens
    }

    pub fn accuracy(&self, zero_division: DivByZeroStrat) -> Result<f64> {
        ratio(self.correct, self.tokens, zero_division)
    }

    /// Entity F1 of the page, `2 * matched / (gold + predicted)`. A page without any span on
    /// either side is a `0 / 0` division, resolved by `zero_division`.
    pub fn entity_f1(&self, zero_division: DivByZeroStrat) -> Result<f64> {
        ratio(
            2 * self.matched_spans,
            self.gold_spans + self.pred_spans,
            zero_division,
        )
    }

    /// Macro F1 of the labels as recorded, over the classes seen on the page.
    pub fn token_f1_macro(&self, zero_division: DivByZeroStrat) -> Result<f64> {
        let (_, _, f1, _) = precision_recall_fscore_support(
            &self.label_counts,
            Average::Macro,
            zero_division,
            false,
        )?;
        Ok(f1[0])
    }
}

fn population_std(values: &Array1<f64>) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.std(0.0)
    }
}

/// Reduction of a list of page scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub pages: usize,
    /// Number of perfectly labelled pages.
    pub exact_matches: usize,
    /// Mean over the pages of the exact match indicator.
    pub sequence_accuracy: f64,
    /// Mean over the pages of their entity F1.
    pub sequence_f1: f64,
    pub page_accuracy_mean: f64,
    /// Population standard deviation of the per-page token accuracy.
    pub page_accuracy_std: f64,
    /// Mean over the pages of their token macro F1.
    pub page_f1_mean: f64,
    /// Population standard deviation of the per-page token macro F1.
    pub page_f1_std: f64,
}

/// Reduces the page scores. Every page weighs the same, whatever its number of tokens. Without
/// pages, every metric is `0`.
///
/// * `pages`: Page scores, in any order.
/// * `zero_division`: What to do with a page without tokens or without spans.
pub fn sequence_report(
    pages: &[PageScore],
    zero_division: DivByZeroStrat,
) -> Result<SequenceReport> {
    let exact: Array1<f64> = pages
        .iter()
        .map(|p| if p.exact_match() { 1.0 } else { 0.0 })
        .collect();
    let f1 = pages
        .iter()
        .map(|p| p.entity_f1(zero_division))
        .collect::<Result<Array1<f64>>>()?;
    let accuracies = pages
        .iter()
        .map(|p| p.accuracy(zero_division))
        .collect::<Result<Array1<f64>>>()?;
    let token_f1 = pages
        .iter()
        .map(|p| p.token_f1_macro(zero_division))
        .collect::<Result<Array1<f64>>>()?;
    Ok(SequenceReport {
        pages: pages.len(),
        exact_matches: pages.iter().filter(|p| p.exact_match()).count(),
        sequence_accuracy: mean_or_zero(exact.view()),
        sequence_f1: mean_or_zero(f1.view()),
        page_accuracy_mean: mean_or_zero(accuracies.view()),
        page_accuracy_std: population_std(&accuracies),
        page_f1_mean: mean_or_zero(token_f1.view()),
        page_f1_std: population_std(&token_f1),
    })
}
