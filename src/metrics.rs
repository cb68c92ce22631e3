/**
This module computes the metrics (precision, recall, f-score, support) of one evaluation level from
per-class counts. Counts are plain integers so that they can be summed across pages and files
before any ratio is taken.
*/
use crate::error::{EvalError, Result};
use crate::reporter::{Average, OverallAverage, Reporter};
use enum_iterator::{all, Sequence};
use itertools::multizip;
use ndarray::{prelude::*, Zip};
use ndarray_stats::SummaryStatisticsExt;
use num::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt::Display;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Sequence)]
/// How do we handle a ratio whose denominator is zero (e.g. the precision of a class that was
/// never predicted)? The default, `ReplaceBy0`, defines the ratio as `0.0` and lets it contribute
/// `0` to the macro and weighted averages. `ReturnError` stops the computation.
pub enum DivByZeroStrat {
    /// Returns 0 when the denominator is 0
    #[default]
    ReplaceBy0,
    /// Returns 1 when the denominator is 0
    ReplaceBy1,
    /// Returns an error
    ReturnError,
}

impl Display for DivByZeroStrat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not parse the {0} into a `DivByZeroStrat`")]
pub struct ParsingDivisionByZeroStrategyError(String);

impl FromStr for DivByZeroStrat {
    type Err = ParsingDivisionByZeroStrategyError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "replaceby0" | "replacebyzero" | "zero" => Ok(DivByZeroStrat::ReplaceBy0),
            "replaceby1" | "replacebyone" | "one" => Ok(DivByZeroStrat::ReplaceBy1),
            "returnerror" | "error" => Ok(DivByZeroStrat::ReturnError),
            _ => Err(ParsingDivisionByZeroStrategyError(String::from(s))),
        }
    }
}

/// Raw counts of a single class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counts {
    /// Number of items that were predicted as this class and are of this class.
    pub true_positive: usize,
    /// Number of items predicted as this class.
    pub predicted: usize,
    /// Number of items of this class in the ground truth.
    pub support: usize,
}

impl Counts {
    pub fn new(true_positive: usize, predicted: usize, support: usize) -> Self {
        Self {
            true_positive,
            predicted,
            support,
        }
    }
}

impl Add for Counts {
    type Output = Counts;
    fn add(self, rhs: Self) -> Self::Output {
        Counts {
            true_positive: self.true_positive + rhs.true_positive,
            predicted: self.predicted + rhs.predicted,
            support: self.support + rhs.support,
        }
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs
    }
}

/// Per-class counts of one evaluation level, keyed and ordered by class name. Merging two
/// `ClassCounts` sums them class by class, which is associative and commutative.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassCounts(BTreeMap<String, Counts>);

impl ClassCounts {
    /// Records a single classification decision: `gold` gains one unit of support, `pred` one
    /// prediction, and both agree on a true positive when they are equal.
    pub fn record<S: AsRef<str>, T: AsRef<str>>(&mut self, gold: S, pred: T) {
        let (gold, pred) = (gold.as_ref(), pred.as_ref());
        let gold_counts = self.entry(gold);
        gold_counts.support += 1;
        gold_counts.true_positive += usize::from(gold == pred);
        self.entry(pred).predicted += 1;
    }

    /// Adds counts to a class.
    pub fn add<S: AsRef<str>>(&mut self, class: S, counts: Counts) {
        *self.entry(class.as_ref()) += counts;
    }

    /// Makes sure a class is part of the report, even if it was never observed.
    pub fn declare<S: AsRef<str>>(&mut self, class: S) {
        self.entry(class.as_ref());
    }

    pub fn merge(&mut self, other: &ClassCounts) {
        for (class, counts) in other.iter() {
            self.add(class, *counts);
        }
    }

    pub fn get<S: AsRef<str>>(&self, class: S) -> Option<&Counts> {
        self.0.get(class.as_ref())
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Counts> {
        self.0.iter()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of the counts of every class.
    pub fn total(&self) -> Counts {
        self.0.values().fold(Counts::default(), |acc, c| acc + *c)
    }

    fn entry(&mut self, class: &str) -> &mut Counts {
        self.0.entry(String::from(class)).or_default()
    }

    /// predicted sum, true positive sum and true sum, in class order.
    fn as_arrays(&self) -> ActualTPCorrect<usize> {
        let pred_sum = self.0.values().map(|c| c.predicted).collect();
        let tp_sum = self.0.values().map(|c| c.true_positive).collect();
        let true_sum = self.0.values().map(|c| c.support).collect();
        (pred_sum, tp_sum, true_sum)
    }
}

impl<S: AsRef<str>> FromIterator<(S, Counts)> for ClassCounts {
    fn from_iter<I: IntoIterator<Item = (S, Counts)>>(iter: I) -> Self {
        let mut counts = ClassCounts::default();
        for (class, c) in iter {
            counts.add(class, c);
        }
        counts
    }
}

/// predicted sum, true positive sum and true sum
type ActualTPCorrect<T> = (Array1<T>, Array1<T>, Array1<T>);

/// Type alias for representing the output of `precision_recall_fscore_support`. The first array
/// contains the precision, the second the recall, the third the f-score and the last one the
/// support. With an average other than `None`, each array holds a single element.
pub type PrecisionRecallFScoreTrueSum = (Array1<f64>, Array1<f64>, Array1<f64>, Array1<usize>);

/// Divides `numerator` by `denominator` element-wise, applying the zero-division strategy where
/// the denominator is zero.
fn prf_divide<F: Float + Send + Sync, D: Dimension>(
    numerator: ArrayView<F, D>,
    denominator: ArrayView<F, D>,
    parallel: bool,
    zero_division: DivByZeroStrat,
) -> Result<Array<F, D>> {
    let (mut result, non_zero_mask) = if parallel {
        par_prf_divide_results_and_mask(numerator, denominator)
    } else {
        prf_divide_results_and_mask(numerator, denominator)
    };
    let found_zero = non_zero_mask.iter().any(|non_zero| !non_zero);
    if !found_zero {
        return Ok(result);
    }
    match zero_division {
        DivByZeroStrat::ReturnError => Err(EvalError::DivisionByZero),
        DivByZeroStrat::ReplaceBy0 => Ok(result),
        DivByZeroStrat::ReplaceBy1 => {
            Zip::from(&mut result)
                .and(&non_zero_mask)
                .for_each(|r, &non_zero| {
                    if !non_zero {
                        *r = F::one()
                    }
                });
            Ok(result)
        }
    }
}

/// This function computes the result in parallel. For a synchronous version of this function, see
/// `prf_divide_results_and_mask`. Cells with a zero denominator hold `0` and are `false` in the
/// returned mask.
///
/// * `numerator`: Numerator of the division
/// * `denominator`: Denominator of the division
fn par_prf_divide_results_and_mask<F: Float + Send + Sync, D: Dimension>(
    numerator: ArrayView<F, D>,
    denominator: ArrayView<F, D>,
) -> (Array<F, D>, Array<bool, D>) {
    let non_zero_mask = Zip::from(&denominator).par_map_collect(|d| !d.is_zero());
    let result = Zip::from(&numerator)
        .and(&denominator)
        .par_map_collect(|&n, &d| if d.is_zero() { F::zero() } else { n / d });
    (result, non_zero_mask)
}

/// This function computes the result synchronously. For a parallel version of this function, see
/// `par_prf_divide_results_and_mask`.
///
/// * `numerator`: Numerator of the division
/// * `denominator`: Denominator of the division
fn prf_divide_results_and_mask<F: Float, D: Dimension>(
    numerator: ArrayView<F, D>,
    denominator: ArrayView<F, D>,
) -> (Array<F, D>, Array<bool, D>) {
    let non_zero_mask = denominator.map(|d| !d.is_zero());
    let result = Zip::from(&numerator)
        .and(&denominator)
        .map_collect(|&n, &d| if d.is_zero() { F::zero() } else { n / d });
    (result, non_zero_mask)
}

/// Ratio of two counts under a zero-division strategy. Used for accuracies.
pub(crate) fn ratio(
    numerator: usize,
    denominator: usize,
    zero_division: DivByZeroStrat,
) -> Result<f64> {
    let result = prf_divide(
        array![numerator as f64].view(),
        array![denominator as f64].view(),
        false,
        zero_division,
    )?;
    Ok(result[0])
}

/// Mean of a list of ratios, `0` when the list is empty.
pub(crate) fn mean_or_zero<F: Float + FromPrimitive>(values: ArrayView1<F>) -> F {
    values.mean().unwrap_or_else(F::zero)
}

/// This function computes the precision, recall, fscore and support of every class of `counts`,
/// or one of their averages.
///
/// * `counts`: Per-class counts.
/// * `average`: What type of average to use. `Micro` pools the counts of every class, `Macro` is
///   the unweighted mean of the per-class scores and `Weighted` is their mean weighted by support.
/// * `zero_division`: What to do in case of division by zero.
/// * `parallel`: Can we use multiple cores for the array computations?
///
/// The fscore is computed as `2 * tp / (predicted + support)`, the F1 score, so that the micro
/// fscore of a single-label classification is exactly its accuracy.
pub fn precision_recall_fscore_support(
    counts: &ClassCounts,
    average: Average,
    zero_division: DivByZeroStrat,
    parallel: bool,
) -> Result<PrecisionRecallFScoreTrueSum> {
    let (mut pred_sum, mut tp_sum, mut true_sum) = counts.as_arrays();
    if matches!(average, Average::Micro) {
        tp_sum = array![tp_sum.sum()];
        pred_sum = array![pred_sum.sum()];
        true_sum = array![true_sum.sum()];
    };
    let tp = tp_sum.mapv(|x| x as f64);
    let precision = prf_divide(
        tp.view(),
        pred_sum.mapv(|x| x as f64).view(),
        parallel,
        zero_division,
    )?;
    let recall = prf_divide(
        tp.view(),
        true_sum.mapv(|x| x as f64).view(),
        parallel,
        zero_division,
    )?;
    let f_score = prf_divide(
        (2.0 * &tp).view(),
        (&pred_sum + &true_sum).mapv(|x| x as f64).view(),
        parallel,
        zero_division,
    )?;
    match average {
        Average::None | Average::Micro => Ok((precision, recall, f_score, true_sum)),
        Average::Macro => Ok((
            array![mean_or_zero(precision.view())],
            array![mean_or_zero(recall.view())],
            array![mean_or_zero(f_score.view())],
            array![true_sum.sum()],
        )),
        Average::Weighted => {
            let total = true_sum.sum();
            if total == 0 {
                return match zero_division {
                    DivByZeroStrat::ReturnError => Err(EvalError::DivisionByZero),
                    _ => Ok((array![0.0], array![0.0], array![0.0], array![0])),
                };
            }
            let weights = true_sum.mapv(|x| x as f64);
            Ok((
                array![precision.weighted_mean(&weights)?],
                array![recall.weighted_mean(&weights)?],
                array![f_score.weighted_mean(&weights)?],
                array![total],
            ))
        }
    }
}

/// This function computes the precision, recall, fscore and support of every class of `counts` and
/// the three overall averages, and collects them in a `Reporter`.
///
/// * `counts`: Per-class counts.
/// * `zero_division`: What to do in case of division by zero.
/// * `parallel`: Can we use multiple cores for the array computations?
pub fn classification_report(
    counts: &ClassCounts,
    zero_division: DivByZeroStrat,
    parallel: bool,
) -> Result<Reporter> {
    let (p, r, f1, s) =
        precision_recall_fscore_support(counts, Average::None, zero_division, parallel)?;
    let mut reporter = Reporter::default();
    for (name, precision, recall, fscore, support) in multizip((
        counts.classes(),
        p.into_iter(),
        r.into_iter(),
        f1.into_iter(),
        s.into_iter(),
    )) {
        reporter.insert_class(name, precision, recall, fscore, support);
    }
    for avg in all::<OverallAverage>() {
        let (p, r, f1, s) =
            precision_recall_fscore_support(counts, avg.into(), zero_division, parallel)?;
        reporter.insert_overall(avg, p[0], r[0], f1[0], s[0]);
    }
    Ok(reporter)
}
