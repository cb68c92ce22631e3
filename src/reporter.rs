/**
Per-class metrics of one evaluation level and their overall averages, printable as a table.
*/
use enum_iterator::{all, Sequence};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// The metrics of every class of one evaluation level (token, entity-flat or entity-BIO) and
/// their overall averages. Classes are kept in lexical order.
///
/// # Example
///
/// ```rust
/// use doceval::{classification_report, ClassCounts, DivByZeroStrat, OverallAverage};
///
/// let mut counts = ClassCounts::default();
/// for (gold, pred) in [("TOTAL", "TOTAL"), ("DATE", "DATE"), ("TOTAL", "O"), ("TOTAL", "TOTAL")] {
///     counts.record(gold, pred);
/// }
/// let reporter = classification_report(&counts, DivByZeroStrat::ReplaceBy0, false).unwrap();
///
/// let total = reporter.class("TOTAL").unwrap();
/// assert_eq!((total.precision, total.fscore, total.support), (1.0, 0.8, 3));
/// let outside = reporter.class("O").unwrap();
/// assert_eq!((outside.precision, outside.recall, outside.support), (0.0, 0.0, 0));
/// assert_eq!(reporter.overall(OverallAverage::Micro).unwrap().fscore, 0.75);
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Reporter {
    classes: BTreeMap<String, ClassMetrics>,
    overall: BTreeMap<OverallAverage, ClassMetrics>,
}

impl Reporter {
    /// Returns false, and keeps the previous row, when the class is already present.
    pub(crate) fn insert_class(
        &mut self,
        class: &str,
        precision: f64,
        recall: f64,
        fscore: f64,
        support: usize,
    ) -> bool {
        if self.classes.contains_key(class) {
            return false;
        }
        let row = ClassMetrics {
            class: String::from(class),
            average: Average::None,
            precision,
            recall,
            fscore,
            support,
        };
        self.classes.insert(row.class.clone(), row);
        true
    }

    pub(crate) fn insert_overall(
        &mut self,
        average: OverallAverage,
        precision: f64,
        recall: f64,
        fscore: f64,
        support: usize,
    ) {
        let row = ClassMetrics {
            class: average.to_string(),
            average: average.into(),
            precision,
            recall,
            fscore,
            support,
        };
        self.overall.insert(average, row);
    }

    /// Metrics of a single class, if it was observed or declared.
    pub fn class<S: AsRef<str>>(&self, class: S) -> Option<&ClassMetrics> {
        self.classes.get(class.as_ref())
    }

    pub fn overall(&self, average: OverallAverage) -> Option<&ClassMetrics> {
        self.overall.get(&average)
    }

    /// Per-class rows in lexical order, overall rows excluded.
    pub fn per_class(&self) -> impl ExactSizeIterator<Item = &ClassMetrics> + '_ {
        self.classes.values()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Every row: the classes, then the overall averages.
    pub fn rows(&self) -> impl Iterator<Item = &ClassMetrics> + '_ {
        self.classes.values().chain(self.overall.values())
    }
}

/// Aligned table with a header line, one line per class, then the overall averages.
impl Display for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self
            .rows()
            .map(|row| row.class.len())
            .max()
            .unwrap_or(0)
            .max("class".len());
        writeln!(
            f,
            "{:<width$}  {:>9}  {:>9}  {:>9}  {:>7}",
            "class", "precision", "recall", "f1", "support"
        )?;
        for row in self.rows() {
            writeln!(
                f,
                "{:<width$}  {:>9.4}  {:>9.4}  {:>9.4}  {:>7}",
                row.class, row.precision, row.recall, row.fscore, row.support
            )?;
        }
        Ok(())
    }
}

/// One line of a `Reporter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// The class, such as `ADDRESS` or `B-TOTAL`, or the name of an overall average.
    pub class: String,
    /// `Average::None` for a class line.
    pub average: Average,
    pub precision: f64,
    pub recall: f64,
    pub fscore: f64,
    /// Number of gold occurrences.
    pub support: usize,
}

/// How the per-class precision, recall and F1 are reduced. Parses from its name, ignoring case.
#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone, Serialize, Deserialize, Sequence)]
pub enum Average {
    /// No reduction: one value per class.
    None,
    /// Ratios of the counts summed over the classes.
    Micro,
    /// Unweighted mean of the per-class values.
    Macro,
    /// Mean of the per-class values weighted by support.
    Weighted,
}

impl Display for Average {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Micro => "Micro",
            Self::Macro => "Macro",
            Self::Weighted => "Weighted",
        };
        f.write_str(name)
    }
}

impl FromStr for Average {
    type Err = AverageParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all::<Average>()
            .find(|average| average.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| AverageParsingError(String::from(s)))
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Error)]
#[error("unknown average: {0}")]
pub struct AverageParsingError(String);

/// The averages reported next to the classes.
#[derive(
    Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Serialize, Deserialize, Sequence,
)]
pub enum OverallAverage {
    Micro,
    Macro,
    Weighted,
}

impl Display for OverallAverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Micro => "micro avg",
            Self::Macro => "macro avg",
            Self::Weighted => "weighted avg",
        };
        f.write_str(name)
    }
}

impl From<OverallAverage> for Average {
    fn from(value: OverallAverage) -> Self {
        match value {
            OverallAverage::Micro => Self::Micro,
            OverallAverage::Macro => Self::Macro,
            OverallAverage::Weighted => Self::Weighted,
        }
    }
}
