/*!
Agreement between two annotators over the tokens both of them labelled.
*/
use crate::confusion::ConfusionMatrix;
use ndarray::Axis;
use serde::Serialize;

/// Pooled dual annotations: a confusion matrix whose rows are the labels of the first annotator
/// and whose columns are the labels of the second one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AgreementCounts {
    matrix: ConfusionMatrix,
}

impl AgreementCounts {
    pub fn record<S: AsRef<str>, T: AsRef<str>>(&mut self, annotator1: S, annotator2: T) {
        self.matrix.record(annotator1, annotator2)
    }

    pub fn merge(&mut self, other: &AgreementCounts) {
        self.matrix.merge(&other.matrix)
    }

    pub fn dual_annotations(&self) -> usize {
        self.matrix.total()
    }

    pub fn matrix(&self) -> &ConfusionMatrix {
        &self.matrix
    }

    /// Computes the raw agreement and Cohen's kappa. Both are `NaN` without dual annotations.
    ///
    /// ```rust
    /// use doceval::AgreementCounts;
    ///
    /// let mut counts = AgreementCounts::default();
    /// for (a1, a2) in [("A", "A"), ("B", "B"), ("A", "B"), ("B", "A")] {
    ///     counts.record(a1, a2);
    /// }
    /// let report = counts.report();
    /// assert_eq!(report.agreement_percentage, 0.5);
    /// assert_eq!(report.cohens_kappa, 0.0);
    /// assert!(AgreementCounts::default().report().cohens_kappa.is_nan());
    /// ```
    pub fn report(&self) -> AgreementReport {
        let n = self.matrix.total();
        let agreement_count = self.matrix.correct();
        if n == 0 {
            return AgreementReport {
                dual_annotations: 0,
                agreement_count: 0,
                agreement_percentage: f64::NAN,
                cohens_kappa: f64::NAN,
            };
        }
        let labels: Vec<&str> = self.matrix.labels().into_iter().collect();
        let dense = self.matrix.dense(&labels).mapv(|c| c as f64);
        let n = n as f64;
        let first = dense.sum_axis(Axis(1)) / n;
        let second = dense.sum_axis(Axis(0)) / n;
        let observed = agreement_count as f64 / n;
        let expected = first.dot(&second);
        // both annotators used a single identical label throughout
        let cohens_kappa = if expected == 1.0 {
            1.0
        } else {
            (observed - expected) / (1.0 - expected)
        };
        AgreementReport {
            dual_annotations: self.matrix.total(),
            agreement_count,
            agreement_percentage: observed,
            cohens_kappa,
        }
    }
}

/// Agreement statistics. `agreement_percentage` is a fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AgreementReport {
    pub dual_annotations: usize,
    pub agreement_count: usize,
    pub agreement_percentage: f64,
    pub cohens_kappa: f64,
}

impl AgreementReport {
    /// False when no token carries both annotations; the ratios are then `NaN`.
    pub fn is_defined(&self) -> bool {
        self.dual_annotations > 0
    }
}

/// Two undefined reports are equal.
impl PartialEq for AgreementReport {
    fn eq(&self, other: &Self) -> bool {
        let same = |a: f64, b: f64| a == b || (a.is_nan() && b.is_nan());
        self.dual_annotations == other.dual_annotations
            && self.agreement_count == other.agreement_count
            && same(self.agreement_percentage, other.agreement_percentage)
            && same(self.cohens_kappa, other.cohens_kappa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::CloseEnough;
    use rstest::rstest;

    fn counts(pairs: &[(&str, &str)]) -> AgreementCounts {
        let mut counts = AgreementCounts::default();
        for (a1, a2) in pairs {
            counts.record(a1, a2);
        }
        counts
    }

    #[rstest]
    #[case(vec![("A", "A"), ("B", "B"), ("C", "C")], 1.0, 1.0)]
    #[case(vec![("A", "B"), ("B", "A"), ("A", "B"), ("B", "A")], 0.0, -1.0)]
    #[case(vec![("O", "O"), ("O", "O")], 1.0, 1.0)]
    #[case(vec![("A", "A"), ("A", "A"), ("A", "B"), ("B", "B")], 0.75, 0.5)]
    fn test_kappa(#[case] pairs: Vec<(&str, &str)>, #[case] agreement: f64, #[case] kappa: f64) {
        let report = counts(&pairs).report();
        assert!(report.is_defined());
        assert_eq!(report.dual_annotations, pairs.len());
        assert!(report.agreement_percentage.are_close(&agreement, 1e-12));
        assert!(report.cohens_kappa.are_close(&kappa, 1e-12));
    }

    #[test]
    fn test_below_chance_is_negative() {
        let report = counts(&[("A", "B"), ("B", "A"), ("A", "A")]).report();
        assert!(report.cohens_kappa < 0.0);
    }

    #[test]
    fn test_no_dual_annotation_is_undefined() {
        let report = AgreementCounts::default().report();
        assert!(!report.is_defined());
        assert!(report.agreement_percentage.is_nan());
        assert!(report.cohens_kappa.is_nan());
        assert_eq!(report, AgreementCounts::default().report());
    }

    #[test]
    fn test_merge_pools_the_tokens() {
        let mut left = counts(&[("A", "A"), ("A", "B")]);
        let right = counts(&[("B", "B"), ("A", "A")]);
        left.merge(&right);
        let pooled = counts(&[("A", "A"), ("A", "B"), ("B", "B"), ("A", "A")]);
        assert_eq!(left, pooled);
        assert_eq!(left.report(), pooled.report());
    }
}
