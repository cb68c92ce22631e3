/*!
Value objects holding the metrics of one evaluation, at every level. A report is only ever built
from counts; aggregating reports means building a new report from pooled counts.
*/
use crate::agreement::AgreementReport;
use crate::confusion::{ConfusionMatrix, ErrorAnalysis};
use crate::error::Result;
use crate::metrics::{classification_report, ratio, ClassCounts, DivByZeroStrat};
use crate::reporter::{OverallAverage, Reporter};
use crate::sequence::SequenceReport;
use enum_iterator::{all, Sequence};
use serde::Serialize;
use std::fmt::Display;

fn overall_fscore(reporter: &Reporter, average: OverallAverage) -> f64 {
    reporter.overall(average).map_or(0.0, |m| m.fscore)
}

/// Token level metrics, on the labels as recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenReport {
    pub accuracy: f64,
    pub f1_macro: f64,
    pub f1_micro: f64,
    pub f1_weighted: f64,
    pub per_class: Reporter,
    pub confusion: ConfusionMatrix,
}

impl TokenReport {
    /// * `confusion`: Pooled token confusion matrix.
    /// * `declared`: Labels reported even when never observed.
    pub(crate) fn new<S: AsRef<str>>(
        confusion: ConfusionMatrix,
        declared: &[S],
        zero_division: DivByZeroStrat,
        parallel: bool,
    ) -> Result<Self> {
        let mut counts = confusion.class_counts();
        declared.iter().for_each(|label| counts.declare(label));
        let per_class = classification_report(&counts, zero_division, parallel)?;
        Ok(TokenReport {
            accuracy: ratio(confusion.correct(), confusion.total(), zero_division)?,
            f1_macro: overall_fscore(&per_class, OverallAverage::Macro),
            f1_micro: overall_fscore(&per_class, OverallAverage::Micro),
            f1_weighted: overall_fscore(&per_class, OverallAverage::Weighted),
            per_class,
            confusion,
        })
    }
}

/// Entity level metrics. For the flat level, the classes are the prefix-stripped labels; for the
/// BIO level, they are the types of the decoded spans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityReport {
    pub accuracy: f64,
    pub f1_macro: f64,
    pub f1_micro: f64,
    pub f1_weighted: f64,
    pub per_class: Reporter,
}

impl EntityReport {
    /// * `counts`: Per-class counts, declared classes included.
    /// * `correct` and `total`: Number of agreeing tokens and of compared tokens.
    pub(crate) fn new(
        counts: &ClassCounts,
        correct: usize,
        total: usize,
        zero_division: DivByZeroStrat,
        parallel: bool,
    ) -> Result<Self> {
        let per_class = classification_report(counts, zero_division, parallel)?;
        Ok(EntityReport {
            accuracy: ratio(correct, total, zero_division)?,
            f1_macro: overall_fscore(&per_class, OverallAverage::Macro),
            f1_micro: overall_fscore(&per_class, OverallAverage::Micro),
            f1_weighted: overall_fscore(&per_class, OverallAverage::Weighted),
            per_class,
        })
    }
}

/// The metrics of a file, or of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricReport {
    pub token: TokenReport,
    pub entity_flat: EntityReport,
    pub entity_bio: EntityReport,
    pub sequence: SequenceReport,
    pub agreement: AgreementReport,
    /// Confusions between the prefix-stripped labels.
    pub errors: ErrorAnalysis,
}

/// The named scalars of a `MetricReport`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Sequence, Serialize)]
pub enum Scalar {
    TokenAccuracy,
    TokenF1Macro,
    TokenF1Micro,
    TokenF1Weighted,
    EntityFlatAccuracy,
    EntityFlatF1Macro,
    EntityFlatF1Weighted,
    EntityBioAccuracy,
    EntityBioF1Macro,
    EntityBioF1Weighted,
    SequenceAccuracy,
    SequenceF1,
    CohensKappa,
    AgreementPercentage,
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TokenAccuracy => "token_accuracy",
            Self::TokenF1Macro => "token_f1_macro",
            Self::TokenF1Micro => "token_f1_micro",
            Self::TokenF1Weighted => "token_f1_weighted",
            Self::EntityFlatAccuracy => "entity_flat_accuracy",
            Self::EntityFlatF1Macro => "entity_flat_f1_macro",
            Self::EntityFlatF1Weighted => "entity_flat_f1_weighted",
            Self::EntityBioAccuracy => "entity_bio_accuracy",
            Self::EntityBioF1Macro => "entity_bio_f1_macro",
            Self::EntityBioF1Weighted => "entity_bio_f1_weighted",
            Self::SequenceAccuracy => "sequence_accuracy",
            Self::SequenceF1 => "sequence_f1",
            Self::CohensKappa => "cohens_kappa",
            Self::AgreementPercentage => "agreement_percentage",
        };
        write!(f, "{}", name)
    }
}

impl MetricReport {
    pub fn get(&self, scalar: Scalar) -> f64 {
        match scalar {
            Scalar::TokenAccuracy => self.token.accuracy,
            Scalar::TokenF1Macro => self.token.f1_macro,
            Scalar::TokenF1Micro => self.token.f1_micro,
            Scalar::TokenF1Weighted => self.token.f1_weighted,
            Scalar::EntityFlatAccuracy => self.entity_flat.accuracy,
            Scalar::EntityFlatF1Macro => self.entity_flat.f1_macro,
            Scalar::EntityFlatF1Weighted => self.entity_flat.f1_weighted,
            Scalar::EntityBioAccuracy => self.entity_bio.accuracy,
            Scalar::EntityBioF1Macro => self.entity_bio.f1_macro,
            Scalar::EntityBioF1Weighted => self.entity_bio.f1_weighted,
            Scalar::SequenceAccuracy => self.sequence.sequence_accuracy,
            Scalar::SequenceF1 => self.sequence.sequence_f1,
            Scalar::CohensKappa => self.agreement.cohens_kappa,
            Scalar::AgreementPercentage => self.agreement.agreement_percentage,
        }
    }

    /// Every named scalar, in a fixed order.
    pub fn scalars(&self) -> impl Iterator<Item = (Scalar, f64)> + '_ {
        all::<Scalar>().map(|scalar| (scalar, self.get(scalar)))
    }
}

/// One `name: value` line per scalar, then the per-class table of each level.
impl Display for MetricReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (scalar, value) in self.scalars() {
            writeln!(f, "{}: {}", scalar, value)?;
        }
        writeln!(f, "\nToken\n{}", self.token.per_class)?;
        writeln!(f, "Entity (flat)\n{}", self.entity_flat.per_class)?;
        write!(f, "Entity (BIO)\n{}", self.entity_bio.per_class)
    }
}
