/*!
Per-file evaluation and aggregation. Every file is reduced to raw counts (confusion matrices, span
counts, page scores and dual annotations); the global report is built from the pooled counts,
never by averaging the per-file ratios. Pooling is a sum, so the global report does not depend on
the order in which the files were evaluated.
*/
use crate::agreement::AgreementCounts;
use crate::config::EvalConfig;
use crate::confusion::ConfusionMatrix;
use crate::entity::{decode_spans, strip_prefix, Entities, SpanSource, OUTSIDE};
use crate::error::{EmptyInputError, EvalError, Result};
use crate::metrics::ClassCounts;
use crate::record::{normalize, Document, Page, RawRow};
use crate::report::{EntityReport, MetricReport, Scalar, TokenReport};
use crate::sequence::{sequence_report, PageScore};
use enum_iterator::Sequence;
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::Display;
use tracing::{debug, info, warn};

/// The raw counts of one or many files. Counts are merged by summing them; page scores are
/// concatenated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluationCounts {
    token: ConfusionMatrix,
    flat: ConfusionMatrix,
    bio_tags_correct: usize,
    bio_tags_total: usize,
    spans: ClassCounts,
    pages: Vec<PageScore>,
    agreement: AgreementCounts,
}

/// The BIO tags of a page: the converted tags when the labels were converted, the labels
/// otherwise.
fn bio_tags<'a>(converted: &'a Option<Vec<String>>, labels: &[&'a str]) -> Vec<&'a str> {
    match converted {
        Some(tags) => tags.iter().map(String::as_str).collect(),
        None => labels.to_vec(),
    }
}

impl EvaluationCounts {
    /// Counts every metric input of a normalized document.
    pub fn from_document(document: &Document, config: &EvalConfig) -> Result<Self> {
        let mut counts = EvaluationCounts::default();
        for page in document.pages() {
            counts.count_page(page, config)?;
        }
        for (a1, a2) in document.dual_annotations() {
            counts.agreement.record(a1, a2);
        }
        Ok(counts)
    }

    fn count_page(&mut self, page: Page<'_>, config: &EvalConfig) -> Result<()> {
        let delimiter = config.delimiter();
        let gold: Vec<&str> = page.tokens.iter().map(|t| t.true_label.as_str()).collect();
        let pred: Vec<&str> = page.tokens.iter().map(|t| t.pred_label.as_str()).collect();

        let mut correct = 0;
        let mut label_counts = ClassCounts::default();
        for (g, p) in gold.iter().zip(pred.iter()) {
            self.token.record(g, p);
            label_counts.record(g, p);
            let (g, p) = (strip_prefix(g, delimiter), strip_prefix(p, delimiter));
            self.flat.record(g, p);
            correct += usize::from(g == p);
        }

        let gold_converted = config.gold_format().to_bio_owned(&gold, delimiter);
        let pred_converted = config.pred_format().to_bio_owned(&pred, delimiter);
        let gold_tags = bio_tags(&gold_converted, &gold);
        let pred_tags = bio_tags(&pred_converted, &pred);
        self.bio_tags_correct += gold_tags
            .iter()
            .zip(pred_tags.iter())
            .filter(|(g, p)| g == p)
            .count();
        self.bio_tags_total += gold_tags.len();

        let policy = config.orphan_inside();
        let gold_entities = Entities::new(decode_spans(
            page.id,
            &gold_tags,
            SpanSource::Gold,
            policy,
            delimiter,
        )?);
        let pred_entities = Entities::new(decode_spans(
            page.id,
            &pred_tags,
            SpanSource::Predicted,
            policy,
            delimiter,
        )?);
        let span_counts = gold_entities.match_counts(&pred_entities);
        self.spans.merge(&span_counts);
        self.pages.push(PageScore {
            page_id: String::from(page.id),
            tokens: page.tokens.len(),
            correct,
            gold_spans: gold_entities.len(),
            pred_spans: pred_entities.len(),
            matched_spans: span_counts.total().true_positive,
            label_counts,
        });
        Ok(())
    }

    pub fn merge(&mut self, other: &EvaluationCounts) {
        self.token.merge(&other.token);
        self.flat.merge(&other.flat);
        self.bio_tags_correct += other.bio_tags_correct;
        self.bio_tags_total += other.bio_tags_total;
        self.spans.merge(&other.spans);
        self.pages.extend(other.pages.iter().cloned());
        self.agreement.merge(&other.agreement);
    }

    /// Number of tokens counted.
    pub fn token_count(&self) -> usize {
        self.token.total()
    }

    /// Builds the report of the counts. The labels of the configured vocabulary are reported even
    /// when they were never observed.
    pub fn report(&self, config: &EvalConfig) -> Result<MetricReport> {
        let zero_division = config.zero_division();
        let parallel = config.parallel();
        let delimiter = config.delimiter();
        let declared: Vec<&str> = config
            .vocabulary()
            .map(|v| v.names().collect())
            .unwrap_or_default();

        let token = TokenReport::new(self.token.clone(), &declared, zero_division, parallel)?;

        let mut flat_counts = self.flat.class_counts();
        for label in declared.iter() {
            flat_counts.declare(strip_prefix(label, delimiter));
        }
        let entity_flat = EntityReport::new(
            &flat_counts,
            self.flat.correct(),
            self.flat.total(),
            zero_division,
            parallel,
        )?;

        let mut span_counts = self.spans.clone();
        declared
            .iter()
            .map(|label| strip_prefix(label, delimiter))
            .filter(|kind| *kind != OUTSIDE)
            .for_each(|kind| span_counts.declare(kind));
        let entity_bio = EntityReport::new(
            &span_counts,
            self.bio_tags_correct,
            self.bio_tags_total,
            zero_division,
            parallel,
        )?;

        Ok(MetricReport {
            token,
            entity_flat,
            entity_bio,
            sequence: sequence_report(&self.pages, zero_division)?,
            agreement: self.agreement.report(),
            errors: self.flat.error_analysis(config.top_confusions()),
        })
    }
}

/// The rows of one input file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputFile {
    pub name: String,
    pub rows: Vec<RawRow>,
}

impl InputFile {
    pub fn new<S: Into<String>>(name: S, rows: Vec<RawRow>) -> Self {
        InputFile {
            name: name.into(),
            rows,
        }
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<EvalError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/// The outcome of one file. A failed file has an error and no report; it still appears in the
/// per-file table.
#[derive(Debug, Clone, Serialize)]
pub struct PerFileResult {
    pub name: String,
    pub original_row_count: usize,
    pub final_row_count: usize,
    pub report: Option<MetricReport>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<EvalError>,
    #[serde(skip)]
    counts: Option<EvaluationCounts>,
}

impl PerFileResult {
    /// Evaluates a single file. Never fails: a failure is recorded in the result.
    pub fn evaluate(file: &InputFile, config: &EvalConfig) -> Self {
        let outcome = normalize(&file.rows, config).and_then(|document| {
            let counts = EvaluationCounts::from_document(&document, config)?;
            let report = counts.report(config)?;
            Ok((document.final_row_count(), counts, report))
        });
        match outcome {
            Ok((final_row_count, counts, report)) => {
                debug!(
                    file = %file.name,
                    original_row_count = file.rows.len(),
                    final_row_count,
                    "evaluated file"
                );
                PerFileResult {
                    name: file.name.clone(),
                    original_row_count: file.rows.len(),
                    final_row_count,
                    report: Some(report),
                    error: None,
                    counts: Some(counts),
                }
            }
            Err(error) => {
                warn!(file = %file.name, %error, "file could not be evaluated");
                PerFileResult {
                    name: file.name.clone(),
                    original_row_count: file.rows.len(),
                    final_row_count: 0,
                    report: None,
                    error: Some(error),
                    counts: None,
                }
            }
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// The raw counts of the file, `None` for a failed file.
    pub fn counts(&self) -> Option<&EvaluationCounts> {
        self.counts.as_ref()
    }
}

/// Pools the counts of the successful files and builds the global report. Failed files are left
/// out.
///
/// Page ids are scoped to their file: page scores are concatenated, never merged by id. The result
/// therefore equals the evaluation of all rows concatenated into one file only when page ids are
/// distinct across files. A page id shared by two files counts as two pages here but as one page
/// of the concatenation.
pub fn aggregate(results: &[PerFileResult], config: &EvalConfig) -> Result<MetricReport> {
    let mut pooled = EvaluationCounts::default();
    let mut evaluated = 0;
    for counts in results.iter().filter_map(PerFileResult::counts) {
        pooled.merge(counts);
        evaluated += 1;
    }
    if evaluated == 0 {
        return Err(EmptyInputError(String::from("no file could be evaluated")).into());
    }
    pooled.report(config)
}

/// What to do when a file cannot be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Sequence, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record the failure in the per-file table and leave the file out of the global report.
    #[default]
    Skip,
    /// Stop at the first failed file, in input order, and return its error.
    Abort,
}

/// The per-file table, in input order, and the global report.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub files: Vec<PerFileResult>,
    pub global: MetricReport,
    pub evaluated_files: usize,
    pub failed_files: usize,
}

/// Evaluates every file, then pools their counts into the global report. With
/// `config.parallel()`, files are evaluated on the rayon thread pool; the per-file table keeps the
/// input order either way.
///
/// * `files`: The input files.
/// * `config`: Evaluation settings.
/// * `policy`: Skip or abort on a failed file.
pub fn evaluate_files(
    files: &[InputFile],
    config: &EvalConfig,
    policy: FailurePolicy,
) -> Result<Summary> {
    if files.is_empty() {
        return Err(EmptyInputError(String::from("no input file")).into());
    }
    let results: Vec<PerFileResult> = if config.parallel() {
        files
            .par_iter()
            .map(|file| PerFileResult::evaluate(file, config))
            .collect()
    } else {
        files
            .iter()
            .map(|file| PerFileResult::evaluate(file, config))
            .collect()
    };
    if policy == FailurePolicy::Abort {
        if let Some(error) = results.iter().find_map(|r| r.error.clone()) {
            return Err(error);
        }
    }
    let global = aggregate(&results, config)?;
    let failed_files = results.iter().filter(|r| r.failed()).count();
    let evaluated_files = results.len() - failed_files;
    info!(
        evaluated_files,
        failed_files,
        token_accuracy = global.token.accuracy,
        "evaluation done"
    );
    Ok(Summary {
        files: results,
        global,
        evaluated_files,
        failed_files,
    })
}

/// Evaluates the rows of a single file.
pub fn evaluate_rows(rows: &[RawRow], config: &EvalConfig) -> Result<MetricReport> {
    let document = normalize(rows, config)?;
    EvaluationCounts::from_document(&document, config)?.report(config)
}

/// The per-file table, one line per file, followed by the global report.
impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "File, Original rows, Final rows, {}, {}, {}, Status",
            Scalar::TokenAccuracy,
            Scalar::EntityBioF1Macro,
            Scalar::SequenceAccuracy
        )?;
        for file in self.files.iter() {
            match (&file.report, &file.error) {
                (Some(report), _) => writeln!(
                    f,
                    "{}, {}, {}, {}, {}, {}, ok",
                    file.name,
                    file.original_row_count,
                    file.final_row_count,
                    report.get(Scalar::TokenAccuracy),
                    report.get(Scalar::EntityBioF1Macro),
                    report.get(Scalar::SequenceAccuracy)
                )?,
                (None, error) => writeln!(
                    f,
                    "{}, {}, {}, , , , failed: {}",
                    file.name,
                    file.original_row_count,
                    file.final_row_count,
                    error.as_ref().map_or(String::new(), ToString::to_string)
                )?,
            }
        }
        writeln!(
            f,
            "\nEvaluated files: {}, failed files: {}\n",
            self.evaluated_files, self.failed_files
        )?;
        write!(f, "{}", self.global)
    }
}
