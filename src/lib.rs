/*!
This library evaluates the predictions of a document sequence-labeling model against their ground
truth. It takes per-token records, grouped in files, and computes metrics at several levels:
* Token: accuracy and per-class precision, recall and F1 on the labels as recorded, with their
    micro, macro and weighted averages, and the confusion matrix.
* Entity (flat): the same metrics on the labels stripped of their BIO prefix.
* Entity (BIO): the BIO tags of each page are decoded into entity spans; a predicted span is a
    true positive only when a gold span of the same page has the same start, end and type.
* Sequence: one page is one sequence. The exact-match rate of the pages and the mean of their
    per-page entity F1.
* Agreement: raw agreement and Cohen's kappa between two annotators, over the tokens labelled by
    both of them.

The metrics of many files are aggregated by pooling their raw counts, never by averaging the
per-file ratios.

# Terminology
* A class is a label we are interested in, such as `ADDRESS`, `TOTAL` or `B-DATE`.
* A tag is a label carrying a BIO prefix: `B-` begins a span, `I-` continues it and `O` is
    outside of any span.
* An orphan inside tag is an `I-<T>` tag that does not continue an open span of type `T`. By
    default it begins a new span; see `OrphanInside` for the alternatives.
* A dual annotation is a token labelled by both annotators.

# Example
```rust
use doceval::{evaluate_rows, Cell, EvalConfig, RawRow, Scalar};

let rows: Vec<RawRow> = [("B-PER", "B-PER"), ("I-PER", "I-PER"), ("O", "O")]
    .iter()
    .enumerate()
    .map(|(i, (gold, pred))| {
        RawRow::from([
            (String::from("page_id"), Cell::Text(String::from("P1"))),
            (String::from("word_id"), Cell::Int(i as i64)),
            (String::from("labels"), Cell::Text(gold.to_string())),
            (String::from("pred"), Cell::Text(pred.to_string())),
            (String::from("prob"), Cell::Float(0.99)),
        ])
    })
    .collect();
let report = evaluate_rows(&rows, &EvalConfig::default()).unwrap();
assert_eq!(report.get(Scalar::TokenAccuracy), 1.0);
assert_eq!(report.get(Scalar::EntityBioF1Macro), 1.0);
assert!(report.get(Scalar::CohensKappa).is_nan());
```
*/

mod aggregate;
mod agreement;
mod config;
mod confusion;
mod datastructure;
mod entity;
mod error;
mod metrics;
mod record;
mod report;
mod reporter;
mod sequence;

// The public api starts here
pub use entity::{
    decode_spans, flat_to_bio, strip_prefix, Entities, EntitySpan, OrphanInside, Prefix,
    SpanSource, TagFormat, OUTSIDE,
};

pub use metrics::{
    classification_report, precision_recall_fscore_support, ClassCounts, Counts, DivByZeroStrat,
    ParsingDivisionByZeroStrategyError, PrecisionRecallFScoreTrueSum,
};

pub use reporter::{Average, AverageParsingError, ClassMetrics, OverallAverage, Reporter};

pub use confusion::{ConfusionMatrix, ConfusionPair, ErrorAnalysis, LabelErrors};

pub use sequence::{sequence_report, PageScore, SequenceReport};

pub use agreement::{AgreementCounts, AgreementReport};

pub use record::{
    normalize, Cell, Document, Field, GroundTruth, LabelVocabulary, Page, RawRow, Schema,
    TokenRecord, UnknownLabelPolicy,
};

pub use report::{EntityReport, MetricReport, Scalar, TokenReport};

pub use aggregate::{
    aggregate, evaluate_files, evaluate_rows, EvaluationCounts, FailurePolicy, InputFile,
    PerFileResult, Summary,
};

pub use config::{EvalConfig, EvalConfigBuilder, DEFAULT_TOP_CONFUSIONS};

pub use error::{
    EmptyInputError, EvalError, MalformedTagError, Result, SchemaError, UnknownLabelError,
};
