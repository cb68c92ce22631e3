use doceval::{
    evaluate_files, evaluate_rows, Cell, EvalConfig, EvalConfigBuilder, EvalError, FailurePolicy,
    InputFile, LabelVocabulary, OverallAverage, RawRow, Scalar, UnknownLabelError,
    UnknownLabelPolicy,
};
use serde_jsonlines::json_lines;
use std::sync::Arc;

pub trait CloseEnough {
    fn are_close(&self, other: &Self, eps: f64) -> bool;
}

impl CloseEnough for f64 {
    fn are_close(&self, other: &Self, eps: f64) -> bool {
        f64::abs(self - other) < eps
    }
}

fn load(path: &str) -> Vec<RawRow> {
    json_lines::<RawRow, _>(path)
        .expect("fixture not found in test directory")
        .map(|r| r.unwrap())
        .collect()
}

fn vocabulary() -> Arc<LabelVocabulary> {
    Arc::new(
        [
            "O",
            "B-TOTAL",
            "I-TOTAL",
            "B-DATE",
            "I-DATE",
            "B-ADDRESS",
            "I-ADDRESS",
        ]
        .into_iter()
        .collect(),
    )
}

fn row(page: &str, word_id: usize, gold: &str, pred: &str) -> RawRow {
    RawRow::from([
        (String::from("page_id"), Cell::Text(String::from(page))),
        (String::from("word_id"), Cell::Int(word_id as i64)),
        (String::from("labels"), Cell::Text(String::from(gold))),
        (String::from("pred"), Cell::Text(String::from(pred))),
        (String::from("prob"), Cell::Float(0.5)),
    ])
}

fn page(page_id: &str, gold: &[&str], pred: &[&str]) -> Vec<RawRow> {
    gold.iter()
        .zip(pred.iter())
        .enumerate()
        .map(|(i, (g, p))| row(page_id, i, g, p))
        .collect()
}

#[test]
fn matching_page_is_perfect() {
    let rows = page("P1", &["B-PER", "I-PER", "O"], &["B-PER", "I-PER", "O"]);
    let report = evaluate_rows(&rows, &EvalConfig::default()).unwrap();
    let per = report.entity_bio.per_class.class("PER").unwrap();
    assert_eq!(report.entity_bio.per_class.class_count(), 1);
    assert_eq!(per.support, 1);
    assert_eq!(per.fscore, 1.0);
    assert_eq!(report.get(Scalar::EntityBioF1Macro), 1.0);
    assert_eq!(report.get(Scalar::TokenAccuracy), 1.0);
}

#[test]
fn boundary_mismatch_scores_zero() {
    let rows = page("P2", &["B-PER", "I-PER"], &["B-PER", "O"]);
    let report = evaluate_rows(&rows, &EvalConfig::default()).unwrap();
    let per = report.entity_bio.per_class.class("PER").unwrap();
    assert_eq!((per.precision, per.recall, per.fscore), (0.0, 0.0, 0.0));
    assert_eq!(report.get(Scalar::TokenAccuracy), 0.5);
    assert_eq!(report.sequence.exact_matches, 0);
}

#[test]
fn global_accuracy_pools_the_tokens() {
    let config = EvalConfig::default();
    let perfect = vec![
        InputFile::new("three", page("A", &["O", "B-X", "O"], &["O", "B-X", "O"])),
        InputFile::new("five", page("B", &["O"; 5], &["O"; 5])),
    ];
    let summary = evaluate_files(&perfect, &config, FailurePolicy::Skip).unwrap();
    assert_eq!(summary.global.get(Scalar::TokenAccuracy), 1.0);

    let uneven = vec![
        InputFile::new("three", page("A", &["O", "B-X", "O"], &["B-X", "O", "O"])),
        InputFile::new("five", page("B", &["O"; 5], &["O"; 5])),
    ];
    let summary = evaluate_files(&uneven, &config, FailurePolicy::Skip).unwrap();
    let per_file: Vec<f64> = summary
        .files
        .iter()
        .map(|f| f.report.as_ref().unwrap().get(Scalar::TokenAccuracy))
        .collect();
    assert!(per_file[0].are_close(&(1.0 / 3.0), 1e-12));
    assert_eq!(per_file[1], 1.0);
    assert_eq!(summary.global.get(Scalar::TokenAccuracy), 0.75);
    assert_eq!(summary.global.token.confusion.total(), 8);
}

#[test]
fn fixture_report() {
    let rows = load("tests/data/invoice_a.jsonl");
    let config = EvalConfigBuilder::new().vocabulary(vocabulary()).build();
    let report = evaluate_rows(&rows, &config).unwrap();

    assert!(report.get(Scalar::TokenAccuracy).are_close(&(6.0 / 7.0), 1e-12));
    assert!(report.get(Scalar::EntityFlatAccuracy).are_close(&(6.0 / 7.0), 1e-12));
    assert!(report.get(Scalar::EntityBioAccuracy).are_close(&(6.0 / 7.0), 1e-12));
    assert!(report.get(Scalar::EntityBioF1Macro).are_close(&(2.0 / 3.0), 1e-12));
    assert!(report.entity_bio.f1_micro.are_close(&(2.0 / 3.0), 1e-12));
    assert_eq!(report.get(Scalar::SequenceAccuracy), 0.5);
    assert_eq!(report.get(Scalar::SequenceF1), 0.5);
    assert_eq!(report.token.per_class.class_count(), 7);

    assert_eq!(report.agreement.dual_annotations, 4);
    assert_eq!(report.get(Scalar::AgreementPercentage), 0.75);
    assert!(report.get(Scalar::CohensKappa).are_close(&(5.0 / 9.0), 1e-12));

    assert_eq!(report.errors.total_errors, 1);
    let top = &report.errors.top_confusions[0];
    assert_eq!(
        (top.true_label.as_str(), top.pred_label.as_str(), top.count),
        ("ADDRESS", "O", 1)
    );
    let weighted = report
        .entity_bio
        .per_class
        .overall(OverallAverage::Weighted)
        .unwrap();
    assert_eq!(weighted.support, 3);
}

#[test]
fn fixture_summary_serializes() {
    let files = vec![
        InputFile::new("invoice_a", load("tests/data/invoice_a.jsonl")),
        InputFile::new("invoice_b", load("tests/data/invoice_b.jsonl")),
    ];
    let config = EvalConfigBuilder::new()
        .vocabulary(vocabulary())
        .parallel(true)
        .build();
    let summary = evaluate_files(&files, &config, FailurePolicy::Skip).unwrap();
    assert_eq!((summary.evaluated_files, summary.failed_files), (1, 1));

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["files"][0]["original_row_count"], 8);
    assert_eq!(json["files"][0]["final_row_count"], 7);
    assert_eq!(json["files"][0]["error"], serde_json::Value::Null);
    assert_eq!(
        json["files"][1]["error"],
        "missing required column(s): prob"
    );
    assert_eq!(json["files"][1]["report"], serde_json::Value::Null);
    assert_eq!(json["global"]["sequence"]["pages"], 2);
    assert!(json["global"]["token"]["confusion"].is_array());

    let err = evaluate_files(&files, &config, FailurePolicy::Abort).unwrap_err();
    assert!(err.is_schema_error());
}

#[test]
fn aggregation_matches_concatenation() {
    let mut second = page("B", &["B-DATE", "I-DATE", "O"], &["B-DATE", "O", "O"]);
    for (record, (a1, a2)) in second
        .iter_mut()
        .zip([("B-DATE", "B-DATE"), ("I-DATE", "O"), ("O", "O")])
    {
        // the fixture names its page column `Image_ID`
        if let Some(page_id) = record.remove("page_id") {
            record.insert(String::from("image_id"), page_id);
        }
        record.insert(String::from("annotator1_label"), Cell::Text(String::from(a1)));
        record.insert(String::from("annotator2_label"), Cell::Text(String::from(a2)));
    }
    let first = load("tests/data/invoice_a.jsonl");
    let config = EvalConfigBuilder::new().vocabulary(vocabulary()).build();
    let files = vec![
        InputFile::new("first", first.clone()),
        InputFile::new("second", second.clone()),
    ];
    let summary = evaluate_files(&files, &config, FailurePolicy::Skip).unwrap();

    let mut concatenated = first;
    concatenated.extend(second);
    let single = evaluate_rows(&concatenated, &config).unwrap();
    for ((name, pooled), (_, direct)) in summary.global.scalars().zip(single.scalars()) {
        assert_eq!(pooled.to_bits(), direct.to_bits(), "{} differs", name);
    }
    assert_eq!(summary.global.agreement.dual_annotations, 7);
    assert_eq!(summary.global, single);
}

fn coded_rows() -> Vec<RawRow> {
    let mut rows = page("P", &["O", "B-TOTAL"], &["O", "O"]);
    rows[1].insert(String::from("pred"), Cell::Int(9));
    rows
}

#[test]
fn unknown_code_passes_through() {
    let config = EvalConfigBuilder::new().vocabulary(vocabulary()).build();
    let report = evaluate_rows(&coded_rows(), &config).unwrap();
    assert_eq!(report.token.confusion.get("B-TOTAL", "9"), 1);
    assert!(report.token.per_class.class("9").is_some());
}

#[test]
fn unknown_code_fails() {
    let config = EvalConfigBuilder::new()
        .vocabulary(vocabulary())
        .unknown_label(UnknownLabelPolicy::Fail)
        .build();
    let err = evaluate_rows(&coded_rows(), &config).unwrap_err();
    assert_eq!(
        err,
        EvalError::UnknownLabel(UnknownLabelError {
            code: 9,
            column: String::from("pred"),
        })
    );
}

#[test]
fn empty_inputs_are_rejected() {
    let config = EvalConfig::default();
    assert!(matches!(
        evaluate_rows(&[], &config),
        Err(EvalError::EmptyInput(_))
    ));
    assert!(matches!(
        evaluate_files(&[], &config, FailurePolicy::Skip),
        Err(EvalError::EmptyInput(_))
    ));
}
