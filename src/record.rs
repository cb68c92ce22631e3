/*!
Record normalizer. Raw rows are loosely typed mappings whose keys may use any casing and one of
several synonyms; this module validates them against a `Schema` and shapes them into
`TokenRecord`s grouped by page and ordered by `word_id`.
*/
use crate::config::EvalConfig;
use crate::datastructure::Paged;
use crate::error::{EmptyInputError, EvalError, Result, SchemaError, UnknownLabelError};
use ahash::AHashMap;
use either::Either;
use enum_iterator::{all, Sequence};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

/// A loosely typed cell of a raw row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<f64>),
}

/// A raw row, keyed by column name.
pub type RawRow = BTreeMap<String, Cell>;

static MISSING: Cell = Cell::Null;

impl Cell {
    /// Null, NaN, blank text and the literal `nan` all stand for a missing value.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(f) => f.is_nan(),
            Cell::Text(s) => {
                let s = s.trim();
                s.is_empty() || s.eq_ignore_ascii_case("nan")
            }
            Cell::Int(_) | Cell::List(_) => false,
        }
    }

    /// The label held by the cell: an integer code on the left or a label name on the right.
    /// Returns `None` for a missing value and for cells that cannot hold a label.
    pub fn as_label(&self) -> Option<Either<i64, &str>> {
        if self.is_missing() {
            return None;
        }
        match self {
            Cell::Int(code) => Some(Either::Left(*code)),
            Cell::Float(f) if f.fract() == 0.0 => Some(Either::Left(*f as i64)),
            Cell::Text(s) => Some(Either::Right(s.trim())),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        match self {
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Text(s) => Some(String::from(s.trim())),
            _ => None,
        }
    }

    /// Four coordinates, given either as a list or as a text such as `"[1, 2, 3, 4]"`.
    fn as_bbox(&self) -> Option<[f64; 4]> {
        let coordinates: Vec<f64> = match self {
            Cell::List(values) => values.clone(),
            Cell::Text(s) => s
                .trim_matches(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | '(' | ')'))
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .map(str::parse)
                .collect::<std::result::Result<_, _>>()
                .ok()?,
            _ => return None,
        };
        coordinates.try_into().ok()
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Null => write!(f, "null"),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::List(values) => write!(f, "[{}]", values.iter().join(", ")),
        }
    }
}

/// The canonical columns of a file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Sequence, Serialize, Deserialize,
)]
pub enum Field {
    PageId,
    BlockId,
    WordId,
    Words,
    Bboxes,
    Labels,
    Pred,
    Prob,
    Annotator1Label,
    Annotator2Label,
}

impl Field {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::PageId => "page_id",
            Self::BlockId => "block_id",
            Self::WordId => "word_id",
            Self::Words => "words",
            Self::Bboxes => "bboxes",
            Self::Labels => "labels",
            Self::Pred => "pred",
            Self::Prob => "prob",
            Self::Annotator1Label => "annotator1_label",
            Self::Annotator2Label => "annotator2_label",
        }
    }

    fn default_aliases(&self) -> &'static [&'static str] {
        match self {
            Self::PageId => &["page_id", "image_id"],
            Self::BlockId => &["block_id"],
            Self::WordId => &["word_id"],
            Self::Words => &["words", "word", "word_text"],
            Self::Bboxes => &["bboxes", "bbox"],
            Self::Labels => &["labels", "label", "true_label"],
            Self::Pred => &["pred", "pred_label", "prediction"],
            Self::Prob => &["prob", "probability"],
            Self::Annotator1Label => &["annotator1_label"],
            Self::Annotator2Label => &["annotator2_label"],
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Prioritized column synonyms. For every field, the first alias present in a file is the column
/// used for that field, wherever it sits in the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    aliases: BTreeMap<Field, Vec<String>>,
}

impl Default for Schema {
    fn default() -> Self {
        let aliases = all::<Field>()
            .map(|field| {
                let names = field.default_aliases().iter().map(|a| a.to_string()).collect();
                (field, names)
            })
            .collect();
        Schema { aliases }
    }
}

impl Schema {
    /// Appends a synonym to `field`, with the lowest priority.
    ///
    /// ```rust
    /// use doceval::{Field, Schema};
    ///
    /// let schema = Schema::default().with_alias(Field::PageId, "Document");
    /// assert_eq!(schema.aliases(Field::PageId), ["page_id", "image_id", "document"]);
    /// ```
    pub fn with_alias<S: AsRef<str>>(mut self, field: Field, alias: S) -> Self {
        let alias = normalize_key(alias.as_ref());
        let aliases = self.aliases.entry(field).or_default();
        if !aliases.contains(&alias) {
            aliases.push(alias);
        }
        self
    }

    pub fn aliases(&self, field: Field) -> &[String] {
        self.aliases.get(&field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Maps every field present in `rows` to the raw keys spelling its chosen alias.
    fn resolve<'r>(&self, rows: &'r [RawRow]) -> BTreeMap<Field, Vec<&'r str>> {
        let mut present: AHashMap<String, Vec<&'r str>> = AHashMap::new();
        for key in rows.iter().flat_map(|row| row.keys()) {
            let spellings = present.entry(normalize_key(key)).or_default();
            if !spellings.contains(&key.as_str()) {
                spellings.push(key.as_str());
            }
        }
        all::<Field>()
            .filter_map(|field| {
                self.aliases(field)
                    .iter()
                    .find_map(|alias| present.get(alias))
                    .map(|spellings| (field, spellings.clone()))
            })
            .collect()
    }
}

/// Which column holds the ground truth.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Sequence, Serialize, Deserialize,
)]
pub enum GroundTruth {
    #[default]
    Labels,
    Annotator1,
    Annotator2,
}

impl GroundTruth {
    pub fn field(&self) -> Field {
        match self {
            Self::Labels => Field::Labels,
            Self::Annotator1 => Field::Annotator1Label,
            Self::Annotator2 => Field::Annotator2Label,
        }
    }
}

impl Display for GroundTruth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.field())
    }
}

impl FromStr for GroundTruth {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "labels" | "label" => Ok(Self::Labels),
            "annotator1" | "annotator1_label" => Ok(Self::Annotator1),
            "annotator2" | "annotator2_label" => Ok(Self::Annotator2),
            _ => Err(format!(
                "Impossible to parse the string ({}) into a ground truth column",
                s
            )),
        }
    }
}

/// What to do with an integer label code that the vocabulary does not name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Sequence, Serialize, Deserialize,
)]
pub enum UnknownLabelPolicy {
    /// The code becomes its own label, rendered as its decimal string.
    #[default]
    PassThrough,
    /// Fail with an `UnknownLabelError`.
    Fail,
}

impl Display for UnknownLabelPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for UnknownLabelPolicy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "passthrough" | "pass_through" | "pass-through" => Ok(Self::PassThrough),
            "fail" => Ok(Self::Fail),
            _ => Err(format!(
                "Impossible to parse the string ({}) into an unknown label policy",
                s
            )),
        }
    }
}

/// Label names, indexed by their integer code.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelVocabulary {
    names: Vec<String>,
}

impl LabelVocabulary {
    pub fn new(names: Vec<String>) -> Self {
        LabelVocabulary { names }
    }

    pub fn get(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|index| self.names.get(index))
            .map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for LabelVocabulary {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        LabelVocabulary::new(iter.into_iter().map(Into::into).collect())
    }
}

/// A normalized token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub page_id: String,
    pub block_id: Option<i64>,
    /// Position of the token within its page. Defaults to the row position.
    pub word_id: i64,
    pub word_text: String,
    pub bbox: [f64; 4],
    pub true_label: String,
    pub pred_label: String,
    pub prob: f64,
    pub annotator1_label: Option<String>,
    pub annotator2_label: Option<String>,
}

/// A page of a document: its id and its tokens, ordered by `word_id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page<'a> {
    pub id: &'a str,
    pub tokens: &'a [TokenRecord],
}

/// The normalized tokens of one file. Pages keep the order of their first appearance in the file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    page_ids: Vec<String>,
    tokens: Paged<TokenRecord>,
    dual_annotations: Vec<(String, String)>,
    original_row_count: usize,
    final_row_count: usize,
}

impl Document {
    pub fn pages(&self) -> impl ExactSizeIterator<Item = Page<'_>> + '_ {
        self.page_ids
            .iter()
            .zip(self.tokens.pages())
            .map(|(id, tokens)| Page {
                id: id.as_str(),
                tokens,
            })
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenRecord> {
        self.tokens.items()
    }

    pub fn page_count(&self) -> usize {
        self.tokens.page_count()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// `(annotator1_label, annotator2_label)` of every row labelled by both annotators, in file
    /// order. Rows dropped for a missing ground truth or prediction are included.
    pub fn dual_annotations(&self) -> impl ExactSizeIterator<Item = (&str, &str)> + '_ {
        self.dual_annotations
            .iter()
            .map(|(a1, a2)| (a1.as_str(), a2.as_str()))
    }

    /// Number of raw rows received.
    pub fn original_row_count(&self) -> usize {
        self.original_row_count
    }

    /// Number of rows kept, once the rows without a ground truth or a prediction are dropped.
    pub fn final_row_count(&self) -> usize {
        self.final_row_count
    }
}

/// Reads the cells of one row through the resolved columns.
struct RowReader<'r> {
    columns: BTreeMap<Field, Vec<&'r str>>,
}

impl<'r> RowReader<'r> {
    fn cell<'a>(&self, row: &'a RawRow, field: Field) -> &'a Cell {
        self.columns
            .get(&field)
            .and_then(|keys| keys.iter().find_map(|key| row.get(*key)))
            .unwrap_or(&MISSING)
    }
}

struct LabelResolver<'c> {
    vocabulary: Option<&'c LabelVocabulary>,
    policy: UnknownLabelPolicy,
}

impl LabelResolver<'_> {
    /// `None` for a missing label.
    fn resolve(&self, cell: &Cell, field: Field, row: usize) -> Result<Option<String>> {
        let code = match cell.as_label() {
            None if cell.is_missing() => return Ok(None),
            None => return Err(EvalError::invalid_value(field.canonical_name(), row, cell)),
            Some(Either::Right(name)) => return Ok(Some(String::from(name))),
            Some(Either::Left(code)) => code,
        };
        match (self.vocabulary, self.policy) {
            (Some(vocabulary), policy) => match vocabulary.get(code) {
                Some(name) => Ok(Some(String::from(name))),
                None if policy == UnknownLabelPolicy::Fail => Err(UnknownLabelError {
                    code,
                    column: String::from(field.canonical_name()),
                }
                .into()),
                None => Ok(Some(code.to_string())),
            },
            (None, _) => Ok(Some(code.to_string())),
        }
    }
}

/// Validates and shapes the raw rows of one file.
///
/// * `rows`: The rows of the file, in file order.
/// * `config`: Supplies the schema, the ground truth column, the vocabulary and the unknown label
///   policy.
///
/// Fails with a `SchemaError` naming every missing required column, and with an `EmptyInputError`
/// when there is no row or when no row carries both a ground truth and a prediction.
pub fn normalize(rows: &[RawRow], config: &EvalConfig) -> Result<Document> {
    if rows.is_empty() {
        return Err(EmptyInputError(String::from("the file has no rows")).into());
    }
    let truth = config.ground_truth().field();
    let reader = RowReader {
        columns: config.schema().resolve(rows),
    };
    let missing: Vec<String> = [Field::PageId, truth, Field::Pred, Field::Prob]
        .into_iter()
        .filter(|field| !reader.columns.contains_key(field))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError { missing }.into());
    }
    let labels = LabelResolver {
        vocabulary: config.vocabulary(),
        policy: config.unknown_label(),
    };

    let mut page_index: AHashMap<String, usize> = AHashMap::new();
    let mut pages: Vec<Vec<TokenRecord>> = Vec::new();
    let mut page_ids: Vec<String> = Vec::new();
    let mut dual_annotations: Vec<(String, String)> = Vec::new();
    let mut dropped = 0;
    for (index, row) in rows.iter().enumerate() {
        let annotator1_label = labels.resolve(
            reader.cell(row, Field::Annotator1Label),
            Field::Annotator1Label,
            index,
        )?;
        let annotator2_label = labels.resolve(
            reader.cell(row, Field::Annotator2Label),
            Field::Annotator2Label,
            index,
        )?;
        // dual annotations are kept whether or not the row is labelled
        if let (Some(a1), Some(a2)) = (&annotator1_label, &annotator2_label) {
            dual_annotations.push((a1.clone(), a2.clone()));
        }
        let true_label = labels.resolve(reader.cell(row, truth), truth, index)?;
        let pred_label = labels.resolve(reader.cell(row, Field::Pred), Field::Pred, index)?;
        let (Some(true_label), Some(pred_label)) = (true_label, pred_label) else {
            dropped += 1;
            continue;
        };
        let record = TokenRecord {
            page_id: read_page_id(reader.cell(row, Field::PageId), index)?,
            block_id: read_optional_i64(reader.cell(row, Field::BlockId), Field::BlockId, index)?,
            word_id: read_optional_i64(reader.cell(row, Field::WordId), Field::WordId, index)?
                .unwrap_or(index as i64),
            word_text: reader.cell(row, Field::Words).as_text().unwrap_or_default(),
            bbox: read_bbox(reader.cell(row, Field::Bboxes), index)?,
            true_label,
            pred_label,
            prob: read_prob(reader.cell(row, Field::Prob), index)?,
            annotator1_label,
            annotator2_label,
        };
        let page = *page_index
            .entry(record.page_id.clone())
            .or_insert_with(|| {
                page_ids.push(record.page_id.clone());
                pages.push(Vec::new());
                pages.len() - 1
            });
        pages[page].push(record);
    }
    let final_row_count = rows.len() - dropped;
    if final_row_count == 0 {
        return Err(EmptyInputError(String::from(
            "no row carries both a ground truth and a prediction",
        ))
        .into());
    }
    for page in pages.iter_mut() {
        page.sort_by_key(|token| token.word_id);
    }
    debug!(
        original_row_count = rows.len(),
        final_row_count,
        dropped,
        pages = page_ids.len(),
        dual_annotations = dual_annotations.len(),
        "normalized rows"
    );
    Ok(Document {
        page_ids,
        tokens: pages.into_iter().collect(),
        dual_annotations,
        original_row_count: rows.len(),
        final_row_count,
    })
}

fn read_page_id(cell: &Cell, row: usize) -> Result<String> {
    cell.as_text()
        .ok_or_else(|| EvalError::invalid_value(Field::PageId.canonical_name(), row, cell))
}

fn read_optional_i64(cell: &Cell, field: Field, row: usize) -> Result<Option<i64>> {
    if cell.is_missing() {
        return Ok(None);
    }
    cell.as_i64()
        .map(Some)
        .ok_or_else(|| EvalError::invalid_value(field.canonical_name(), row, cell))
}

fn read_bbox(cell: &Cell, row: usize) -> Result<[f64; 4]> {
    if cell.is_missing() {
        return Ok([0.0; 4]);
    }
    cell.as_bbox()
        .ok_or_else(|| EvalError::invalid_value(Field::Bboxes.canonical_name(), row, cell))
}

fn read_prob(cell: &Cell, row: usize) -> Result<f64> {
    match cell.as_f64() {
        Some(p) if p.is_finite() && (0.0..=1.0).contains(&p) => Ok(p),
        _ => Err(EvalError::invalid_value(
            Field::Prob.canonical_name(),
            row,
            cell,
        )),
    }
}
