/*
 * This modules contains the `EvalConfig` struct, which implements the default trait, and its
 * builder. A config is passed to every evaluation entry point to simplify their arguments; it is
 * an immutable value, so concurrent runs with different configs never interfere.
*/
use crate::entity::{OrphanInside, TagFormat};
use crate::metrics::DivByZeroStrat;
use crate::record::{GroundTruth, LabelVocabulary, Schema, UnknownLabelPolicy};
use std::fmt::Display;
use std::sync::Arc;

/// Default number of confusion pairs listed by the error analysis.
pub const DEFAULT_TOP_CONFUSIONS: usize = 20;

#[derive(Clone, Debug, PartialEq)]
/// Config struct used to simplify the inputs of the evaluation functions. It implements the
/// default trait.
pub struct EvalConfig {
    pub(crate) zero_division: DivByZeroStrat,
    pub(crate) orphan_inside: OrphanInside,
    pub(crate) unknown_label: UnknownLabelPolicy,
    pub(crate) ground_truth: GroundTruth,
    pub(crate) gold_format: TagFormat,
    pub(crate) pred_format: TagFormat,
    pub(crate) delimiter: char,
    pub(crate) top_confusions: usize,
    pub(crate) parallel: bool,
    pub(crate) vocabulary: Option<Arc<LabelVocabulary>>,
    pub(crate) schema: Schema,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            zero_division: DivByZeroStrat::ReplaceBy0,
            orphan_inside: OrphanInside::Begin,
            unknown_label: UnknownLabelPolicy::PassThrough,
            ground_truth: GroundTruth::Labels,
            gold_format: TagFormat::Bio,
            pred_format: TagFormat::Bio,
            delimiter: '-',
            top_confusions: DEFAULT_TOP_CONFUSIONS,
            parallel: false,
            vocabulary: None,
            schema: Schema::default(),
        }
    }
}

impl EvalConfig {
    pub fn zero_division(&self) -> DivByZeroStrat {
        self.zero_division
    }
    pub fn orphan_inside(&self) -> OrphanInside {
        self.orphan_inside
    }
    pub fn unknown_label(&self) -> UnknownLabelPolicy {
        self.unknown_label
    }
    pub fn ground_truth(&self) -> GroundTruth {
        self.ground_truth
    }
    pub fn gold_format(&self) -> TagFormat {
        self.gold_format
    }
    pub fn pred_format(&self) -> TagFormat {
        self.pred_format
    }
    pub fn delimiter(&self) -> char {
        self.delimiter
    }
    pub fn top_confusions(&self) -> usize {
        self.top_confusions
    }
    pub fn parallel(&self) -> bool {
        self.parallel
    }
    pub fn vocabulary(&self) -> Option<&LabelVocabulary> {
        self.vocabulary.as_deref()
    }
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl Display for EvalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let vocabulary = self
            .vocabulary
            .as_ref()
            .map_or(String::from("none"), |v| format!("{} labels", v.len()));
        write!(
            f,
            "Strategy when encountering a division by zero: {}\n \
             Orphan inside tags: {}\n \
             Unknown label codes: {}\n \
             Ground truth column: {}\n \
             Gold tags format: {}\n \
             Predicted tags format: {}\n \
             Prefix delimiter: {}\n \
             Confusion pairs reported: {}\n \
             Using parallel computations: {}\n \
             Label vocabulary: {}",
            self.zero_division,
            self.orphan_inside,
            self.unknown_label,
            self.ground_truth,
            self.gold_format,
            self.pred_format,
            self.delimiter,
            self.top_confusions,
            self.parallel,
            vocabulary
        )
    }
}

/// This builder can be used to build and customize an `EvalConfig` structure.
#[derive(Clone, Debug, Default)]
pub struct EvalConfigBuilder {
    config: EvalConfig,
}

impl EvalConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn division_by_zero(mut self, division_by_zero: DivByZeroStrat) -> Self {
        self.config.zero_division = division_by_zero;
        self
    }
    pub fn orphan_inside(mut self, orphan_inside: OrphanInside) -> Self {
        self.config.orphan_inside = orphan_inside;
        self
    }
    pub fn unknown_label(mut self, unknown_label: UnknownLabelPolicy) -> Self {
        self.config.unknown_label = unknown_label;
        self
    }
    pub fn ground_truth(mut self, ground_truth: GroundTruth) -> Self {
        self.config.ground_truth = ground_truth;
        self
    }
    pub fn gold_format(mut self, gold_format: TagFormat) -> Self {
        self.config.gold_format = gold_format;
        self
    }
    pub fn pred_format(mut self, pred_format: TagFormat) -> Self {
        self.config.pred_format = pred_format;
        self
    }
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }
    pub fn top_confusions(mut self, top_confusions: usize) -> Self {
        self.config.top_confusions = top_confusions;
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }
    pub fn vocabulary(mut self, vocabulary: Arc<LabelVocabulary>) -> Self {
        self.config.vocabulary = Some(vocabulary);
        self
    }
    pub fn schema(mut self, schema: Schema) -> Self {
        self.config.schema = schema;
        self
    }
    pub fn build(self) -> EvalConfig {
        self.config
    }
}
