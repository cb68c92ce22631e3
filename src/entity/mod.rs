/*!
Entity spans and their exact-boundary matching. A span is decoded from the BIO tags of a single
page; a predicted span is a true positive only when the gold spans of the same page hold a span
with the same start, end and type.
*/
use crate::error::MalformedTagError;
use crate::metrics::{ClassCounts, Counts};
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use std::fmt::Display;
use std::ops::Deref;
use tracing::warn;

mod decoder;
mod tag;

pub use decoder::OrphanInside;
pub(crate) use decoder::{RawSpan, SpanDecoder};
pub use tag::{flat_to_bio, strip_prefix, Prefix, TagFormat, OUTSIDE};

/// Which tag sequence a span was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SpanSource {
    Gold,
    Predicted,
}

/// An entity span of a page. `start` and `end` are indices into the page's ordered token
/// sequence; `end` is inclusive. `kind` is the entity type, without its BIO prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EntitySpan<'a> {
    pub page_id: &'a str,
    pub start: usize,
    pub end: usize,
    pub kind: &'a str,
    pub source: SpanSource,
}

impl<'a> EntitySpan<'a> {
    fn from_raw(page_id: &'a str, source: SpanSource, raw: RawSpan<'a>) -> Self {
        let (start, end, kind) = raw;
        EntitySpan {
            page_id,
            start,
            end,
            kind,
            source,
        }
    }

    /// The identity used for exact matching.
    fn key(&self) -> (&'a str, usize, usize) {
        (self.page_id, self.start, self.end)
    }
}

impl Display for EntitySpan<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.kind, self.start, self.end)
    }
}

/// Decodes the BIO tags of a single page into its spans, in order of their start index.
///
/// ```rust
/// use doceval::{decode_spans, OrphanInside, SpanSource};
///
/// let tags = ["B-PER", "I-PER", "O", "I-LOC"];
/// let spans = decode_spans("P1", &tags, SpanSource::Gold, OrphanInside::Begin, '-').unwrap();
/// let spans: Vec<_> = spans.iter().map(|s| (s.start, s.end, s.kind)).collect();
/// assert_eq!(spans, vec![(0, 1, "PER"), (3, 3, "LOC")]);
/// ```
pub fn decode_spans<'a, S: AsRef<str>>(
    page_id: &'a str,
    tags: &'a [S],
    source: SpanSource,
    policy: OrphanInside,
    delimiter: char,
) -> Result<Vec<EntitySpan<'a>>, MalformedTagError> {
    let mut decoder = SpanDecoder::new(tags, policy, delimiter);
    let spans = decoder
        .by_ref()
        .map(|raw| raw.map(|r| EntitySpan::from_raw(page_id, source, r)))
        .collect::<Result<Vec<_>, _>>()?;
    if decoder.orphans > 0 {
        warn!(
            page_id,
            orphans = decoder.orphans,
            ?source,
            ?policy,
            "inside tags without an open span of their type"
        );
    }
    Ok(spans)
}

#[derive(Debug, PartialEq, Clone, Default)]
/// Entities are the spans of one or many pages, all decoded from the same source.
pub struct Entities<'a>(Vec<EntitySpan<'a>>);

impl<'a> Deref for Entities<'a> {
    type Target = [EntitySpan<'a>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for Entities<'a> {
    type Item = EntitySpan<'a>;
    type IntoIter = std::vec::IntoIter<EntitySpan<'a>>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> FromIterator<EntitySpan<'a>> for Entities<'a> {
    fn from_iter<T: IntoIterator<Item = EntitySpan<'a>>>(iter: T) -> Self {
        Entities(iter.into_iter().collect())
    }
}

impl<'a> Extend<EntitySpan<'a>> for Entities<'a> {
    fn extend<T: IntoIterator<Item = EntitySpan<'a>>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl<'a> Entities<'a> {
    pub fn new(spans: Vec<EntitySpan<'a>>) -> Self {
        Entities(spans)
    }

    /// Filters the entities for a given type and returns their `(page, start, end)` keys.
    ///
    /// * `kind`: Only the spans whose type is equal to `kind` are kept.
    pub fn filter<S: AsRef<str>>(&self, kind: S) -> AHashSet<(&'a str, usize, usize)> {
        let kind = kind.as_ref();
        self.iter()
            .filter(|e| e.kind == kind)
            .map(EntitySpan::key)
            .collect()
    }

    /// Filters the entities for a given type and returns the number of entities.
    pub fn filter_count<S: AsRef<str>>(&self, kind: S) -> usize {
        let kind = kind.as_ref();
        self.iter().filter(|e| e.kind == kind).count()
    }

    pub fn unique_kinds(&self) -> AHashSet<&'a str> {
        self.iter().map(|e| e.kind).collect()
    }

    fn by_kind(&self) -> AHashMap<&'a str, AHashSet<(&'a str, usize, usize)>> {
        let mut grouped: AHashMap<&'a str, AHashSet<(&'a str, usize, usize)>> =
            AHashMap::with_capacity(self.len());
        for e in self.iter() {
            grouped.entry(e.kind).or_default().insert(e.key());
        }
        grouped
    }

    /// Per-type counts of the exact matches between `self`, the gold spans, and `predicted`.
    /// Unmatched gold spans are false negatives and unmatched predicted spans false positives.
    pub fn match_counts(&self, predicted: &Entities<'a>) -> ClassCounts {
        let gold = self.by_kind();
        let pred = predicted.by_kind();
        let empty = AHashSet::default();
        let kinds: AHashSet<&&str> = gold.keys().chain(pred.keys()).collect();
        kinds
            .into_iter()
            .map(|kind| {
                let gold_set = gold.get(kind).unwrap_or(&empty);
                let pred_set = pred.get(kind).unwrap_or(&empty);
                let counts = Counts::new(
                    gold_set.intersection(pred_set).count(),
                    pred_set.len(),
                    gold_set.len(),
                );
                (*kind, counts)
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metrics::{classification_report, DivByZeroStrat};
    use crate::reporter::OverallAverage;
    use quickcheck::{QuickCheck, TestResult};

    fn spans<'a>(page_id: &'a str, tags: &'a [&'a str], source: SpanSource) -> Entities<'a> {
        decode_spans(page_id, tags, source, OrphanInside::Begin, '-')
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_exact_match_single_page() {
        let gold = spans("P1", &["B-PER", "I-PER", "O"], SpanSource::Gold);
        let pred = spans("P1", &["B-PER", "I-PER", "O"], SpanSource::Predicted);
        assert_eq!(
            gold.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            vec!["(PER, 0, 1)"]
        );
        let counts = gold.match_counts(&pred);
        assert_eq!(counts.get("PER"), Some(&Counts::new(1, 1, 1)));
        let reporter = classification_report(&counts, DivByZeroStrat::ReplaceBy0, false).unwrap();
        assert_eq!(reporter.class("PER").unwrap().fscore, 1.0);
    }

    #[test]
    fn test_boundary_mismatch_is_not_a_match() {
        let gold = spans("P2", &["B-PER", "I-PER"], SpanSource::Gold);
        let pred = spans("P2", &["B-PER", "O"], SpanSource::Predicted);
        assert_eq!(gold.filter("PER").into_iter().collect::<Vec<_>>(), vec![("P2", 0, 1)]);
        assert_eq!(pred.filter("PER").into_iter().collect::<Vec<_>>(), vec![("P2", 0, 0)]);
        let counts = gold.match_counts(&pred);
        assert_eq!(counts.get("PER"), Some(&Counts::new(0, 1, 1)));
        let reporter = classification_report(&counts, DivByZeroStrat::ReplaceBy0, false).unwrap();
        let per = reporter.class("PER").unwrap();
        assert_eq!((per.precision, per.recall, per.fscore), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_same_span_on_other_page_is_not_a_match() {
        let mut gold = spans("P1", &["B-PER"], SpanSource::Gold);
        gold.extend(spans("P2", &["O"], SpanSource::Gold));
        let pred = spans("P2", &["B-PER"], SpanSource::Predicted);
        let counts = gold.match_counts(&pred);
        assert_eq!(counts.get("PER"), Some(&Counts::new(0, 1, 1)));
    }

    #[test]
    fn test_type_mismatch() {
        let gold = spans("P1", &["B-PER", "I-PER", "O", "B-LOC"], SpanSource::Gold);
        let pred = spans("P1", &["B-LOC", "I-LOC", "O", "B-LOC"], SpanSource::Predicted);
        let counts = gold.match_counts(&pred);
        assert_eq!(counts.get("PER"), Some(&Counts::new(0, 0, 1)));
        assert_eq!(counts.get("LOC"), Some(&Counts::new(1, 2, 1)));
        assert_eq!(gold.filter_count("LOC"), 1);
        assert_eq!(pred.filter_count("LOC"), 2);
        let mut kinds: Vec<_> = gold.unique_kinds().into_iter().collect();
        kinds.sort();
        assert_eq!(kinds, vec!["LOC", "PER"]);
    }

    #[test]
    fn test_decode_spans_rejects_orphans() {
        let tags = ["O", "I-PER"];
        let err = decode_spans("P1", &tags, SpanSource::Predicted, OrphanInside::Reject, '-')
            .unwrap_err();
        assert_eq!(err.index, 1);
    }

    #[derive(Debug, Clone)]
    pub(crate) struct PageToTest(pub(crate) Vec<&'static str>);

    impl quickcheck::Arbitrary for PageToTest {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let choices = ["O", "B-PER", "I-PER", "B-LOC", "I-LOC", "TOTAL"];
            let len = usize::arbitrary(g) % 12;
            PageToTest((0..len).map(|_| *g.choose(&choices).unwrap()).collect())
        }
    }

    #[test]
    fn test_propertie_self_comparison_is_perfect() {
        fn self_comparison(pages: Vec<PageToTest>) -> TestResult {
            let page_ids: Vec<String> = (0..pages.len()).map(|i| format!("page-{}", i)).collect();
            let mut gold = Entities::default();
            let mut pred = Entities::default();
            for (page_id, page) in page_ids.iter().zip(pages.iter()) {
                gold.extend(spans(page_id, &page.0, SpanSource::Gold));
                pred.extend(spans(page_id, &page.0, SpanSource::Predicted));
            }
            if gold.is_empty() {
                return TestResult::discard();
            }
            let counts = gold.match_counts(&pred);
            let reporter =
                classification_report(&counts, DivByZeroStrat::ReplaceBy0, false).unwrap();
            let every_class_is_perfect = reporter
                .per_class()
                .all(|c| c.precision == 1.0 && c.recall == 1.0 && c.fscore == 1.0);
            let macro_is_perfect = reporter.overall(OverallAverage::Macro).unwrap().fscore == 1.0;
            TestResult::from_bool(every_class_is_perfect && macro_is_perfect)
        }
        let mut qc = QuickCheck::new().tests(500);
        qc.quickcheck(self_comparison as fn(Vec<PageToTest>) -> TestResult)
    }
}
