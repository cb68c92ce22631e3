use crate::entity::tag::{ParsedTag, Prefix};
use crate::error::MalformedTagError;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::iter::Enumerate;
use std::slice::Iter;
use std::str::FromStr;

/// What to do with an `I-<T>` tag that does not continue an open span of type `T`, either because
/// no span is open or because the open span has another type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Sequence)]
pub enum OrphanInside {
    /// Treat the tag as `B-<T>`: a new span starts at this index.
    #[default]
    Begin,
    /// Close any open span and drop the tag; it belongs to no span.
    Ignore,
    /// Stop decoding with a `MalformedTagError`.
    Reject,
}

impl Display for OrphanInside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for OrphanInside {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "begin" | "lenient" => Ok(Self::Begin),
            "ignore" => Ok(Self::Ignore),
            "reject" | "strict" => Ok(Self::Reject),
            _ => Err(format!(
                "Impossible to parse the string ({}) into an OrphanInside policy",
                s
            )),
        }
    }
}

/// A decoded span, as `(start, end, type)` with an inclusive `end`.
pub(crate) type RawSpan<'a> = (usize, usize, &'a str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State<'a> {
    Outside,
    Inside { kind: &'a str, start: usize },
}

/// This struct iterates over the tags of a *single* page and returns the spans associated with
/// it. Spans are emitted in order of their start index; a span still open when the tags run out is
/// closed on the last index.
pub(crate) struct SpanDecoder<'a, S> {
    tags: Enumerate<Iter<'a, S>>,
    state: State<'a>,
    policy: OrphanInside,
    delimiter: char,
    len: usize,
    /// Number of orphan inside tags repaired or dropped so far.
    pub(crate) orphans: usize,
}

impl<'a, S: AsRef<str>> SpanDecoder<'a, S> {
    pub(crate) fn new(tags: &'a [S], policy: OrphanInside, delimiter: char) -> Self {
        SpanDecoder {
            tags: tags.iter().enumerate(),
            state: State::Outside,
            policy,
            delimiter,
            len: tags.len(),
            orphans: 0,
        }
    }

    /// Closes the open span, if any. `end` is exclusive.
    fn close(&mut self, end: usize) -> Option<RawSpan<'a>> {
        match std::mem::replace(&mut self.state, State::Outside) {
            State::Outside => None,
            State::Inside { kind, start } => Some((start, end - 1, kind)),
        }
    }

    /// Closes the open span and opens a new one of type `kind` at `index`.
    fn open(&mut self, kind: &'a str, index: usize) -> Option<RawSpan<'a>> {
        let closed = self.close(index);
        self.state = State::Inside { kind, start: index };
        closed
    }
}

impl<'a, S: AsRef<str>> Iterator for SpanDecoder<'a, S> {
    type Item = Result<RawSpan<'a>, MalformedTagError>;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some((index, tag)) = self.tags.next() else {
                // no more tags: the end of the page closes the last span
                return self.close(self.len).map(Ok);
            };
            let parsed = ParsedTag::parse(tag.as_ref(), self.delimiter);
            let closed = match (parsed.prefix, self.state) {
                (Prefix::O, _) => self.close(index),
                (Prefix::B, _) => self.open(parsed.kind, index),
                (Prefix::I, State::Inside { kind, .. }) if kind == parsed.kind => None,
                (Prefix::I, _) => {
                    match self.policy {
                        OrphanInside::Reject => {
                            return Some(Err(MalformedTagError {
                                tag: tag.as_ref().to_string(),
                                index,
                            }))
                        }
                        OrphanInside::Begin => {
                            self.orphans += 1;
                            self.open(parsed.kind, index)
                        }
                        OrphanInside::Ignore => {
                            self.orphans += 1;
                            self.close(index)
                        }
                    }
                }
            };
            if closed.is_some() {
                return closed.map(Ok);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};
    use rstest::rstest;

    /// One canonical `(prefix, type)` pair per token: `B` on the first token of a span, `I` on the
    /// following ones and `O` elsewhere.
    fn encode<'a>(spans: &[RawSpan<'a>], len: usize) -> Vec<(Prefix, &'a str)> {
        let mut encoded = vec![(Prefix::O, ""); len];
        for &(start, end, kind) in spans {
            for (offset, slot) in encoded[start..=end].iter_mut().enumerate() {
                *slot = if offset == 0 {
                    (Prefix::B, kind)
                } else {
                    (Prefix::I, kind)
                };
            }
        }
        encoded
    }

    fn decode<'a>(
        tags: &'a [impl AsRef<str>],
        policy: OrphanInside,
        delimiter: char,
    ) -> Result<Vec<RawSpan<'a>>, MalformedTagError> {
        SpanDecoder::new(tags, policy, delimiter).collect()
    }

    #[rstest]
    #[case(vec!["B-PER", "I-PER", "O"], vec![(0, 1, "PER")])]
    #[case(vec!["B-PER", "O"], vec![(0, 0, "PER")])]
    #[case(vec!["B-PER", "I-PER"], vec![(0, 1, "PER")])]
    #[case(vec!["B-PER", "B-PER", "I-PER"], vec![(0, 0, "PER"), (1, 2, "PER")])]
    #[case(vec!["O", "O"], vec![])]
    #[case(vec![], vec![])]
    #[case(
        vec!["O", "B-MISC", "I-MISC", "I-MISC", "O", "B-PER", "I-PER", "B-LOC"],
        vec![(1, 3, "MISC"), (5, 6, "PER"), (7, 7, "LOC")]
    )]
    fn test_decode_well_formed(#[case] tags: Vec<&str>, #[case] expected: Vec<RawSpan>) {
        for policy in enum_iterator::all::<OrphanInside>() {
            assert_eq!(decode(&tags, policy, '-').unwrap(), expected);
        }
    }

    #[rstest]
    #[case(vec!["I-PER", "I-PER", "O"], vec![(0, 1, "PER")])]
    #[case(vec!["B-PER", "I-LOC", "I-LOC"], vec![(0, 0, "PER"), (1, 2, "LOC")])]
    #[case(vec!["O", "I-LOC"], vec![(1, 1, "LOC")])]
    #[case(vec!["ADDRESS", "ADDRESS", "O", "TOTAL"], vec![(0, 1, "ADDRESS"), (3, 3, "TOTAL")])]
    fn test_decode_orphan_begin(#[case] tags: Vec<&str>, #[case] expected: Vec<RawSpan>) {
        assert_eq!(decode(&tags, OrphanInside::Begin, '-').unwrap(), expected);
    }

    #[rstest]
    #[case(vec!["I-PER", "I-PER", "O"], vec![])]
    #[case(vec!["B-PER", "I-LOC", "I-LOC"], vec![(0, 0, "PER")])]
    #[case(vec!["B-PER", "I-LOC", "B-LOC", "I-LOC"], vec![(0, 0, "PER"), (2, 3, "LOC")])]
    fn test_decode_orphan_ignore(#[case] tags: Vec<&str>, #[case] expected: Vec<RawSpan>) {
        assert_eq!(decode(&tags, OrphanInside::Ignore, '-').unwrap(), expected);
    }

    #[test]
    fn test_decoder_counts_orphans() {
        let tags = ["I-PER", "I-PER", "B-LOC", "I-PER", "O"];
        let mut decoder = SpanDecoder::new(&tags, OrphanInside::Ignore, '-');
        let spans: Vec<_> = decoder.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(spans, vec![(2, 2, "LOC")]);
        assert_eq!(decoder.orphans, 3);
    }

    #[test]
    fn test_decode_orphan_reject() {
        let tags = ["B-PER", "I-PER", "O", "I-LOC"];
        let err = decode(&tags, OrphanInside::Reject, '-').unwrap_err();
        assert_eq!(
            err,
            MalformedTagError {
                tag: String::from("I-LOC"),
                index: 3
            }
        );
    }

    #[test]
    fn test_encode() {
        let spans = vec![(0, 1, "PER"), (3, 3, "LOC")];
        assert_eq!(
            encode(&spans, 5),
            vec![
                (Prefix::B, "PER"),
                (Prefix::I, "PER"),
                (Prefix::O, ""),
                (Prefix::B, "LOC"),
                (Prefix::O, ""),
            ]
        );
    }

    #[derive(Debug, Clone, Copy)]
    struct TagToTest(&'static str);

    impl quickcheck::Arbitrary for TagToTest {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let choices = ["O", "B-PER", "I-PER", "B-LOC", "I-LOC", "DATE"];
            TagToTest(g.choose(&choices).unwrap())
        }
    }

    #[test]
    fn test_propertie_decoding_is_idempotent_and_well_formed() {
        fn decoding(tags: Vec<TagToTest>) -> TestResult {
            let tags: Vec<&str> = tags.into_iter().map(|t| t.0).collect();
            for policy in [OrphanInside::Begin, OrphanInside::Ignore] {
                let first = decode(&tags, policy, '-').unwrap();
                let second = decode(&tags, policy, '-').unwrap();
                if first != second {
                    return TestResult::failed();
                }
                let mut previous_end: Option<usize> = None;
                for &(start, end, _) in first.iter() {
                    let ordered = previous_end.map_or(true, |p| p < start);
                    if start > end || end >= tags.len() || !ordered {
                        return TestResult::failed();
                    }
                    previous_end = Some(end);
                }
                // Re-encoding then decoding is a fixed point.
                let encoded: Vec<String> = encode(&first, tags.len())
                    .into_iter()
                    .map(|(prefix, kind)| match prefix {
                        Prefix::O => String::from("O"),
                        _ => format!("{:?}-{}", prefix, kind),
                    })
                    .collect();
                if decode(&encoded, policy, '-').unwrap() != first {
                    return TestResult::failed();
                }
            }
            TestResult::passed()
        }
        let mut qc = QuickCheck::new().tests(2000);
        qc.quickcheck(decoding as fn(Vec<TagToTest>) -> TestResult)
    }
}
