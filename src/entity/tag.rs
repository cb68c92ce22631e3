/*!
Parsing of individual BIO tags. A tag is either `O`, `B-<TYPE>` or `I-<TYPE>`; a label carrying no
recognized prefix is a *flat* label and is read as an inside tag of its own type, so that runs of
flat labels decode to one span per run.
*/
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// The outside tag.
pub const OUTSIDE: &str = "O";

/// Position marker of a token relative to an entity span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence)]
pub enum Prefix {
    B,
    I,
    O,
}

/// A tag split into its prefix and its entity type. The type of an `O` tag is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ParsedTag<'a> {
    pub(crate) prefix: Prefix,
    pub(crate) kind: &'a str,
}

impl<'a> ParsedTag<'a> {
    pub(crate) fn parse(tag: &'a str, delimiter: char) -> Self {
        let tag = tag.trim();
        if tag == OUTSIDE {
            return Self {
                prefix: Prefix::O,
                kind: "",
            };
        }
        let mut chars = tag.chars();
        let prefix = match (chars.next(), chars.next()) {
            (Some('B'), Some(d)) if d == delimiter => Some(Prefix::B),
            (Some('I'), Some(d)) if d == delimiter => Some(Prefix::I),
            _ => None,
        };
        let prefix_len = 1 + delimiter.len_utf8();
        match prefix {
            Some(prefix) if tag.len() > prefix_len => Self {
                prefix,
                kind: &tag[prefix_len..],
            },
            _ => Self {
                prefix: Prefix::I,
                kind: tag,
            },
        }
    }
}

/// Strips the `B-`/`I-` prefix of a tag, leaving its entity type. `O` and flat labels are returned
/// as is.
///
/// ```rust
/// use doceval::strip_prefix;
///
/// assert_eq!(strip_prefix("B-ADDRESS", '-'), "ADDRESS");
/// assert_eq!(strip_prefix("TOTAL", '-'), "TOTAL");
/// assert_eq!(strip_prefix("O", '-'), "O");
/// ```
pub fn strip_prefix(tag: &str, delimiter: char) -> &str {
    let parsed = ParsedTag::parse(tag, delimiter);
    match parsed.prefix {
        Prefix::O => OUTSIDE,
        _ => parsed.kind,
    }
}

/// Converts flat labels into BIO tags: the first label of every contiguous run becomes `B-<label>`,
/// the following ones `I-<label>`, and `O` stays `O`. Labels that already carry a prefix are
/// stripped first.
///
/// ```rust
/// use doceval::flat_to_bio;
///
/// let flat = ["ADDRESS", "ADDRESS", "O", "TOTAL", "ADDRESS"];
/// assert_eq!(
///     flat_to_bio(&flat, '-'),
///     vec!["B-ADDRESS", "I-ADDRESS", "O", "B-TOTAL", "B-ADDRESS"]
/// );
/// ```
pub fn flat_to_bio<S: AsRef<str>>(labels: &[S], delimiter: char) -> Vec<String> {
    let mut previous: Option<&str> = None;
    labels
        .iter()
        .map(|label| {
            let current = strip_prefix(label.as_ref(), delimiter);
            let tag = if current == OUTSIDE {
                String::from(OUTSIDE)
            } else if previous == Some(current) {
                format!("I{}{}", delimiter, current)
            } else {
                format!("B{}{}", delimiter, current)
            };
            previous = Some(current);
            tag
        })
        .collect()
}

/// How the labels of a column are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Sequence)]
pub enum TagFormat {
    /// Labels already are BIO tags.
    #[default]
    Bio,
    /// Labels are plain entity types; contiguous runs form one entity.
    Flat,
}

impl TagFormat {
    /// Returns the BIO tags of a page as owned strings when a conversion is needed.
    pub(crate) fn to_bio_owned(&self, labels: &[&str], delimiter: char) -> Option<Vec<String>> {
        match self {
            Self::Bio => None,
            Self::Flat => Some(flat_to_bio(labels, delimiter)),
        }
    }
}

impl Display for TagFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for TagFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bio" | "iob2" => Ok(Self::Bio),
            "flat" => Ok(Self::Flat),
            _ => Err(format!("Impossible to parse the string ({}) into a TagFormat", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("O", Prefix::O, "")]
    #[case("B-PER", Prefix::B, "PER")]
    #[case("I-PER", Prefix::I, "PER")]
    #[case("B-TOTAL-AMOUNT", Prefix::B, "TOTAL-AMOUNT")]
    #[case("ADDRESS", Prefix::I, "ADDRESS")]
    #[case("B-", Prefix::I, "B-")]
    #[case(" I-DATE ", Prefix::I, "DATE")]
    fn test_parse_tag(#[case] tag: &str, #[case] prefix: Prefix, #[case] kind: &str) {
        let parsed = ParsedTag::parse(tag, '-');
        assert_eq!(parsed, ParsedTag { prefix, kind });
    }

    #[test]
    fn test_parse_tag_other_delimiter() {
        assert_eq!(
            ParsedTag::parse("B_PER", '_'),
            ParsedTag {
                prefix: Prefix::B,
                kind: "PER"
            }
        );
        assert_eq!(
            ParsedTag::parse("B-PER", '_'),
            ParsedTag {
                prefix: Prefix::I,
                kind: "B-PER"
            }
        );
    }

    #[test]
    fn test_flat_to_bio_keeps_prefixed_runs() {
        let labels = ["B-PER", "I-PER", "PER", "O", "O", "LOC"];
        assert_eq!(
            flat_to_bio(&labels, '-'),
            vec!["B-PER", "I-PER", "I-PER", "O", "O", "B-LOC"]
        );
    }

    #[test]
    fn test_tag_format_to_bio_owned() {
        let labels = ["PER", "PER"];
        assert_eq!(TagFormat::Bio.to_bio_owned(&labels, '-'), None);
        assert_eq!(
            TagFormat::Flat.to_bio_owned(&labels, '-'),
            Some(vec![String::from("B-PER"), String::from("I-PER")])
        );
    }

    #[rstest]
    #[case("bio", TagFormat::Bio)]
    #[case("IOB2", TagFormat::Bio)]
    #[case("Flat", TagFormat::Flat)]
    fn test_tag_format_from_str(#[case] input: &str, #[case] expected: TagFormat) {
        assert_eq!(input.parse::<TagFormat>().unwrap(), expected);
    }
}
