/*!
Error types returned by the evaluation engine. Each failure the caller may want to react to
(skip a file, abort the run, fix the input) has its own type; `EvalError` wraps them all.
*/
use ndarray_stats::errors::MultiInputError;
use thiserror::Error;

/// Result type of the fallible operations of this crate.
pub type Result<T> = std::result::Result<T, EvalError>;

/// One or more required columns are absent from a file. The columns are named by their canonical
/// name (e.g. `page_id`, `pred`), not by the alias that was searched for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required column(s): {}", .missing.join(", "))]
pub struct SchemaError {
    pub missing: Vec<String>,
}

/// An integer label code has no entry in the label vocabulary and the `Fail` policy is in use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("label code {code} in column `{column}` has no entry in the label vocabulary")]
pub struct UnknownLabelError {
    pub code: i64,
    pub column: String,
}

/// Nothing to evaluate: zero files, zero rows or zero labelled rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("received an empty input: {0}")]
pub struct EmptyInputError(pub String);

/// An `I-` tag was found outside of a span of the same type while the `Reject` policy is in use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed tag `{tag}` at index {index}: inside tag does not continue an open span")]
pub struct MalformedTagError {
    pub tag: String,
    pub index: usize,
}

/// Enum error encompassing every failure that can happen while normalizing records and computing
/// the metrics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    UnknownLabel(#[from] UnknownLabelError),
    #[error(transparent)]
    EmptyInput(#[from] EmptyInputError),
    #[error(transparent)]
    MalformedTag(#[from] MalformedTagError),
    #[error("invalid value `{value}` in column `{column}` at row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },
    #[error("encountered division by zero")]
    DivisionByZero,
    #[error(transparent)]
    Statistics(#[from] MultiInputError),
}

impl EvalError {
    pub(crate) fn invalid_value(column: &str, row: usize, value: impl ToString) -> Self {
        Self::InvalidValue {
            column: column.to_string(),
            row,
            value: value.to_string(),
        }
    }

    /// True for the errors signalling a structurally unusable file (schema or empty input), as
    /// opposed to a bad value inside an otherwise well-formed file.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::Schema(_) | Self::EmptyInput(_))
    }
}
