use thiserror::Error;

use crate::question::QuestionType;

/// Error taxonomy for survey construction and querying.
///
/// Structural-integrity problems, lookup failures and type-coercion failures
/// are all fatal; schema mismatches between structure and data are *not*
/// errors (they are reported through `tracing::warn!` and a report value by
/// the reconciliation step).
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("data error: {0}")]
    Data(#[from] polars::error::PolarsError),

    /// Malformed questionnaire structure (missing nodes, bad attributes).
    #[error("malformed survey structure: {0}")]
    Structure(String),

    /// Subquestions sharing one question group disagree on the type.
    #[error("question group '{group}' has inconsistent types: {types:?}")]
    InconsistentTypes {
        group: String,
        types: Vec<QuestionType>,
    },

    #[error("unexpected question code '{0}'")]
    UnknownQuestion(String),

    /// A raw export was detected but a sentinel column used for the
    /// question-range split is absent.
    #[error("sentinel column '{0}' not found in responses header")]
    MissingSentinel(String),

    #[error("cannot parse '{value}' in column '{column}' as {expected}")]
    Coercion {
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("invalid filter expression: {0}")]
    InvalidExpression(String),

    /// Deliberately unimplemented mutation surface; the model is read-only
    /// after construction.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, SurveyError>;
