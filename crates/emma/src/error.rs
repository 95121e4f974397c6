use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by static configuration: malformed predicates, vocabularies
/// or search settings. These never occur once a search is running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmmError {
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),
    #[error("Invalid vocabulary: {0}")]
    InvalidVocabulary(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("DataFrame error: {0}")]
    DataFrame(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, EmmError>;

impl From<PolarsError> for EmmError {
    fn from(e: PolarsError) -> Self {
        Self::DataFrame(e.to_string())
    }
}

impl From<serde_json::Error> for EmmError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Failure of a caller-supplied callback for one description.
///
/// Non-fatal: the controller logs it and drops the description from the
/// results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Degenerate subgroup: {0}")]
    Degenerate(String),
    #[error("Numerical error: {0}")]
    Numerical(String),
    #[error("Callback failed: {0}")]
    Callback(String),
}

impl EvalError {
    pub fn from_polars(e: PolarsError) -> Self {
        Self::Callback(e.to_string())
    }
}

impl From<PolarsError> for EvalError {
    fn from(e: PolarsError) -> Self {
        Self::from_polars(e)
    }
}
