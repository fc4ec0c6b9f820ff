// crates/hydws-core/src/error.rs

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unknown hydraulic field(s) {names:?}; must be one of {expected:?}")]
    UnknownField {
        names: Vec<String>,
        expected: Vec<&'static str>,
    },

    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    #[error("merge conflict in {target}: {reason}")]
    MergeConflict { target: String, reason: String },

    #[error("Polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("{context}: invalid configuration: {message}")]
    ConfigFormat { context: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RuleError {
    pub(crate) fn config(context: impl Into<String>, message: impl Into<String>) -> Self {
        RuleError::ConfigFormat {
            context: context.into(),
            message: message.into(),
        }
    }
}
