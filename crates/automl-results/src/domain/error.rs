//! Error taxonomy for results preparation.
//!
//! Only data-integrity problems are errors. Sparse data (empty sources,
//! missing reference values, malformed results) is reported through
//! [`PreparationWarning`] and degrades to missing values instead.

use serde::{Deserialize, Serialize};

use crate::domain::record::RecordKey;

/// Fatal errors produced while preparing benchmark results.
#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error("duplicate records for {} key(s): {}", keys.len(), format_keys(keys))]
    DuplicateRecords { keys: Vec<RecordKey> },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid record in {source_name} at row {row}: {reason}")]
    InvalidRecord {
        source_name: String,
        row: usize,
        reason: String,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for results preparation.
pub type Result<T> = std::result::Result<T, ResultsError>;

fn format_keys(keys: &[RecordKey]) -> String {
    const SHOWN: usize = 5;
    let mut out = keys
        .iter()
        .take(SHOWN)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    if keys.len() > SHOWN {
        out.push_str(&format!(", ... ({} more)", keys.len() - SHOWN));
    }
    out
}

/// Non-fatal condition observed during preparation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreparationWarning {
    /// A run resolved to zero source files; all its combinations are missing.
    EmptySource { run: String },

    /// A reference framework had no usable value for a task (and fold, when
    /// the lookup is fold-scoped).
    MissingReference {
        task: String,
        framework: String,
        fold: Option<u32>,
        purpose: ReferencePurpose,
    },

    /// A result that could not be parsed as a number.
    MalformedResult { key: RecordKey, raw: String },
}

/// What a reference value was needed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePurpose {
    Imputation,
    ZeroAnchor,
    OneAnchor,
}

impl std::fmt::Display for ReferencePurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Imputation => "imputation",
            Self::ZeroAnchor => "zero_anchor",
            Self::OneAnchor => "one_anchor",
        };
        f.write_str(s)
    }
}
