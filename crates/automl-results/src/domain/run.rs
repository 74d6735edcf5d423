//! Run definitions: one named framework configuration and its result files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A named framework configuration under benchmark.
///
/// `sources` may hold glob patterns while read from configuration; the
/// driver expects them resolved to concrete paths before loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDefinition {
    /// Display name; also the canonical framework name of its rows unless
    /// `renamings` says otherwise.
    pub name: String,

    #[serde(default)]
    pub sources: Vec<PathBuf>,

    /// Source framework label → canonical name.
    #[serde(default)]
    pub renamings: BTreeMap<String, String>,

    /// Marks the run as a normalization/imputation reference.
    #[serde(default, rename = "ref")]
    pub reference: bool,
}

impl RunDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            renamings: BTreeMap::new(),
            reference: false,
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn with_renaming(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renamings.insert(from.into(), to.into());
        self
    }

    pub fn as_reference(mut self) -> Self {
        self.reference = true;
        self
    }

    /// Canonical name for a framework label found in a source file.
    pub fn canonical_framework<'a>(&'a self, label: &'a str) -> &'a str {
        self.renamings.get(label).map(String::as_str).unwrap_or(label)
    }
}
