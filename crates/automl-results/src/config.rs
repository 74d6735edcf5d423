//! Benchmark configuration.
//!
//! Everything that shapes the preparation pipeline is read from a single
//! TOML document into [`BenchmarkConfig`] and threaded explicitly into
//! [`crate::pipeline`]; there is no ambient state.
//!
//! ```toml
//! folds = 10
//! duplicates_handling = "keep_last"
//!
//! [imputation]
//! framework = "constantpredictor"
//!
//! [normalization]
//! zero = { framework = "constantpredictor", statistic = "mean" }
//!
//! [[filters]]
//! column = "constraint"
//! equals = "1h8c"
//!
//! [[runs]]
//! name = "constantpredictor"
//! sources = ["results/constantpredictor*.csv"]
//! ref = true
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dedup::DuplicatesHandling;
use crate::domain::{ExecutionRecord, Orientation, Result, ResultsError, RunDefinition};
use crate::impute::ImputationPolicy;
use crate::normalize::NormalizationConfig;
use crate::score::{ScoreInverse, ScoringRules};

pub const DEFAULT_FOLDS: u32 = 10;
pub const DEFAULT_ERROR_MAX_LENGTH: usize = 200;

fn default_folds() -> u32 {
    DEFAULT_FOLDS
}

fn default_error_max_length() -> usize {
    DEFAULT_ERROR_MAX_LENGTH
}

/// Top-level benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Number of expected folds per task (`0..folds`).
    #[serde(default = "default_folds")]
    pub folds: u32,

    #[serde(default)]
    pub duplicates_handling: DuplicatesHandling,

    /// Maximum length of failure diagnostics kept in `info`.
    #[serde(default = "default_error_max_length")]
    pub error_max_length: usize,

    #[serde(default)]
    pub score_inverse: ScoreInverse,

    /// Orientation overrides by metric name.
    #[serde(default)]
    pub metric_orientations: BTreeMap<String, Orientation>,

    /// Disabled when absent.
    #[serde(default)]
    pub imputation: Option<ImputationPolicy>,

    /// Disabled when absent.
    #[serde(default)]
    pub normalization: Option<NormalizationConfig>,

    #[serde(default)]
    pub frameworks: FrameworkSelection,

    /// Tasks expected in every run, in addition to those observed.
    #[serde(default)]
    pub tasks: Vec<String>,

    #[serde(default)]
    pub filters: Vec<RowFilter>,

    /// Optional CSV with per-task metadata (`task`, `type`, `nrows`, ...).
    #[serde(default)]
    pub task_metadata: Option<PathBuf>,

    #[serde(default)]
    pub runs: Vec<RunDefinition>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            folds: DEFAULT_FOLDS,
            duplicates_handling: DuplicatesHandling::default(),
            error_max_length: DEFAULT_ERROR_MAX_LENGTH,
            score_inverse: ScoreInverse::default(),
            metric_orientations: BTreeMap::new(),
            imputation: None,
            normalization: None,
            frameworks: FrameworkSelection::default(),
            tasks: Vec::new(),
            filters: Vec::new(),
            task_metadata: None,
            runs: Vec::new(),
        }
    }
}

impl BenchmarkConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: BenchmarkConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file. Relative source and metadata
    /// paths are resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &PathBuf| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.clone()
            }
        };
        self.task_metadata = self.task_metadata.as_ref().map(resolve);
        for run in &mut self.runs {
            run.sources = run.sources.iter().map(resolve).collect();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.folds == 0 {
            return Err(ResultsError::Config("folds must be at least 1".to_string()));
        }
        if self.error_max_length < 4 {
            return Err(ResultsError::Config(format!(
                "error_max_length must be at least 4, got {}",
                self.error_max_length
            )));
        }

        let mut names = BTreeSet::new();
        for run in &self.runs {
            if run.name.trim().is_empty() {
                return Err(ResultsError::Config("run name must not be empty".to_string()));
            }
            if !names.insert(run.name.as_str()) {
                return Err(ResultsError::Config(format!(
                    "duplicate run name: {}",
                    run.name
                )));
            }
        }

        if let Some(policy) = &self.imputation {
            policy.validate()?;
        }
        if let Some(normalization) = &self.normalization {
            normalization.validate()?;
        }

        let overlap: Vec<&String> = self
            .frameworks
            .include
            .iter()
            .filter(|f| self.frameworks.exclude.contains(f))
            .collect();
        if !overlap.is_empty() {
            return Err(ResultsError::Config(format!(
                "frameworks both included and excluded: {overlap:?}"
            )));
        }
        Ok(())
    }

    pub fn scoring_rules(&self) -> ScoringRules {
        ScoringRules {
            overrides: self.metric_orientations.clone(),
            inverse: self.score_inverse,
        }
    }

    pub fn exclusions(&self) -> Exclusions {
        Exclusions {
            frameworks: self.frameworks.clone(),
            filters: self.filters.clone(),
            predicate: None,
        }
    }
}

/// Framework include/exclude lists. An empty include list admits every
/// framework; exclusion always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkSelection {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl FrameworkSelection {
    pub fn allows(&self, framework: &str) -> bool {
        if self.exclude.iter().any(|f| f == framework) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|f| f == framework)
    }
}

/// Declarative row predicate on a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    #[serde(flatten)]
    pub condition: FilterCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCondition {
    Equals(String),
    NotEquals(String),
    OneOf(Vec<String>),
}

impl RowFilter {
    pub fn equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            condition: FilterCondition::Equals(value.into()),
        }
    }

    /// Whether the record is kept. An absent column never equals anything.
    pub fn keeps(&self, record: &ExecutionRecord) -> bool {
        let value = record.column(&self.column);
        match (&self.condition, value) {
            (FilterCondition::Equals(expected), Some(v)) => &v == expected,
            (FilterCondition::Equals(_), None) => false,
            (FilterCondition::NotEquals(expected), Some(v)) => &v != expected,
            (FilterCondition::NotEquals(_), None) => true,
            (FilterCondition::OneOf(values), Some(v)) => values.contains(&v),
            (FilterCondition::OneOf(_), None) => false,
        }
    }
}

/// Arbitrary caller-supplied row predicate.
pub type RowPredicate = Arc<dyn Fn(&ExecutionRecord) -> bool + Send + Sync>;

/// Rows removed before preparation.
#[derive(Clone, Default)]
pub struct Exclusions {
    pub frameworks: FrameworkSelection,
    pub filters: Vec<RowFilter>,
    pub predicate: Option<RowPredicate>,
}

impl Exclusions {
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ExecutionRecord) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn keeps(&self, record: &ExecutionRecord) -> bool {
        self.frameworks.allows(&record.framework)
            && self.filters.iter().all(|f| f.keeps(record))
            && self.predicate.as_ref().map_or(true, |p| p(record))
    }
}

impl fmt::Debug for Exclusions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exclusions")
            .field("frameworks", &self.frameworks)
            .field("filters", &self.filters)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impute::ImputationPolicy;
    use crate::normalize::{OneAnchor, Statistic};

    const FULL: &str = r#"
        folds = 5
        duplicates_handling = "keep_last"
        error_max_length = 120
        score_inverse = "reciprocal"
        tasks = ["kc1", "credit-g"]

        [metric_orientations]
        brier = "lower"

        [imputation]
        framework = "constantpredictor"

        [normalization]
        zero = { framework = "constantpredictor", statistic = "mean" }
        one = "best_observed"

        [frameworks]
        exclude = ["RandomForest"]

        [[filters]]
        column = "constraint"
        equals = "1h8c"

        [[filters]]
        column = "mode"
        one_of = ["aws", "docker"]

        [[runs]]
        name = "constantpredictor"
        sources = ["results/constantpredictor.csv"]
        ref = true

        [[runs]]
        name = "AutoGluon"
        sources = ["results/autogluon_*.csv"]
        renamings = { autogluon = "AutoGluon" }
    "#;

    #[test]
    fn parses_full_document() {
        let config = BenchmarkConfig::from_toml_str(FULL).expect("parse config");
        assert_eq!(config.folds, 5);
        assert_eq!(config.duplicates_handling, DuplicatesHandling::KeepLast);
        assert_eq!(config.score_inverse, ScoreInverse::Reciprocal);
        assert_eq!(
            config.metric_orientations.get("brier"),
            Some(&Orientation::LowerIsBetter)
        );
        assert_eq!(
            config.imputation,
            Some(ImputationPolicy::Framework {
                framework: "constantpredictor".to_string()
            })
        );
        let norm = config.normalization.expect("normalization");
        assert_eq!(norm.zero.statistic, Statistic::Mean);
        assert_eq!(norm.one, OneAnchor::BestObserved);
        assert_eq!(config.filters.len(), 2);
        assert_eq!(
            config.filters[1].condition,
            FilterCondition::OneOf(vec!["aws".to_string(), "docker".to_string()])
        );
        assert_eq!(config.runs.len(), 2);
        assert!(config.runs[0].reference);
    }

    #[test]
    fn defaults_fail_on_duplicates_and_disable_optional_stages() {
        let config = BenchmarkConfig::from_toml_str("").expect("parse empty config");
        assert_eq!(config.folds, DEFAULT_FOLDS);
        assert_eq!(config.duplicates_handling, DuplicatesHandling::Fail);
        assert!(config.imputation.is_none());
        assert!(config.normalization.is_none());
    }

    #[test]
    fn rejects_duplicate_run_names() {
        let err = BenchmarkConfig::from_toml_str(
            r#"
            [[runs]]
            name = "A"
            [[runs]]
            name = "A"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate run name"));
    }

    #[test]
    fn rejects_zero_folds() {
        assert!(BenchmarkConfig::from_toml_str("folds = 0").is_err());
    }

    #[test]
    fn rejects_include_exclude_overlap() {
        let err = BenchmarkConfig::from_toml_str(
            r#"
            [frameworks]
            include = ["A"]
            exclude = ["A"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ResultsError::Config(_)));
    }

    #[test]
    fn framework_selection_exclude_wins() {
        let sel = FrameworkSelection {
            include: vec!["A".to_string(), "B".to_string()],
            exclude: vec!["B".to_string()],
        };
        assert!(sel.allows("A"));
        assert!(!sel.allows("B"));
        assert!(!sel.allows("C"));
    }

    #[test]
    fn row_filters_treat_absent_columns_explicitly() {
        let mut r = ExecutionRecord::new("t1", 0, "A", Some(0.5));
        r.constraint = Some("1h8c".to_string());

        assert!(RowFilter::equals("constraint", "1h8c").keeps(&r));
        assert!(!RowFilter::equals("mode", "aws").keeps(&r));

        let not_aws = RowFilter {
            column: "mode".to_string(),
            condition: FilterCondition::NotEquals("aws".to_string()),
        };
        assert!(not_aws.keeps(&r));
    }

    #[test]
    fn exclusions_apply_predicate_after_filters() {
        let exclusions = BenchmarkConfig::default()
            .exclusions()
            .with_predicate(|r| r.fold < 5);
        assert!(exclusions.keeps(&ExecutionRecord::new("t1", 4, "A", None)));
        assert!(!exclusions.keeps(&ExecutionRecord::new("t1", 5, "A", None)));
    }

    #[test]
    fn from_file_resolves_relative_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bench.toml");
        std::fs::write(
            &path,
            "[[runs]]\nname = \"A\"\nsources = [\"res/a.csv\"]\n",
        )
        .expect("write config");

        let config = BenchmarkConfig::from_file(&path).expect("load config");
        assert_eq!(config.runs[0].sources[0], dir.path().join("res/a.csv"));
    }
}
