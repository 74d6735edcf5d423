//! Score file naming conventions.
//!
//! Benchmark outputs name their score files after what they contain:
//!
//! | file name                       | framework | benchmark | task |
//! |---------------------------------|-----------|-----------|------|
//! | `results.csv`                   |           |           |      |
//! | `<fw>_benchmark_<bm>.csv`       | x         | x         |      |
//! | `benchmark_<bm>.csv`            |           | x         |      |
//! | `<fw>_task_<task>.csv`          | x         |           | x    |
//! | `task_<task>.csv`               |           |           | x    |
//! | `<fw>.csv`                      | x         |           |      |
//!
//! Output directories follow `<fw>_<bm>_<constraint>_<mode>_<yyyymmddThhmmss>`,
//! with score files either directly inside or under a `scores/` folder.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::RunDefinition;

pub const RESULTS_FILE: &str = "results.csv";

const FILE_PATTERNS: &[&str] = &[
    r"^results\.csv$",
    r"^task_(?P<task>[\w\-]+)\.csv$",
    r"^benchmark_(?P<benchmark>[\w\-]+)\.csv$",
    r"^(?P<framework>[\w\-]+?)_task_(?P<task>[\w\-]+)\.csv$",
    r"^(?P<framework>[\w\-]+?)_benchmark_(?P<benchmark>[\w\-]+)\.csv$",
    r"^(?P<framework>[\w\-]+)\.csv$",
];

const OUTPUT_DIR_PATTERN: &str = r"^(?P<framework>[\w\-]+?)_(?P<benchmark>[\w\-]+)_(?P<constraint>[\w\-]+)_(?P<mode>[\w\-]+)_(?P<datetime>\d{8}T\d{6})$";

fn file_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        FILE_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("score file pattern is a valid regex"))
            .collect()
    })
}

fn output_dir_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(OUTPUT_DIR_PATTERN).expect("output directory pattern is a valid regex")
    })
}

/// What a score file's path says about its content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFile {
    pub path: PathBuf,
    pub framework: Option<String>,
    pub benchmark: Option<String>,
    pub task: Option<String>,
    pub constraint: Option<String>,
    pub mode: Option<String>,
    /// Run timestamp as found in the output directory name.
    pub datetime: Option<String>,
}

impl ScoreFile {
    /// `None` when the file name follows none of the known conventions.
    pub fn parse(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let name = path.file_name()?.to_str()?;
        let caps = file_patterns().iter().find_map(|re| re.captures(name))?;
        let group = |g: &str| caps.name(g).map(|m| m.as_str().to_string());

        let mut file = ScoreFile {
            path: path.to_path_buf(),
            framework: group("framework"),
            benchmark: group("benchmark"),
            task: group("task"),
            ..ScoreFile::default()
        };
        if let Some(dir) = output_dir(path) {
            file.complete_from_dir(&dir);
        }
        Some(file)
    }

    fn complete_from_dir(&mut self, dir: &str) {
        let Some(caps) = output_dir_pattern().captures(dir) else {
            return;
        };
        let group = |g: &str| caps.name(g).map(|m| m.as_str().to_string());
        self.framework = self.framework.take().or_else(|| group("framework"));
        self.benchmark = self.benchmark.take().or_else(|| group("benchmark"));
        self.constraint = group("constraint");
        self.mode = group("mode");
        self.datetime = group("datetime");
    }

    /// Name of the run this file belongs to, when it can be told.
    pub fn run_name(&self) -> Option<&str> {
        self.framework.as_deref()
    }
}

/// Name of the output directory holding `path`, skipping a `scores/` folder.
fn output_dir(path: &Path) -> Option<String> {
    let parent = path.parent()?;
    let name = parent.file_name()?.to_str()?;
    if name == "scores" {
        return parent
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .map(String::from);
    }
    Some(name.to_string())
}

/// Group score files into one run per framework, in order of first
/// appearance. Files whose framework cannot be told are returned apart.
pub fn infer_runs(files: &[PathBuf]) -> (Vec<RunDefinition>, Vec<PathBuf>) {
    let mut runs: Vec<RunDefinition> = Vec::new();
    let mut unknown = Vec::new();
    for path in files {
        let framework = ScoreFile::parse(path).and_then(|f| f.framework);
        match framework {
            Some(fw) => match runs.iter_mut().find(|r| r.name == fw) {
                Some(run) => run.sources.push(path.clone()),
                None => runs.push(RunDefinition::new(fw).with_source(path.clone())),
            },
            None => unknown.push(path.clone()),
        }
    }
    (runs, unknown)
}
