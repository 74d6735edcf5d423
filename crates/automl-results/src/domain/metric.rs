//! Metric catalogue and orientation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whether larger raw metric values are better or worse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[serde(alias = "higher")]
    HigherIsBetter,
    #[serde(alias = "lower")]
    LowerIsBetter,
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Self::HigherIsBetter => Self::LowerIsBetter,
            Self::LowerIsBetter => Self::HigherIsBetter,
        }
    }
}

/// Metrics reported by the benchmark scoring step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Acc,
    Auc,
    Balacc,
    F1,
    Logloss,
    MeanPce,
    MaxPce,
    Mae,
    Mse,
    Msle,
    Rmse,
    Rmsle,
    R2,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::Acc,
        Metric::Auc,
        Metric::Balacc,
        Metric::F1,
        Metric::Logloss,
        Metric::MeanPce,
        Metric::MaxPce,
        Metric::Mae,
        Metric::Mse,
        Metric::Msle,
        Metric::Rmse,
        Metric::Rmsle,
        Metric::R2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acc => "acc",
            Self::Auc => "auc",
            Self::Balacc => "balacc",
            Self::F1 => "f1",
            Self::Logloss => "logloss",
            Self::MeanPce => "mean_pce",
            Self::MaxPce => "max_pce",
            Self::Mae => "mae",
            Self::Mse => "mse",
            Self::Msle => "msle",
            Self::Rmse => "rmse",
            Self::Rmsle => "rmsle",
            Self::R2 => "r2",
        }
    }

    pub fn orientation(self) -> Orientation {
        match self {
            Self::Acc | Self::Auc | Self::Balacc | Self::F1 | Self::R2 => {
                Orientation::HigherIsBetter
            }
            Self::Logloss
            | Self::MeanPce
            | Self::MaxPce
            | Self::Mae
            | Self::Mse
            | Self::Msle
            | Self::Rmse
            | Self::Rmsle => Orientation::LowerIsBetter,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == needle)
            .ok_or_else(|| format!("unknown metric: {s}"))
    }
}

/// Orientation of a metric name, honouring a `neg_` prefix
/// (`neg_logloss` is higher-is-better). `None` for unknown metrics.
pub fn orientation_of(name: &str) -> Option<Orientation> {
    let name = name.trim().to_ascii_lowercase();
    match name.strip_prefix("neg_") {
        Some(base) => base
            .parse::<Metric>()
            .ok()
            .map(|m| m.orientation().flipped()),
        None => name.parse::<Metric>().ok().map(Metric::orientation),
    }
}
