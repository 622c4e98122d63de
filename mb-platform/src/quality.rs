use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Audio quality tier a user can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Hires,
    Lossless,
    High,
    Standard,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QualityError {
    #[error("invalid quality {0:?}; expected one of: hires, lossless, high, standard")]
    InvalidQuality(String),
}

impl Quality {
    pub const ALL: [Quality; 4] = [
        Quality::Hires,
        Quality::Lossless,
        Quality::High,
        Quality::Standard,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Hires => "hires",
            Quality::Lossless => "lossless",
            Quality::High => "high",
            Quality::Standard => "standard",
        }
    }

    /// Canonical names only, case-sensitive.
    pub fn from_canonical(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.as_str() == token)
    }

    /// Canonical names plus `low` for standard; `high` is already canonical.
    pub fn from_free_text(token: &str) -> Option<Self> {
        match token {
            "low" => Some(Quality::Standard),
            _ => Self::from_canonical(token),
        }
    }
}

impl FromStr for Quality {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_canonical(s).ok_or_else(|| QualityError::InvalidQuality(s.to_string()))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
