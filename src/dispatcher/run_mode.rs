use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Batch-processing policy applied when items fail.
///
/// | Mode        | After a failure       | Verdict                   |
/// |-------------|-----------------------|---------------------------|
/// | `Strict`    | stop                  | the failing item's error  |
/// | `Partial`   | continue              | success                   |
/// | `Batch`     | stop                  | the failing item's error  |
/// | `Reentrant` | continue              | the last failure's error  |
///
/// `Strict` and `Batch` behave identically at the item loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RunMode {
    #[default]
    Strict,
    Partial,
    Batch,
    Reentrant,
}

impl RunMode {
    /// Whether the remaining items are processed after a failure.
    #[inline]
    #[must_use]
    pub fn continues_after_failure(self) -> bool {
        matches!(self, RunMode::Partial | RunMode::Reentrant)
    }

    /// Whether a recorded failure becomes the batch's error.
    #[inline]
    #[must_use]
    pub fn surfaces_failure(self) -> bool {
        !matches!(self, RunMode::Partial)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Strict => "strict",
            RunMode::Partial => "partial",
            RunMode::Batch => "batch",
            RunMode::Reentrant => "reentrant",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(RunMode::Strict),
            "partial" => Ok(RunMode::Partial),
            "batch" => Ok(RunMode::Batch),
            "reentrant" => Ok(RunMode::Reentrant),
            _ => Err(ConfigError::InvalidRunMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for RunMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RunMode> for String {
    fn from(mode: RunMode) -> Self {
        mode.as_str().to_string()
    }
}
