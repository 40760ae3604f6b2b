use std::fmt;

use crate::wire::WireError;

/// Error returned by the dispatch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// `invoke*` was called while the engine was stopped. No item was processed.
    Stopped,
    /// An item failed. `message` is the item's error, including any debug snapshot.
    Item {
        /// Position of the failing item in the batch (0 for single invocations)
        index: usize,
        message: String,
    },
    /// The wire payload could not be decoded.
    Decode(WireError),
}

impl EngineError {
    /// The item error text, if this is an item failure.
    #[must_use]
    pub fn item_message(&self) -> Option<&str> {
        match self {
            EngineError::Item { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Stopped => write!(f, "engine is stopped"),
            EngineError::Item { message, .. } => write!(f, "{message}"),
            EngineError::Decode(e) => write!(f, "decode request: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WireError> for EngineError {
    fn from(e: WireError) -> Self {
        EngineError::Decode(e)
    }
}

/// Configuration error.
///
/// Raised while building configuration at startup, never per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The run mode is not one of `strict`, `partial`, `batch`, `reentrant`
    InvalidRunMode(String),
    /// A link rule is not of the form `src=dst`
    InvalidLink(String),
    /// A value could not be parsed for the given key
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidRunMode(value) => write!(
                f,
                "invalid run mode '{value}': expected one of strict, partial, batch, reentrant"
            ),
            ConfigError::InvalidLink(rule) => {
                write!(f, "invalid link rule '{rule}': expected src=dst")
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value '{value}' for {key}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
